#![cfg(loom)]

use loom::sync::Arc;
use loom::thread;
use loom::thread::JoinHandle;
use std::ops::Deref;

use ktab::ConstParams;
use ktab::KTab;
use ktab::NOT_IN_STASH;
use ktab::SlotRef;

type Insert = JoinHandle<(SlotRef, bool)>;
type Delete = JoinHandle<()>;
type Lookup = JoinHandle<SlotRef>;
type Scoped = JoinHandle<Option<u64>>;

type ArcTable = Arc<KTab<u64, u64, ConstParams<4>>>;

struct LoomTable {
  inner: ArcTable,
}

impl LoomTable {
  fn new() -> Self {
    Self {
      inner: Arc::new(KTab::new()),
    }
  }

  fn spawn_insert(&self, key: u64, value: u64) -> Insert {
    let table: ArcTable = ArcTable::clone(&self.inner);
    thread::spawn(move || table.insert(key, value))
  }

  fn spawn_upsert(&self, key: u64, value: u64) -> Insert {
    let table: ArcTable = ArcTable::clone(&self.inner);
    thread::spawn(move || table.upsert(key, value))
  }

  fn spawn_delete(&self, key: u64) -> Delete {
    let table: ArcTable = ArcTable::clone(&self.inner);
    thread::spawn(move || table.delete(&key))
  }

  fn spawn_lookup(&self, key: u64) -> Lookup {
    let table: ArcTable = ArcTable::clone(&self.inner);
    thread::spawn(move || table.find_index(&key))
  }

  fn spawn_scoped<F>(&self, key: u64, f: F) -> Scoped
  where
    F: Fn(&mut u64) -> u64 + Send + 'static,
  {
    let table: ArcTable = ArcTable::clone(&self.inner);
    thread::spawn(move || table.with_value(&key, |value| f(value)))
  }
}

impl Deref for LoomTable {
  type Target = ArcTable;

  #[inline]
  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

#[test]
fn test_insert_distinct_keys() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();

    let thread_a: Insert = table.spawn_insert(1, 10);
    let thread_b: Insert = table.spawn_insert(2, 20);

    let (slot_a, inserted_a) = thread_a.join().unwrap();
    let (slot_b, inserted_b) = thread_b.join().unwrap();

    assert!(inserted_a);
    assert!(inserted_b);
    assert_ne!(slot_a, slot_b);

    assert_eq!(table.len(), 2);
    assert_eq!(table.with_value(&1, |value| *value), Some(10));
    assert_eq!(table.with_value(&2, |value| *value), Some(20));
  });
}

#[test]
fn test_insert_same_key() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();

    let thread_a: Insert = table.spawn_insert(1, 10);
    let thread_b: Insert = table.spawn_insert(1, 20);

    let (slot_a, inserted_a) = thread_a.join().unwrap();
    let (slot_b, inserted_b) = thread_b.join().unwrap();

    assert!(inserted_a || inserted_b, "at least one insert should win");
    assert!(inserted_a != inserted_b, "exactly one insert should win");
    assert_eq!(slot_a, slot_b);

    assert_eq!(table.len(), 1);

    let value: Option<u64> = table.with_value(&1, |value| *value);
    assert!(value == Some(10) || value == Some(20));
  });
}

#[test]
fn test_insert_lookup() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    let (slot, _inserted) = table.insert(1, 123);

    let insert: Insert = table.spawn_insert(2, 456);
    let lookup: Lookup = table.spawn_lookup(1);

    assert!(insert.join().unwrap().1);
    assert_eq!(lookup.join().unwrap(), slot);
  });
}

#[test]
fn test_insert_delete() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    table.insert(1, 10);

    let insert: Insert = table.spawn_insert(2, 20);
    let delete: Delete = table.spawn_delete(1);

    assert!(insert.join().unwrap().1);
    delete.join().unwrap();

    assert_eq!(table.find_index(&1), NOT_IN_STASH);
    assert_eq!(table.with_value(&2, |value| *value), Some(20));
    assert_eq!(table.len(), 1);
  });
}

#[test]
fn test_delete_race() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    table.insert(1, 10);

    let delete_a: Delete = table.spawn_delete(1);
    let delete_b: Delete = table.spawn_delete(1);

    delete_a.join().unwrap();
    delete_b.join().unwrap();

    assert_eq!(table.find_index(&1), NOT_IN_STASH);
    assert_eq!(table.len(), 0);
  });
}

#[test]
fn test_upsert_race() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();

    let thread_a: Insert = table.spawn_upsert(1, 10);
    let thread_b: Insert = table.spawn_upsert(1, 20);

    thread_a.join().unwrap();
    thread_b.join().unwrap();

    assert_eq!(table.len(), 1);

    let value: Option<u64> = table.with_value(&1, |value| *value);
    assert!(value == Some(10) || value == Some(20));
  });
}

#[test]
fn test_scoped_access_vs_insert() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    table.insert(1, 100);

    let scoped: Scoped = table.spawn_scoped(1, |value| {
      *value += 1;
      *value
    });
    let insert: Insert = table.spawn_insert(2, 200);

    assert_eq!(scoped.join().unwrap(), Some(101));
    assert!(insert.join().unwrap().1);

    assert_eq!(table.with_value(&1, |value| *value), Some(101));
    assert_eq!(table.with_value(&2, |value| *value), Some(200));
  });
}

#[test]
fn test_scoped_access_vs_delete_other() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    table.insert(1, 100);
    table.insert(2, 200);

    let scoped: Scoped = table.spawn_scoped(1, |value| *value);
    let delete: Delete = table.spawn_delete(2);

    assert_eq!(scoped.join().unwrap(), Some(100));
    delete.join().unwrap();

    assert_eq!(table.len(), 1);
  });
}

#[test]
fn test_delete_reinsert_reuses_slot() {
  loom::model(|| {
    let table: LoomTable = LoomTable::new();
    let (slot, _inserted) = table.insert(1, 10);

    let worker: JoinHandle<(SlotRef, bool)> = {
      let table: ArcTable = ArcTable::clone(&table.inner);
      thread::spawn(move || {
        table.delete(&1);
        table.insert(2, 20)
      })
    };

    let lookup: Lookup = table.spawn_lookup(1);

    let (reused, inserted) = worker.join().unwrap();

    assert!(inserted);
    assert_eq!(reused, slot);

    // the lookup saw the key either before or after the delete
    let observed: SlotRef = lookup.join().unwrap();
    assert!(observed == slot || observed == NOT_IN_STASH);

    assert_eq!(table.find_index(&1), NOT_IN_STASH);
    assert_eq!(table.with_value(&2, |value| *value), Some(20));
  });
}
