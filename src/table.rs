//! Core table implementation.
//!
//! Mutating operations serialize on the structural lock, then take the slot
//! lock of the one slot they touch. Lookups and iteration read atomically
//! published words and never block; whatever they return is re-verified under
//! the slot lock before it is acted on.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::DebugMap;
use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;
use core::ops::Range;
use core::ptr;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::hash::Hasher;

use crossbeam_utils::CachePadded;
use sdd::Guard;

use crate::array::Array;
use crate::bucket::Bucket;
use crate::index::NIL;
use crate::index::NOT_IN_STASH;
use crate::index::SlotRef;
use crate::params::Params;
use crate::params::ParamsExt;
use crate::slot::Slot;
use crate::sync::Mutex;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;

// -----------------------------------------------------------------------------
// Table State
// -----------------------------------------------------------------------------

#[repr(C)]
pub(crate) struct Table<K, V, P>
where
  P: Params + ?Sized,
{
  structural: CachePadded<Structural>,
  storage: CachePadded<Storage<K, V>>,
  marker: PhantomData<fn(P)>,
}

impl<K, V, P> Table<K, V, P>
where
  P: Params + ?Sized,
{
  #[track_caller]
  #[inline]
  pub(crate) fn new() -> Self {
    P::validate();

    Self {
      structural: CachePadded::new(Structural {
        free: Mutex::new(Vec::new()),
        frontier: AtomicUsize::new(0),
      }),
      storage: CachePadded::new(Storage {
        slots: Array::new(P::LENGTH.as_usize(), |_, slot| {
          slot.write(Slot::new());
        }),
        buckets: Array::new(P::BUCKETS, |_, bucket| {
          bucket.write(Bucket::new());
        }),
        hasher: RandomState::new(),
      }),
      marker: PhantomData,
    }
  }

  #[track_caller]
  #[inline]
  pub(crate) const fn cap(&self) -> usize {
    P::LENGTH.as_usize()
  }

  /// Number of live entries: the frontier minus the freed slots behind it.
  #[track_caller]
  #[inline]
  pub(crate) fn len(&self) -> usize {
    let free = self.structural.free.lock();

    self.structural.frontier.load(Relaxed) - free.len()
  }

  #[track_caller]
  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Maps a key to its bucket id.
  #[inline]
  pub(crate) fn bucket_of<Q>(&self, key: &Q) -> usize
  where
    Q: Hash + ?Sized,
  {
    let mut state = self.storage.hasher.build_hasher();

    key.hash(&mut state);

    (state.finish() as usize) & P::BUCKET_MASK
  }

  // ---------------------------------------------------------------------------
  // Lookup
  // ---------------------------------------------------------------------------

  #[track_caller]
  #[inline]
  pub(crate) fn find_index<Q>(&self, key: &Q) -> SlotRef
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    match self.probe(self.bucket_of(key), key) {
      Some(index) => SlotRef::new(index),
      None => NOT_IN_STASH,
    }
  }

  /// Lock-free search for `key` within its bucket's span.
  ///
  /// Probes the span endpoints, then scans strictly between them, stopping
  /// once as many slots carrying this bucket's hint have been visited as the
  /// bucket has members. The result is advisory: it may be stale by the time
  /// the caller acts on it, so every caller re-verifies under the slot lock.
  fn probe<Q>(&self, hash: usize, key: &Q) -> Option<usize>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
  {
    let bucket: &Bucket = self.storage.buckets.get(hash);
    let members: usize = bucket.count.load(Relaxed);

    if members == 0 {
      return None;
    }

    let guard: Guard = Guard::new();
    let first: usize = bucket.first.load(Relaxed);

    if first != NIL && self.storage.slots.get(first).holds(hash, key, &guard) {
      return Some(first);
    }

    let last: usize = bucket.last.load(Relaxed);

    if last != NIL && self.storage.slots.get(last).holds(hash, key, &guard) {
      return Some(last);
    }

    if members < 3 || first == NIL || last == NIL {
      return None;
    }

    let mut seen: usize = 2;

    for index in first + 1..last {
      let slot: &Slot<K, V> = self.storage.slots.get(index);

      if slot.hint() != hash {
        continue;
      }

      if slot.holds(hash, key, &guard) {
        return Some(index);
      }

      seen += 1;

      if seen >= members {
        break;
      }
    }

    None
  }

  // ---------------------------------------------------------------------------
  // Scoped Access
  // ---------------------------------------------------------------------------

  #[track_caller]
  #[inline]
  pub(crate) fn with_found<Q, F, R>(&self, key: &Q, found: SlotRef, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    F: FnOnce(&mut V) -> R,
  {
    let index: usize = found.slot()?;

    if index >= self.cap() {
      return None;
    }

    let slot: &Slot<K, V> = self.storage.slots.get(index);
    let mut held = slot.value.lock();

    // Re-verify under the slot lock: the handle may be stale.
    if slot.hint() == NIL {
      return None;
    }

    let guard: Guard = Guard::new();

    // SAFETY: Tag bits are never set on key pointers.
    match unsafe { slot.key.load(Acquire, &guard).as_ref_unchecked() } {
      Some(stored) if stored.borrow() == key => held.as_mut().map(f),
      _ => None,
    }
  }

  #[track_caller]
  #[inline]
  pub(crate) fn with_value<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
    F: FnOnce(&mut V) -> R,
  {
    self.with_found(key, self.find_index(key), f)
  }

  // ---------------------------------------------------------------------------
  // Insertion
  // ---------------------------------------------------------------------------

  #[track_caller]
  #[inline]
  pub(crate) fn insert(&self, key: K, value: V) -> (SlotRef, bool)
  where
    K: Eq + Hash + 'static,
  {
    let mut free = self.structural.free.lock();
    let hash: usize = self.bucket_of(&key);

    if let Some(index) = self.probe(hash, &key) {
      return (SlotRef::new(index), false);
    }

    let Some(index) = self.reserve_slot(&mut free) else {
      return (NOT_IN_STASH, false);
    };

    self.publish(index, hash, key, value);

    (SlotRef::new(index), true)
  }

  #[track_caller]
  #[inline]
  pub(crate) fn upsert(&self, key: K, value: V) -> (SlotRef, bool)
  where
    K: Eq + Hash + 'static,
  {
    let mut free = self.structural.free.lock();
    let hash: usize = self.bucket_of(&key);

    if let Some(index) = self.probe(hash, &key) {
      let slot: &Slot<K, V> = self.storage.slots.get(index);
      let mut held = slot.value.lock();

      // The span invariant already covers this slot; only the value changes.
      // The stored key is kept, as `std` maps do.
      *held = Some(value);

      return (SlotRef::new(index), false);
    }

    let Some(index) = self.reserve_slot(&mut free) else {
      return (NOT_IN_STASH, false);
    };

    self.publish(index, hash, key, value);

    (SlotRef::new(index), true)
  }

  #[track_caller]
  #[inline]
  pub(crate) fn set(&self, key: K, value: V)
  where
    K: Eq + Hash + 'static,
  {
    self.upsert(key, value);
  }

  /// Picks the slot a new entry lands in: the most recently freed slot, or
  /// the frontier.
  ///
  /// Called with the structural lock held.
  #[inline]
  fn reserve_slot(&self, free: &mut Vec<usize>) -> Option<usize> {
    if let Some(index) = free.pop() {
      return Some(index);
    }

    let frontier: usize = self.structural.frontier.load(Relaxed);

    if frontier < self.cap() {
      self.structural.frontier.store(frontier + 1, Relaxed);
      return Some(frontier);
    }

    None
  }

  /// Fills a reserved slot and links it into its bucket.
  ///
  /// Called with the structural lock held; takes the slot lock for the write.
  #[inline]
  fn publish(&self, index: usize, hash: usize, key: K, value: V)
  where
    K: 'static,
  {
    let slot: &Slot<K, V> = self.storage.slots.get(index);
    let mut held = slot.value.lock();

    debug_assert!(slot.hint() == NIL, "reserved slot is not vacant");
    debug_assert!(held.is_none(), "reserved slot still holds a value");

    *held = Some(value);
    slot.occupy(hash, key);
    self.attach(hash, index);
  }

  /// Links `index` into bucket `hash`, widening the span as needed.
  ///
  /// Called with the structural lock held.
  fn attach(&self, hash: usize, index: usize) {
    let bucket: &Bucket = self.storage.buckets.get(hash);
    let first: usize = bucket.first.load(Relaxed);
    let last: usize = bucket.last.load(Relaxed);

    if first == NIL || index < first {
      if last == NIL {
        bucket.last.store(first, Relaxed);
      }

      bucket.first.store(index, Relaxed);
    } else if last == NIL || index > last {
      bucket.last.store(index, Relaxed);
    }

    bucket.count.fetch_add(1, Relaxed);
  }

  // ---------------------------------------------------------------------------
  // Deletion
  // ---------------------------------------------------------------------------

  #[track_caller]
  #[inline]
  pub(crate) fn delete<Q>(&self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    let mut free = self.structural.free.lock();
    let hash: usize = self.bucket_of(key);

    let Some(index) = self.probe(hash, key) else {
      return;
    };

    let slot: &Slot<K, V> = self.storage.slots.get(index);

    {
      let mut held = slot.value.lock();
      let guard: Guard = Guard::new();

      if !slot.holds(hash, key, &guard) {
        return;
      }

      *held = None;
      slot.vacate();
    }

    let frontier: usize = self.structural.frontier.load(Relaxed);

    if index + 1 == frontier {
      self.structural.frontier.store(index, Relaxed);
    } else {
      free.push(index);
    }

    self.detach(hash, index);
  }

  /// Unlinks `index` from bucket `hash`, repairing the span endpoints.
  ///
  /// Called with the structural lock held, after the slot was vacated. The
  /// span narrows only when the removed slot was an extremum; interior
  /// removals leave the endpoints untouched.
  fn detach(&self, hash: usize, index: usize) {
    let bucket: &Bucket = self.storage.buckets.get(hash);
    let members: usize = bucket.count.load(Relaxed) - 1;

    bucket.count.store(members, Relaxed);

    if members == 0 {
      debug_assert!(
        bucket.last.load(Relaxed) == NIL,
        "single-member bucket carries a span tail",
      );

      bucket.first.store(NIL, Relaxed);
      return;
    }

    let first: usize = bucket.first.load(Relaxed);
    let last: usize = bucket.last.load(Relaxed);

    if index == first {
      if members == 1 {
        bucket.first.store(last, Relaxed);
        bucket.last.store(NIL, Relaxed);
      } else {
        for next in first + 1..last {
          if self.storage.slots.get(next).hint() == hash {
            bucket.first.store(next, Relaxed);
            break;
          }
        }
      }
    } else if index == last {
      if members == 1 {
        bucket.last.store(NIL, Relaxed);
      } else {
        for next in (first + 1..last).rev() {
          if self.storage.slots.get(next).hint() == hash {
            bucket.last.store(next, Relaxed);
            break;
          }
        }
      }
    }
  }

  // ---------------------------------------------------------------------------
  // Bulk Operations
  // ---------------------------------------------------------------------------

  #[track_caller]
  pub(crate) fn clear(&self) {
    let mut free = self.structural.free.lock();
    let limit: usize = self.structural.frontier.load(Relaxed);

    for index in 0..limit {
      let slot: &Slot<K, V> = self.storage.slots.get(index);
      let mut held = slot.value.lock();

      *held = None;
      slot.vacate();
    }

    for bucket in self.storage.buckets.as_slice() {
      bucket.reset();
    }

    self.structural.frontier.store(0, Relaxed);
    free.clear();
  }

  /// Copies every entry of `source` into `self`.
  ///
  /// Holds both structural locks, acquired in address order. Returns `false`
  /// once `self` runs out of slots; entries copied up to that point remain.
  #[track_caller]
  pub(crate) fn add_all<Q>(&self, source: &Table<K, V, Q>, upsert: bool) -> bool
  where
    K: Clone + Eq + Hash + 'static,
    V: Clone,
    Q: Params + ?Sized,
  {
    let this: usize = ptr::from_ref(self) as usize;
    let that: usize = ptr::from_ref(source) as usize;

    // Copying a table into itself: every key is already present, and
    // proceeding would deadlock on the slot locks.
    if this == that {
      return true;
    }

    let mut free;
    let _source_free;

    if this < that {
      free = self.structural.free.lock();
      _source_free = source.structural.free.lock();
    } else {
      _source_free = source.structural.free.lock();
      free = self.structural.free.lock();
    }

    let guard: Guard = Guard::new();
    let limit: usize = source.structural.frontier.load(Relaxed);

    for index in 0..limit {
      let slot: &Slot<K, V> = source.storage.slots.get(index);

      let (key, value) = {
        let held = slot.value.lock();

        if slot.hint() == NIL {
          continue;
        }

        // SAFETY: Tag bits are never set on key pointers.
        let stored = unsafe { slot.key.load(Acquire, &guard).as_ref_unchecked() };

        match (stored, held.as_ref()) {
          (Some(key), Some(value)) => (key.clone(), value.clone()),
          _ => continue,
        }
      };

      let hash: usize = self.bucket_of(&key);

      if let Some(existing) = self.probe(hash, &key) {
        if upsert {
          let target: &Slot<K, V> = self.storage.slots.get(existing);
          let mut held = target.value.lock();

          *held = Some(value);
        }

        continue;
      }

      let Some(target) = self.reserve_slot(&mut free) else {
        return false;
      };

      self.publish(target, hash, key, value);
    }

    true
  }

  // ---------------------------------------------------------------------------
  // Iteration
  // ---------------------------------------------------------------------------

  #[track_caller]
  #[inline]
  pub(crate) fn keys(&self) -> Keys<'_, K, V, P> {
    Keys {
      table: self,
      range: 0..self.structural.frontier.load(Relaxed),
      guard: Guard::new(),
    }
  }
}

// -----------------------------------------------------------------------------
// Test Introspection
// -----------------------------------------------------------------------------

#[cfg(test)]
impl<K, V, P> Table<K, V, P>
where
  P: Params + ?Sized,
{
  pub(crate) fn bucket_state(&self, bucket: usize) -> (usize, usize, usize) {
    let bucket: &Bucket = self.storage.buckets.get(bucket);

    (
      bucket.count.load(Relaxed),
      bucket.first.load(Relaxed),
      bucket.last.load(Relaxed),
    )
  }

  pub(crate) fn frontier(&self) -> usize {
    self.structural.frontier.load(Relaxed)
  }

  pub(crate) fn reusable(&self) -> usize {
    self.structural.free.lock().len()
  }
}

// -----------------------------------------------------------------------------
// Formatting
// -----------------------------------------------------------------------------

impl<K, V, P> Debug for Table<K, V, P>
where
  K: Debug,
  V: Debug,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let mut debug: DebugMap<'_, '_> = f.debug_map();
    let guard: Guard = Guard::new();
    let limit: usize = self.structural.frontier.load(Relaxed);

    for index in 0..limit {
      let slot: &Slot<K, V> = self.storage.slots.get(index);
      let held = slot.value.lock();

      if slot.hint() == NIL {
        continue;
      }

      // SAFETY: Tag bits are never set on key pointers.
      let stored = unsafe { slot.key.load(Acquire, &guard).as_ref_unchecked() };

      if let (Some(key), Some(value)) = (stored, held.as_ref()) {
        debug.entry(key, value);
      }
    }

    debug.finish()
  }
}

impl<K, V, P> Display for Table<K, V, P>
where
  K: Display,
  V: Display,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let guard: Guard = Guard::new();
    let limit: usize = self.structural.frontier.load(Relaxed);
    let mut lead: bool = true;

    f.write_str("{")?;

    for index in 0..limit {
      let slot: &Slot<K, V> = self.storage.slots.get(index);
      let held = slot.value.lock();

      if slot.hint() == NIL {
        continue;
      }

      // SAFETY: Tag bits are never set on key pointers.
      let stored = unsafe { slot.key.load(Acquire, &guard).as_ref_unchecked() };

      if let (Some(key), Some(value)) = (stored, held.as_ref()) {
        if !lead {
          f.write_str(", ")?;
        }

        write!(f, "{key}: {value}")?;
        lead = false;
      }
    }

    f.write_str("}")
  }
}

// -----------------------------------------------------------------------------
// Structural State
// -----------------------------------------------------------------------------

/// Allocation state mutated during operations.
///
/// Isolated from [`Storage`] via cache padding to avoid false sharing.
struct Structural {
  /// The structural lock. Owns the deletion stack and guards every mutation
  /// of the bucket directory and the frontier.
  free: Mutex<Vec<usize>>,
  /// Lowest slot index never yet allocated. Read without synchronization by
  /// iteration; written only under the structural lock.
  frontier: AtomicUsize,
}

// -----------------------------------------------------------------------------
// Storage
// -----------------------------------------------------------------------------

/// Storage fixed at construction.
///
/// Individual slot and bucket words are mutated atomically, but the arrays
/// themselves never move or resize. Isolated from [`Structural`] via cache
/// padding.
struct Storage<K, V> {
  /// The slot array.
  slots: Array<Slot<K, V>>,
  /// The bucket directory.
  buckets: Array<Bucket>,
  /// Hash state shared by every lookup.
  hasher: RandomState,
}

// -----------------------------------------------------------------------------
// Keys Iterator
// -----------------------------------------------------------------------------

/// Lock-free iterator over the live entries of a [`KTab`].
///
/// Yields `(key, slot)` pairs. See [`KTab::keys`] for the exact semantics
/// under concurrent mutation.
///
/// [`KTab`]: crate::KTab
/// [`KTab::keys`]: crate::KTab::keys
pub struct Keys<'table, K, V, P>
where
  P: Params + ?Sized,
{
  table: &'table Table<K, V, P>,
  range: Range<usize>,
  guard: Guard,
}

impl<K, V, P> Iterator for Keys<'_, K, V, P>
where
  K: Clone,
  P: Params + ?Sized,
{
  type Item = (K, SlotRef);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let index: usize = self.range.next()?;
      let slot: &Slot<K, V> = self.table.storage.slots.get(index);

      if slot.hint() == NIL {
        continue;
      }

      // SAFETY: Tag bits are never set on key pointers.
      if let Some(key) = unsafe { slot.key.load(Acquire, &self.guard).as_ref_unchecked() } {
        return Some((key.clone(), SlotRef::new(index)));
      }
    }
  }

  #[inline]
  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.range.end.saturating_sub(self.range.start)))
  }
}
