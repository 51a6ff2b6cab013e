use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use std::hash::Hash;

use crate::index::SlotRef;
use crate::params::DefaultParams;
use crate::params::Params;
use crate::params::ParamsExt;
use crate::table::Keys;
use crate::table::Table;

/// A fixed-capacity concurrent hash table.
///
/// `KTab` stores `K -> V` entries in a slot array of compile-time capacity,
/// configured through the `P` parameter. Lookups and iteration are lock-free;
/// mutations serialize on a structural lock plus the lock of the one slot
/// they touch, so a thread doing long work inside [`with_value()`] never
/// blocks operations on other slots.
///
/// See the [crate-level documentation] for an overview, the locking
/// discipline, and examples.
///
/// # Type Parameters
///
/// - `K`: The key type. Lookups require `K: Eq + Hash`.
/// - `V`: The value type.
/// - `P`: Configuration implementing [`Params`]. Defaults to
///   [`DefaultParams`].
///
/// # Examples
///
/// Basic usage with default configuration:
///
/// ```
/// use ktab::KTab;
///
/// let table: KTab<&str, i64> = KTab::new();
///
/// let (slot, inserted) = table.insert("alpha", 42);
/// assert!(inserted);
/// assert_eq!(table.find_index("alpha"), slot);
/// assert_eq!(table.with_value("alpha", |v| *v), Some(42));
/// ```
///
/// Custom capacity using [`ConstParams`]:
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// let table: KTab<u64, u64, ConstParams<256>> = KTab::new();
/// assert_eq!(table.capacity(), 256);
/// ```
///
/// [crate-level documentation]: crate
/// [`with_value()`]: Self::with_value
/// [`ConstParams`]: crate::ConstParams
/// [`DefaultParams`]: crate::DefaultParams
/// [`Params`]: crate::Params
#[repr(transparent)]
pub struct KTab<K, V, P = DefaultParams>
where
  P: Params + ?Sized,
{
  inner: Table<K, V, P>,
}

impl<K, V, P> KTab<K, V, P>
where
  P: Params + ?Sized,
{
  /// Creates a new, empty table.
  ///
  /// All slots, their locks, and the bucket directory are allocated up
  /// front; the table never grows or shrinks afterwards.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<String, u32> = KTab::new();
  /// assert!(table.is_empty());
  /// ```
  #[inline]
  pub fn new() -> Self {
    Self {
      inner: Table::new(),
    }
  }

  /// Returns the maximum number of entries the table can hold.
  ///
  /// Determined by [`Params::LENGTH`] and fixed for the lifetime of the
  /// table.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::{KTab, ConstParams};
  ///
  /// let table: KTab<u64, u64, ConstParams<512>> = KTab::new();
  /// assert_eq!(table.capacity(), 512);
  /// ```
  ///
  /// [`Params::LENGTH`]: crate::Params::LENGTH
  #[inline]
  pub const fn capacity(&self) -> usize {
    self.inner.cap()
  }

  /// Returns the number of entries currently in the table.
  ///
  /// Takes the structural lock. The count is exact at the moment it is
  /// computed but may change immediately under concurrent writers.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<u32, u32> = KTab::new();
  /// assert_eq!(table.len(), 0);
  ///
  /// table.insert(1, 10);
  /// table.insert(2, 20);
  /// assert_eq!(table.len(), 2);
  /// ```
  #[inline]
  pub fn len(&self) -> usize {
    self.inner.len()
  }

  /// Returns `true` if the table contains no entries.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<u32, u32> = KTab::new();
  /// assert!(table.is_empty());
  ///
  /// table.insert(1, 10);
  /// assert!(!table.is_empty());
  /// ```
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }

  /// Looks up the slot currently holding `key`, without blocking.
  ///
  /// Returns [`NOT_IN_STASH`] if the key is absent. Takes no locks: the
  /// result is advisory and may be invalidated by a concurrent writer at any
  /// moment, so pass it to [`with_found()`] — which re-verifies under the
  /// slot lock — before acting on it.
  ///
  /// The key may be any borrowed form of `K`, as long as `Hash` and `Eq` on
  /// the borrowed form agree with the key type.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::{KTab, NOT_IN_STASH};
  ///
  /// let table: KTab<String, u32> = KTab::new();
  /// table.insert("alpha".to_owned(), 1);
  ///
  /// assert_ne!(table.find_index("alpha"), NOT_IN_STASH);
  /// assert_eq!(table.find_index("beta"), NOT_IN_STASH);
  /// ```
  ///
  /// [`NOT_IN_STASH`]: crate::NOT_IN_STASH
  /// [`with_found()`]: Self::with_found
  #[inline]
  pub fn find_index<Q>(&self, key: &Q) -> SlotRef
  where
    K: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
  {
    self.inner.find_index(key)
  }

  /// Inserts `key -> value` if the key is absent.
  ///
  /// Returns the slot holding the key and whether this call inserted it.
  /// An existing entry is never overwritten — use [`upsert()`] for that.
  /// Returns <code>([NOT_IN_STASH], false)</code> when the table is full.
  ///
  /// Blocks on the structural lock and, when inserting, on the target slot's
  /// lock.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  ///
  /// let (first, inserted) = table.insert("alpha", 1);
  /// assert!(inserted);
  ///
  /// // A second insert with the same key is a no-op
  /// let (again, inserted) = table.insert("alpha", 99);
  /// assert!(!inserted);
  /// assert_eq!(first, again);
  /// assert_eq!(table.with_value("alpha", |v| *v), Some(1));
  /// ```
  ///
  /// A full table rejects new keys but stays usable:
  ///
  /// ```
  /// use ktab::{KTab, ConstParams, NOT_IN_STASH};
  ///
  /// let table: KTab<u32, u32, ConstParams<2>> = KTab::new();
  /// table.insert(1, 10);
  /// table.insert(2, 20);
  ///
  /// assert_eq!(table.insert(3, 30), (NOT_IN_STASH, false));
  ///
  /// table.delete(&1);
  /// let (_, inserted) = table.insert(3, 30);
  /// assert!(inserted);
  /// ```
  ///
  /// [`upsert()`]: Self::upsert
  /// [NOT_IN_STASH]: crate::NOT_IN_STASH
  #[inline]
  pub fn insert(&self, key: K, value: V) -> (SlotRef, bool)
  where
    K: Eq + Hash + 'static,
  {
    self.inner.insert(key, value)
  }

  /// Inserts `key -> value`, overwriting the value if the key is present.
  ///
  /// Returns the slot holding the key and whether the key was newly
  /// inserted. Overwriting keeps the originally stored key, as `std` maps
  /// do. Returns <code>([NOT_IN_STASH], false)</code> when the key is absent
  /// and the table is full.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  ///
  /// let (slot, inserted) = table.upsert("alpha", 1);
  /// assert!(inserted);
  ///
  /// let (again, inserted) = table.upsert("alpha", 2);
  /// assert!(!inserted);
  /// assert_eq!(slot, again);
  /// assert_eq!(table.with_value("alpha", |v| *v), Some(2));
  /// ```
  ///
  /// [NOT_IN_STASH]: crate::NOT_IN_STASH
  #[inline]
  pub fn upsert(&self, key: K, value: V) -> (SlotRef, bool)
  where
    K: Eq + Hash + 'static,
  {
    self.inner.upsert(key, value)
  }

  /// Stores `key -> value`, discarding the slot handle.
  ///
  /// Equivalent to [`upsert()`] with the result ignored. When the table is
  /// full and the key absent, the entry is silently not stored.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  ///
  /// table.set("alpha", 1);
  /// table.set("alpha", 2);
  /// assert_eq!(table.with_value("alpha", |v| *v), Some(2));
  /// ```
  ///
  /// [`upsert()`]: Self::upsert
  #[inline]
  pub fn set(&self, key: K, value: V)
  where
    K: Eq + Hash + 'static,
  {
    self.inner.set(key, value);
  }

  /// Removes `key` from the table.
  ///
  /// A missing key is a silent no-op. The freed slot becomes available for
  /// reuse immediately.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::{KTab, NOT_IN_STASH};
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  /// table.insert("alpha", 1);
  ///
  /// table.delete("alpha");
  /// assert_eq!(table.find_index("alpha"), NOT_IN_STASH);
  ///
  /// // Deleting again is harmless
  /// table.delete("alpha");
  /// ```
  #[inline]
  pub fn delete<Q>(&self, key: &Q)
  where
    K: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
  {
    self.inner.delete(key);
  }

  /// Removes every entry.
  ///
  /// Holds the structural lock for the full sweep and takes each slot's lock
  /// while vacating it. Slot locks themselves stay alive; handles obtained
  /// before the clear simply degrade into misses.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<u32, u32> = KTab::new();
  /// table.insert(1, 10);
  /// table.insert(2, 20);
  ///
  /// table.clear();
  /// assert_eq!(table.len(), 0);
  /// assert_eq!(table.keys().count(), 0);
  /// ```
  #[inline]
  pub fn clear(&self) {
    self.inner.clear();
  }

  /// Copies every entry of `source` into this table.
  ///
  /// With `upsert` false, keys already present keep their value; with
  /// `upsert` true, they are overwritten. Returns `false` once this table
  /// runs out of slots — entries copied up to that point remain.
  ///
  /// Holds both structural locks (acquired in a globally consistent order)
  /// for the whole copy, so it serializes against all other mutations on
  /// either table. The source may have a different capacity configuration —
  /// this is the building block for growing: copy into a larger table, then
  /// swap at the application level.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::{KTab, ConstParams};
  ///
  /// let small: KTab<u32, u32, ConstParams<4>> = KTab::new();
  /// small.insert(1, 10);
  /// small.insert(2, 20);
  ///
  /// let large: KTab<u32, u32, ConstParams<64>> = KTab::new();
  /// assert!(large.add_all(&small, false));
  /// assert_eq!(large.len(), 2);
  /// assert_eq!(large.with_value(&1, |v| *v), Some(10));
  /// ```
  ///
  /// Existing entries win unless `upsert` is set:
  ///
  /// ```
  /// use ktab::{KTab, ConstParams};
  ///
  /// let source: KTab<u32, u32, ConstParams<4>> = KTab::new();
  /// source.insert(1, 111);
  ///
  /// let target: KTab<u32, u32, ConstParams<4>> = KTab::new();
  /// target.insert(1, 10);
  ///
  /// target.add_all(&source, false);
  /// assert_eq!(target.with_value(&1, |v| *v), Some(10));
  ///
  /// target.add_all(&source, true);
  /// assert_eq!(target.with_value(&1, |v| *v), Some(111));
  /// ```
  #[inline]
  pub fn add_all<Q>(&self, source: &KTab<K, V, Q>, upsert: bool) -> bool
  where
    K: Clone + Eq + Hash + 'static,
    V: Clone,
    Q: Params + ?Sized,
  {
    self.inner.add_all(&source.inner, upsert)
  }

  /// Runs `f` on the value at `found`, if it still holds `key`.
  ///
  /// Acquires the slot's lock, re-verifies that the slot is occupied by
  /// `key`, and only then runs `f` with a mutable reference to the value.
  /// Returns `f`'s result, or [`None`] if the handle is the sentinel or
  /// stale (the entry was deleted or the slot reused since the handle was
  /// obtained). The lock is released on all exit paths.
  ///
  /// While `f` runs the slot is pinned: no other thread can delete,
  /// overwrite, or relocate it. Arbitrary blocking work is allowed inside
  /// `f` — the structural lock is not held, so other threads can freely
  /// operate on other keys meanwhile.
  ///
  /// # Deadlocks
  ///
  /// From inside `f`, calling anything on this table that takes a lock —
  /// another scoped access, or any mutating operation — deadlocks. See the
  /// [crate-level documentation] for the lock hierarchy.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  /// let (slot, _) = table.insert("alpha", 1);
  ///
  /// assert_eq!(table.with_found("alpha", slot, |v| *v + 1), Some(2));
  ///
  /// // A stale handle degrades into a miss
  /// table.delete("alpha");
  /// assert_eq!(table.with_found("alpha", slot, |v| *v), None);
  /// ```
  ///
  /// [crate-level documentation]: crate
  #[inline]
  pub fn with_found<Q, F, R>(&self, key: &Q, found: SlotRef, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    F: FnOnce(&mut V) -> R,
  {
    self.inner.with_found(key, found, f)
  }

  /// Looks up `key` and runs `f` on its value under the slot lock.
  ///
  /// Combines [`find_index()`] and [`with_found()`]: returns `f`'s result,
  /// or [`None`] if the key is absent (or lost a race with a concurrent
  /// delete between lookup and lock acquisition). All contracts of
  /// [`with_found()`] apply, including the deadlock rules.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<&str, u32> = KTab::new();
  /// table.insert("alpha", 1);
  ///
  /// // Mutate in place
  /// table.with_value("alpha", |v| *v *= 10);
  /// assert_eq!(table.with_value("alpha", |v| *v), Some(10));
  ///
  /// // Absent keys run nothing
  /// assert_eq!(table.with_value("beta", |v| *v), None);
  /// ```
  ///
  /// [`find_index()`]: Self::find_index
  /// [`with_found()`]: Self::with_found
  #[inline]
  pub fn with_value<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
  where
    K: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
    F: FnOnce(&mut V) -> R,
  {
    self.inner.with_value(key, f)
  }

  /// Returns a lock-free iterator over the live entries.
  ///
  /// Yields `(key, slot)` pairs for every slot observed occupied, cloning
  /// each key as it goes. Takes no locks and is never blocked by — nor
  /// blocks — any other operation.
  ///
  /// # Semantics
  ///
  /// The iterator observes a weakly consistent view:
  ///
  /// - Entries inserted or removed mid-iteration **may or may not** be
  ///   observed; keys that never coexisted can appear in one enumeration.
  /// - With no concurrent writers, it yields exactly the live entries, each
  ///   once.
  /// - Insertion order is preserved only if no deletion ever occurred, since
  ///   slot reuse breaks monotonicity.
  ///
  /// Callers needing a consistent snapshot should [`add_all()`] into a fresh
  /// table and iterate that.
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::KTab;
  ///
  /// let table: KTab<u32, u32> = KTab::new();
  /// table.insert(1, 10);
  /// table.insert(2, 20);
  ///
  /// let mut seen: Vec<u32> = table.keys().map(|(key, _)| key).collect();
  /// seen.sort_unstable();
  /// assert_eq!(seen, [1, 2]);
  /// ```
  ///
  /// [`add_all()`]: Self::add_all
  #[inline]
  pub fn keys(&self) -> Keys<'_, K, V, P>
  where
    K: Clone,
  {
    self.inner.keys()
  }
}

impl<K, V, P> Debug for KTab<K, V, P>
where
  K: Debug,
  V: Debug,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("KTab")
      .field("entries", &self.inner)
      .field("params", &P::debug())
      .finish()
  }
}

/// Renders `{}` for an empty table and `{k: v, k: v}` otherwise, visiting
/// each slot under its lock.
///
/// # Examples
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// let table: KTab<&str, u32, ConstParams<8>> = KTab::new();
/// assert_eq!(table.to_string(), "{}");
///
/// table.insert("alpha", 1);
/// table.insert("beta", 2);
/// assert_eq!(table.to_string(), "{alpha: 1, beta: 2}");
/// ```
impl<K, V, P> Display for KTab<K, V, P>
where
  K: Display,
  V: Display,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(&self.inner, f)
  }
}

impl<K, V, P> Default for KTab<K, V, P>
where
  P: Params + ?Sized,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
