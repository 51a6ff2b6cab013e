//! The storage cell: one slot of the table.

use core::borrow::Borrow;

use sdd::AtomicOwned;
use sdd::Guard;
use sdd::Owned;
use sdd::Tag;

use crate::index::NIL;
use crate::sync::Mutex;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::AcqRel;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Release;

/// One storage cell.
///
/// A slot is vacant when `home` is [`NIL`] and occupied when `home` holds the
/// bucket id of its key (`hash(key) & BUCKET_MASK`), so a single atomic word
/// covers both the occupancy marker and the cached bucket hint.
///
/// The key is published as an atomic pointer so that lock-free readers can
/// compare keys without holding the slot lock; the pointee is reclaimed
/// through deferred reclamation once no reader can still observe it. The
/// value lives under the slot mutex, which also serializes every occupancy
/// transition of the slot.
pub(crate) struct Slot<K, V> {
  /// Bucket id of the occupying entry, or [`NIL`] when vacant.
  pub(crate) home: AtomicUsize,
  /// Key snapshot for lock-free readers; null when vacant.
  pub(crate) key: AtomicOwned<K>,
  /// The stored value, guarded by the slot lock.
  pub(crate) value: Mutex<Option<V>>,
}

impl<K, V> Slot<K, V> {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      home: AtomicUsize::new(NIL),
      key: AtomicOwned::null(),
      value: Mutex::new(None),
    }
  }

  /// Lock-free occupancy probe: the bucket id, or [`NIL`] when vacant.
  ///
  /// The result is advisory; it may be stale by the time it is used. Callers
  /// acting on it re-verify under the slot lock.
  #[inline]
  pub(crate) fn hint(&self) -> usize {
    self.home.load(Acquire)
  }

  /// Lock-free check that this slot belongs to bucket `hash` and holds `key`.
  ///
  /// Tolerates concurrent mutation: a slot observed mid-transition compares
  /// unequal and the caller treats it as a miss.
  #[inline]
  pub(crate) fn holds<Q>(&self, hash: usize, key: &Q, guard: &Guard) -> bool
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
  {
    if self.home.load(Acquire) != hash {
      return false;
    }

    // SAFETY: Tag bits are never set on key pointers.
    match unsafe { self.key.load(Acquire, guard).as_ref_unchecked() } {
      Some(stored) => stored.borrow() == key,
      None => false,
    }
  }

  /// Publishes `key` and marks the slot occupied in bucket `hash`.
  ///
  /// Must be called with the slot lock held and the slot vacant.
  #[inline]
  pub(crate) fn occupy(&self, hash: usize, key: K)
  where
    K: 'static,
  {
    let previous: Option<Owned<K>> = self.key.swap((Some(Owned::new(key)), Tag::None), AcqRel).0;

    debug_assert!(previous.is_none(), "occupied a slot that still holds a key");

    self.home.store(hash, Release);
  }

  /// Unpublishes the key and marks the slot vacant.
  ///
  /// Must be called with the slot lock held. The old key is retired through
  /// deferred reclamation so in-flight lock-free readers stay valid.
  #[inline]
  pub(crate) fn vacate(&self) {
    self.home.store(NIL, Release);

    let retired: Option<Owned<K>> = self.key.swap((None, Tag::None), AcqRel).0;

    drop(retired);
  }
}
