//! The bucket directory entry.

use crate::index::NIL;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Relaxed;

/// One hash-bucket entry: a member count and the span endpoints.
///
/// `first` and `last` bracket the slot indices of the bucket's members.
/// Slots strictly between the endpoints may belong to other buckets; the
/// span only narrows the linear scan during lookup. With one member only
/// `first` is meaningful; with none both endpoints are [`NIL`].
///
/// All three words are mutated exclusively under the structural lock and
/// read lock-free as advisory hints by lookups.
pub(crate) struct Bucket {
  pub(crate) count: AtomicUsize,
  pub(crate) first: AtomicUsize,
  pub(crate) last: AtomicUsize,
}

impl Bucket {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      count: AtomicUsize::new(0),
      first: AtomicUsize::new(NIL),
      last: AtomicUsize::new(NIL),
    }
  }

  /// Resets to the empty state. Called under the structural lock.
  #[inline]
  pub(crate) fn reset(&self) {
    self.count.store(0, Relaxed);
    self.first.store(NIL, Relaxed);
    self.last.store(NIL, Relaxed);
  }
}
