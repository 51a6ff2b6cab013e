//! Slot handle and sentinel encoding.

use core::fmt::Debug;
use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;

/// Reserved word meaning "no slot" / "vacant".
///
/// Shared by the slot occupancy field and the bucket span endpoints; it is
/// distinct from every valid slot index and bucket id, both of which are
/// bounded by [`Capacity::MAX`].
///
/// [`Capacity::MAX`]: crate::Capacity::MAX
pub(crate) const NIL: usize = usize::MAX;

/// The reserved [`SlotRef`] indicating "no such slot".
///
/// Returned by [`KTab::find_index`] when a key is absent and by
/// [`KTab::insert`]/[`KTab::upsert`] when the table is full. It is the only
/// `SlotRef` value that never addresses a slot.
///
/// # Examples
///
/// ```
/// use ktab::{KTab, NOT_IN_STASH};
///
/// let table: KTab<&str, u32> = KTab::new();
/// assert_eq!(table.find_index("missing"), NOT_IN_STASH);
/// ```
///
/// [`KTab::find_index`]: crate::KTab::find_index
/// [`KTab::insert`]: crate::KTab::insert
/// [`KTab::upsert`]: crate::KTab::upsert
pub const NOT_IN_STASH: SlotRef = SlotRef { bits: NIL };

/// An opaque handle addressing one slot of a [`KTab`].
///
/// `SlotRef` values are returned by [`KTab::insert`], [`KTab::upsert`],
/// [`KTab::find_index`], and [`KTab::keys`], and can be passed to
/// [`KTab::with_found`] to skip a repeated lookup.
///
/// # Staleness
///
/// A `SlotRef` is **not** a reference: between the moment it is obtained and
/// the moment it is used, another thread may have deleted the entry and
/// reused the slot for a different key. Every consumer re-verifies occupancy
/// and key equality under the slot lock before touching the value, so a stale
/// handle degrades into a miss, never into wrong data.
///
/// # Examples
///
/// ```
/// use ktab::{KTab, NOT_IN_STASH};
///
/// let table: KTab<&str, u32> = KTab::new();
///
/// let (slot, inserted) = table.insert("alpha", 7);
/// assert!(inserted);
/// assert_ne!(slot, NOT_IN_STASH);
///
/// // Handles are Copy and compare by the slot they address
/// assert_eq!(table.find_index("alpha"), slot);
/// ```
///
/// [`KTab`]: crate::KTab
/// [`KTab::insert`]: crate::KTab::insert
/// [`KTab::upsert`]: crate::KTab::upsert
/// [`KTab::find_index`]: crate::KTab::find_index
/// [`KTab::keys`]: crate::KTab::keys
/// [`KTab::with_found`]: crate::KTab::with_found
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotRef {
  bits: usize,
}

impl SlotRef {
  /// Creates a `SlotRef` from its raw bit representation.
  ///
  /// This is primarily useful for serialization or interop with external
  /// systems that need to store handles as plain integers.
  ///
  /// # Warning
  ///
  /// The returned handle may not correspond to any valid entry. Using an
  /// arbitrary bit pattern with table operations is safe but will likely
  /// behave as a miss.
  #[inline]
  pub const fn from_bits(bits: usize) -> Self {
    Self { bits }
  }

  /// Returns the raw bit representation of this handle.
  ///
  /// This is primarily useful for serialization or debugging.
  #[inline]
  pub const fn into_bits(self) -> usize {
    self.bits
  }

  #[inline]
  pub(crate) const fn new(index: usize) -> Self {
    Self { bits: index }
  }

  /// The addressed slot index, or [`None`] for the sentinel.
  #[inline]
  pub(crate) const fn slot(self) -> Option<usize> {
    if self.bits == NIL { None } else { Some(self.bits) }
  }
}

impl Debug for SlotRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for SlotRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    if self.bits == NIL {
      f.write_str("NOT_IN_STASH")
    } else {
      Display::fmt(&self.bits, f)
    }
  }
}
