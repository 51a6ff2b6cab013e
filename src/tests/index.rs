use crate::index::NIL;
use crate::index::NOT_IN_STASH;
use crate::index::SlotRef;

#[test]
fn test_sentinel_bits() {
  assert_eq!(NOT_IN_STASH, SlotRef::from_bits(NIL));
  assert_eq!(NOT_IN_STASH.into_bits(), NIL);
}

#[test]
fn test_bits_roundtrip() {
  for bits in [0_usize, 1, 42, NIL] {
    assert_eq!(SlotRef::from_bits(bits).into_bits(), bits);
  }
}

#[test]
fn test_slot_resolution() {
  assert_eq!(SlotRef::from_bits(7).slot(), Some(7));
  assert_eq!(NOT_IN_STASH.slot(), None);
}

#[test]
fn test_equality() {
  assert_eq!(SlotRef::from_bits(3), SlotRef::from_bits(3));
  assert_ne!(SlotRef::from_bits(3), SlotRef::from_bits(4));
  assert_ne!(SlotRef::from_bits(3), NOT_IN_STASH);
}

#[test]
fn test_formatting() {
  assert_eq!(format!("{}", SlotRef::from_bits(3)), "3");
  assert_eq!(format!("{:?}", SlotRef::from_bits(3)), "3");
  assert_eq!(format!("{NOT_IN_STASH}"), "NOT_IN_STASH");
  assert_eq!(format!("{NOT_IN_STASH:?}"), "NOT_IN_STASH");
}
