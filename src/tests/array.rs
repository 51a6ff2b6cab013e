use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::Relaxed;

use crate::array::Array;

#[test]
fn test_init() {
  let array: Array<usize> = Array::new(16, |index, slot| {
    slot.write(index * 3);
  });

  assert_eq!(array.as_slice().len(), 16);

  for (index, item) in array.as_slice().iter().enumerate() {
    assert_eq!(*item, index * 3);
    assert_eq!(array.get(index), item);
  }
}

#[test]
fn test_drop() {
  static COUNT: AtomicU32 = AtomicU32::new(0);

  struct DropMe;

  impl Drop for DropMe {
    fn drop(&mut self) {
      COUNT.fetch_add(1, Relaxed);
    }
  }

  let array: Array<DropMe> = Array::new(16, |_, slot| {
    slot.write(DropMe);
  });

  assert_eq!(COUNT.load(Relaxed), 0);
  drop(array);
  assert_eq!(COUNT.load(Relaxed), 16);
}
