use core::any;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;
use core::mem;
use core::num::NonZeroUsize;

use crossbeam_utils::CachePadded;

// -----------------------------------------------------------------------------
// Cache-line Properties
// -----------------------------------------------------------------------------

/// The size of a cache line in bytes.
///
/// Slot and bucket storage is aligned to this boundary to minimize false
/// sharing between threads operating on neighboring entries. On most modern
/// x86-64 systems, this is 64 bytes.
pub const CACHE_LINE: usize = mem::size_of::<CachePadded<u8>>();

const _: () = assert!(
  CACHE_LINE.is_power_of_two(),
  "invalid params: `CACHE_LINE` must be a power of two",
);

// -----------------------------------------------------------------------------
// Configurable Params
// -----------------------------------------------------------------------------

/// Configuration parameters for a [`KTab`].
///
/// This trait allows customizing table capacity at compile time. The simplest
/// way to use custom parameters is through [`ConstParams`]:
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// // Table with 8,192 slots
/// type MyTable<K, V> = KTab<K, V, ConstParams<8192>>;
/// ```
///
/// # Implementing `Params`
///
/// For advanced use cases, you can implement `Params` directly:
///
/// ```
/// use ktab::{Params, Capacity, KTab};
///
/// struct LargeParams;
///
/// impl Params for LargeParams {
///   const LENGTH: Capacity = Capacity::new(1 << 20);
/// }
///
/// let table: KTab<u64, u64, LargeParams> = KTab::new();
/// assert_eq!(table.capacity(), 1 << 20);
/// ```
///
/// Note that [`Capacity::new`] clamps values to the valid range. The capacity
/// itself is kept exact; only the derived bucket count ([`ParamsExt::BUCKETS`])
/// rounds up to a power of two.
///
/// [`KTab`]: crate::KTab
pub trait Params {
  /// The maximum number of entries the table can hold.
  ///
  /// This value is clamped to <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
  const LENGTH: Capacity = DefaultParams::LENGTH;
}

// -----------------------------------------------------------------------------
// Configurable Params - Extensions
// -----------------------------------------------------------------------------

/// Derived parameters computed from [`Params`].
///
/// This trait is automatically implemented for all types that implement
/// [`Params`]. It provides computed constants used internally by the table
/// implementation.
///
/// Users generally do not need to interact with this trait directly, but
/// it is exposed for advanced use cases such as debugging configuration.
///
/// # Example
///
/// ```
/// use ktab::{Params, ParamsExt, ConstParams};
///
/// // View derived parameters for a configuration
/// println!("{:#?}", <ConstParams<1024> as ParamsExt>::debug());
/// ```
pub trait ParamsExt: Params + Sealed {
  /// The number of hash buckets: the smallest power of two holding `LENGTH`.
  const BUCKETS: usize = Self::LENGTH.as_usize().next_power_of_two();

  /// Mask applied to a hash value to select a bucket.
  const BUCKET_MASK: usize = Self::BUCKETS - 1;

  fn validate() {
    assert!(
      Self::BUCKETS.is_power_of_two(),
      "invalid params: `BUCKETS` must be a power of two",
    );
    assert!(
      Self::BUCKETS >= Self::LENGTH.as_usize(),
      "invalid params: `BUCKETS` must cover every slot",
    );
  }

  #[inline]
  fn debug() -> DebugParams<Self> {
    DebugParams {
      marker: PhantomData,
    }
  }
}

// -----------------------------------------------------------------------------
// Debug Params
// -----------------------------------------------------------------------------

/// A helper type for displaying [`Params`] configuration.
///
/// This type is returned by [`ParamsExt::debug`] and implements [`Debug`]
/// to display all derived configuration values.
///
/// # Example
///
/// ```
/// use ktab::{ParamsExt, DefaultParams};
///
/// let debug = <DefaultParams as ParamsExt>::debug();
/// println!("{:#?}", debug);
/// ```
#[derive(Clone, Copy)]
pub struct DebugParams<P>
where
  P: ?Sized,
{
  marker: PhantomData<fn(P)>,
}

impl<P> Debug for DebugParams<P>
where
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct(any::type_name::<P>())
      .field("LENGTH", &P::LENGTH)
      .field("BUCKETS", &P::BUCKETS)
      .field("BUCKET_MASK", &format_args!("{:b}", P::BUCKET_MASK))
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Default Params
// -----------------------------------------------------------------------------

/// The default table configuration with 65,536 slots.
///
/// This is the configuration used when creating a [`KTab`] without
/// specifying a custom [`Params`] type.
///
/// # Example
///
/// ```
/// use ktab::{KTab, DefaultParams};
///
/// // These are equivalent:
/// let table1: KTab<u64, u64> = KTab::new();
/// let table2: KTab<u64, u64, DefaultParams> = KTab::new();
///
/// assert_eq!(table1.capacity(), 65_536);
/// ```
///
/// [`KTab`]: crate::KTab
#[derive(Clone, Copy)]
#[non_exhaustive]
pub struct DefaultParams;

impl Debug for DefaultParams {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(&<Self as ParamsExt>::debug(), f)
  }
}

impl Params for DefaultParams {
  const LENGTH: Capacity = Capacity::DEF;
}

// -----------------------------------------------------------------------------
// Const-Generic Params
// -----------------------------------------------------------------------------

/// A [`Params`] implementation with compile-time configurable capacity.
///
/// This is the recommended way to create tables with custom capacities.
/// The capacity `N` is clamped to
/// <code>[Capacity::MIN]..=[Capacity::MAX]</code> and does not need to be a
/// power of two.
///
/// # Examples
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// // Create a table with 4,096 slots
/// let table: KTab<String, usize, ConstParams<4096>> = KTab::new();
/// assert_eq!(table.capacity(), 4096);
/// ```
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// // Capacities are kept exact
/// let table: KTab<String, usize, ConstParams<1000>> = KTab::new();
/// assert_eq!(table.capacity(), 1000);
/// ```
///
/// # Type Aliases
///
/// For frequently-used configurations, consider defining a type alias:
///
/// ```
/// use ktab::{KTab, ConstParams};
///
/// type SmallTable<K, V> = KTab<K, V, ConstParams<64>>;
/// type LargeTable<K, V> = KTab<K, V, ConstParams<{ 1 << 20 }>>;
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConstParams<const N: usize>;

impl<const N: usize> Params for ConstParams<N> {
  const LENGTH: Capacity = Capacity::new(N);
}

// -----------------------------------------------------------------------------
// Auto-implement Derive
// -----------------------------------------------------------------------------

mod private {
  pub trait Sealed {}
}

use private::Sealed;

impl<P> Sealed for P where P: Params + ?Sized {}
impl<P> ParamsExt for P where P: Params + ?Sized {}

// -----------------------------------------------------------------------------
// Capacity
// -----------------------------------------------------------------------------

/// A validated table capacity value.
///
/// `Capacity` represents a value in the range [`MIN`]`..=`[`MAX`].
/// It is used by [`Params::LENGTH`] to specify how many entries a table can
/// hold.
///
/// # Construction
///
/// Use [`Capacity::new`] to create a capacity from an arbitrary value. The
/// value is clamped to the valid range but otherwise kept exact — a table
/// may hold a non-power-of-two number of slots.
///
/// ```
/// use ktab::Capacity;
///
/// // Exact
/// let cap = Capacity::new(1000);
/// assert_eq!(cap.as_usize(), 1000);
///
/// // Clamped to minimum
/// let cap = Capacity::new(0);
/// assert_eq!(cap, Capacity::MIN);
///
/// // Clamped to maximum
/// let cap = Capacity::new(usize::MAX);
/// assert_eq!(cap, Capacity::MAX);
/// ```
///
/// [`MIN`]: Self::MIN
/// [`MAX`]: Self::MAX
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Capacity(NonZeroUsize);

impl Capacity {
  /// The minimum supported capacity: 2 entries.
  pub const MIN: Self = Self(NonZeroUsize::new(2).unwrap());

  /// The maximum supported capacity: 134,217,728 entries (2²⁷).
  pub const MAX: Self = Self(NonZeroUsize::new(1 << 27).unwrap());

  /// The default capacity: 65,536 entries (2¹⁶).
  pub const DEF: Self = Self(NonZeroUsize::new(1 << 16).unwrap());

  /// Creates a new `Capacity` from an arbitrary value.
  ///
  /// The value is clamped to [`MIN`]`..=`[`MAX`].
  ///
  /// # Examples
  ///
  /// ```
  /// use ktab::Capacity;
  ///
  /// assert_eq!(Capacity::new(100).as_usize(), 100);
  /// assert_eq!(Capacity::new(0), Capacity::MIN);
  /// ```
  ///
  /// [`MIN`]: Self::MIN
  /// [`MAX`]: Self::MAX
  #[inline]
  pub const fn new(value: usize) -> Self {
    if value < Self::MIN.as_usize() {
      Self::MIN
    } else if value > Self::MAX.as_usize() {
      Self::MAX
    } else {
      // SAFETY: `value` is at least `Self::MIN`, which is non-zero.
      unsafe { Self::new_unchecked(value) }
    }
  }

  /// Creates a new `Capacity` without validation.
  ///
  /// # Safety
  ///
  /// `value` must be in the range [`MIN`]`..=`[`MAX`].
  ///
  /// [`MIN`]: Self::MIN
  /// [`MAX`]: Self::MAX
  #[inline]
  pub const unsafe fn new_unchecked(value: usize) -> Self {
    // SAFETY: Caller guarantees `value` is a valid `Capacity`.
    Self(unsafe { NonZeroUsize::new_unchecked(value) })
  }

  /// Returns the capacity as a [`usize`].
  #[inline]
  pub const fn as_usize(self) -> usize {
    self.0.get()
  }

  /// Returns the capacity as a [`NonZeroUsize`].
  #[inline]
  pub const fn as_nonzero(self) -> NonZeroUsize {
    self.0
  }
}

impl Debug for Capacity {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(&self.0, f)
  }
}

impl Default for Capacity {
  #[inline]
  fn default() -> Capacity {
    Capacity::DEF
  }
}

impl From<Capacity> for NonZeroUsize {
  #[inline]
  fn from(other: Capacity) -> NonZeroUsize {
    other.as_nonzero()
  }
}

impl From<Capacity> for usize {
  #[inline]
  fn from(other: Capacity) -> usize {
    other.as_usize()
  }
}
