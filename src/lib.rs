//! A fixed-capacity concurrent hash table with lock-free lookups.
//!
//! `ktab` provides [`KTab`], a shared-memory associative map built for
//! workloads where many threads hold values at once while doing non-trivial
//! work on them — including blocking I/O — and a global write lock held for
//! that long would be unacceptable.
//!
//! # Overview
//!
//! The table owns a fixed array of slots, each with its own lock, plus a
//! power-of-two bucket directory that records, per bucket, a member count
//! and the first/last slot indices bracketing the bucket's members. Lookups
//! and iteration read these words atomically and take no locks; mutations
//! serialize on a single structural lock and then touch exactly one slot
//! lock. Freed slots are recycled through a deletion stack before the
//! allocation frontier advances.
//!
//! Every lookup result is an opaque [`SlotRef`] handle. A handle can go
//! stale at any moment — the sanctioned way to touch a value is a scoped
//! access ([`KTab::with_value`] / [`KTab::with_found`]), which re-verifies
//! occupancy and key equality under the slot lock before running your
//! closure.
//!
//! # Usage
//!
//! ```
//! use ktab::{KTab, NOT_IN_STASH};
//!
//! let table: KTab<String, u64> = KTab::new();
//!
//! // Insert an entry and get its slot handle
//! let (slot, inserted) = table.insert("hello".to_owned(), 1);
//! assert!(inserted);
//!
//! // Look up and mutate in place, under the slot's lock
//! table.with_value("hello", |count| *count += 1);
//! assert_eq!(table.with_value("hello", |count| *count), Some(2));
//!
//! // A handle from an earlier lookup still works while it is fresh
//! assert_eq!(table.find_index("hello"), slot);
//!
//! // Remove the entry
//! table.delete("hello");
//! assert_eq!(table.find_index("hello"), NOT_IN_STASH);
//! ```
//!
//! # Configuration
//!
//! Table capacity is configured at compile time through the [`Params`]
//! trait. The default configuration ([`DefaultParams`]) provides
//! [`Capacity::DEF`] slots; use [`ConstParams`] for anything else:
//!
//! ```
//! use ktab::{KTab, ConstParams};
//!
//! let table: KTab<u64, u64, ConstParams<4096>> = KTab::new();
//! assert_eq!(table.capacity(), 4096);
//! ```
//!
//! Capacity is fixed for the table's lifetime. To grow, create a larger
//! table, [`KTab::add_all`] into it, and swap references at the application
//! level.
//!
//! # Concurrency
//!
//! All operations are thread-safe. The design point is that a thread parked
//! inside a scoped access pins only its own slot:
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use ktab::{KTab, ConstParams};
//!
//! let table: Arc<KTab<u64, u64, ConstParams<1024>>> = Arc::new(KTab::new());
//!
//! let handles: Vec<_> = (0..4)
//!   .map(|thread_id| {
//!     let table = Arc::clone(&table);
//!     thread::spawn(move || {
//!       for i in 0..100 {
//!         let key = thread_id * 1000 + i;
//!         table.insert(key, i);
//!         table.with_value(&key, |v| *v += 1);
//!         table.delete(&key);
//!       }
//!     })
//!   })
//!   .collect();
//!
//! for handle in handles {
//!   handle.join().unwrap();
//! }
//!
//! assert!(table.is_empty());
//! ```
//!
//! ## Lock hierarchy
//!
//! Two lock levels exist: the structural lock (bucket directory, frontier,
//! deletion stack) and one lock per slot. Internally the structural lock is
//! always acquired before a slot lock, never the reverse. Two rules bind
//! the caller:
//!
//! - **Never nest scoped accesses.** Entering [`KTab::with_value`] or
//!   [`KTab::with_found`] from inside another scoped access's closure can
//!   deadlock, because no global key ordering is enforced between slot
//!   locks.
//! - **Never mutate the table from inside a scoped closure.** `insert`,
//!   `upsert`, `set`, `delete`, `clear`, `add_all`, and `len` take the
//!   structural lock and will deadlock against a concurrent writer waiting
//!   on the closure's slot.
//!
//! Neither violation is detected; both manifest as a hang.
//!
//! ## Iteration and aggregate queries
//!
//! [`KTab::keys`] walks the slot array without locks and observes a weakly
//! consistent view; [`KTab::len`] is exact only at the instant it is
//! computed. Callers needing a consistent whole-table snapshot should copy
//! out via [`KTab::add_all`] first.
//!
//! # Capacity Limits
//!
//! Capacity is bounded by [`Capacity::MIN`] and [`Capacity::MAX`]. When
//! full, [`KTab::insert`] and [`KTab::upsert`] return
//! <code>([NOT_IN_STASH], false)</code> and the table remains fully usable;
//! deleting any key makes room again.
//!
//! [NOT_IN_STASH]: crate::NOT_IN_STASH

mod array;
mod bucket;
mod index;
mod params;
mod public;
mod slot;
mod table;

#[cfg(all(test, not(loom)))]
mod tests;

pub mod implementation {
  #![doc = include_str!("../IMPLEMENTATION.md")]
}

pub use self::index::NOT_IN_STASH;
pub use self::index::SlotRef;
pub use self::params::CACHE_LINE;
pub use self::params::Capacity;
pub use self::params::ConstParams;
pub use self::params::DebugParams;
pub use self::params::DefaultParams;
pub use self::params::Params;
pub use self::params::ParamsExt;
pub use self::public::KTab;
pub use self::table::Keys;

mod alloc {
  #[cfg(loom)]
  mod exports {
    pub(crate) use ::loom::alloc::alloc;
    pub(crate) use ::loom::alloc::dealloc;
    pub(crate) use ::std::alloc::handle_alloc_error;
  }

  #[cfg(not(loom))]
  mod exports {
    pub(crate) use ::std::alloc::alloc;
    pub(crate) use ::std::alloc::dealloc;
    pub(crate) use ::std::alloc::handle_alloc_error;
  }

  pub(crate) use self::exports::*;
}

mod sync {
  #[cfg(not(loom))]
  mod exports {
    pub(crate) use ::parking_lot::Mutex;

    pub(crate) mod atomic {
      pub(crate) use ::core::sync::atomic::AtomicUsize;
      pub(crate) use ::core::sync::atomic::Ordering;
    }
  }

  #[cfg(loom)]
  mod exports {
    pub(crate) mod atomic {
      pub(crate) use ::loom::sync::atomic::AtomicUsize;
      pub(crate) use ::loom::sync::atomic::Ordering;
    }

    /// Thin shim exposing the `parking_lot` locking API over loom's mutex.
    pub(crate) struct Mutex<T> {
      inner: ::loom::sync::Mutex<T>,
    }

    impl<T> Mutex<T> {
      #[inline]
      pub(crate) fn new(value: T) -> Self {
        Self {
          inner: ::loom::sync::Mutex::new(value),
        }
      }

      #[inline]
      pub(crate) fn lock(&self) -> ::loom::sync::MutexGuard<'_, T> {
        self
          .inner
          .lock()
          .unwrap_or_else(::std::sync::PoisonError::into_inner)
      }
    }
  }

  pub(crate) use self::exports::*;
}
