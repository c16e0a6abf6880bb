//! A reference-counted, capacity-bounded cache of expensive-to-open objects.
//!
//! An [`ObjectCache`] maps keys to payloads built by user supplied
//! [`EntryOps`]. Callers [`hold`] an entry and get a [`Held`] reference back;
//! entries with holders are busy and never evicted for space, entries
//! without holders are idle and kept in least recently released order until
//! the cache grows past its capacity.
//!
//! Eviction of a busy entry is deferred: it disappears from lookups at once
//! and its payload is destroyed when the last [`Held`] goes away.
//!
//! [`ObjectCache`]: struct.ObjectCache.html
//! [`EntryOps`]: trait.EntryOps.html
//! [`hold`]: struct.ObjectCache.html#method.hold
//! [`Held`]: struct.Held.html
#![no_std]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

#[macro_use]
extern crate cfg_if;

mod cache;
mod error;
mod handle;
mod ops;
mod polyfill;
mod raw;

pub use cache::{ObjectCache, ObjectCacheBuilder};
pub use error::{CacheError, HoldError};
pub use handle::{Claim, Held, Reservation};
pub use ops::{EntryOps, FnOps, FnOpsBuilder};
