//! Monotonic counter aggregate for the keel storage engine.
//!
//! `CounterStore` issues every identifier the MVCC scheme depends on and is
//! the only producer/consumer of the durable counter snapshot. Companion
//! modules cover recovery replay (`replay`) and conversion-mode id
//! remapping (`remap`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod remap;
pub mod replay;
pub mod store;

pub use remap::{UsedIdMap, MAX_SYSTEM_ID};
pub use replay::CounterId;
pub use store::{CommitPolicy, CounterStore};
