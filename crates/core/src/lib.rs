//! Scalar identity types for the keel storage engine.
//!
//! This crate defines the foundational identifiers every other keel layer
//! builds on:
//!
//! - `TransactionId` / `TransactionNum`: wraparound-safe 32-bit scalars with
//!   gap-skipping arithmetic and NULL-smallest ordering
//! - `SplitCounter` / `reconstruct_high`: (hi, lo) views of 64-bit counters
//!   and recovery of a truncated high word
//! - `Bounds`: the advisory plausibility window around the live counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounds;
pub mod identity;
pub mod split;

pub use bounds::Bounds;
pub use identity::{TransactionId, TransactionNum, BOUNDS_GAP, MAX_LIMIT};
pub use split::{reconstruct_high, reconstruct_u64, SplitCounter};
