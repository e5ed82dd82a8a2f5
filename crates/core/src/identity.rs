//! Wraparound-safe scalar identifiers.
//!
//! This module defines the two 32-bit monotonic scalars the MVCC layer is
//! built on:
//!
//! - `TransactionId`: unique per transaction
//! - `TransactionNum`: commit sequence number, used as a snapshot read level
//!
//! Both share the same raw encoding: `0` is NULL, `-1` is ILLEGAL, and live
//! values occupy `[1, MAX_LIMIT)`. The band `[MAX_LIMIT, i32::MAX]` together
//! with the remaining negative values is a reserved gap that live counters
//! never enter; arithmetic that would cross the gap skips over it, which is
//! what keeps wraparound unambiguous (see [`crate::split`]).

use std::cmp::Ordering;
use std::fmt;

/// Exclusive upper bound of the live scalar range.
///
/// The raw values `[MAX_LIMIT, i32::MAX]` form the reserved gap band at the
/// top of the range. Incrementing into the band lands on `1`; decrementing
/// below `1` lands on `MAX_LIMIT - 1`.
pub const MAX_LIMIT: i32 = i32::MAX - 255;

/// Half-width of the advisory [`Bounds`](crate::bounds::Bounds) window.
pub const BOUNDS_GAP: i32 = 1 << 20;

/// Gap-skipping add over the shared raw encoding.
///
/// Preconditions (debug-asserted): `raw` is a live value and `n != 0`.
fn gap_advance(raw: i32, n: i32) -> i32 {
    debug_assert!(n != 0, "counter increment must be non-zero");
    debug_assert!(
        (1..MAX_LIMIT).contains(&raw),
        "counter arithmetic on non-live value {raw}"
    );
    let sum = raw as i64 + n as i64;
    if n > 0 {
        if sum >= MAX_LIMIT as i64 - 1 {
            // Entered the gap going up: wrap to the bottom of the live range.
            1
        } else {
            sum as i32
        }
    } else if sum < 1 {
        // Entered the gap going down: wrap to just below the gap boundary.
        MAX_LIMIT - 1
    } else {
        sum as i32
    }
}

fn raw_is_representable(raw: i32) -> bool {
    raw == 0 || (1..MAX_LIMIT).contains(&raw)
}

macro_rules! counter_scalar {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(i32);

        impl $name {
            /// The NULL scalar. Compares strictly smaller than every live value.
            pub const NULL: $name = $name(0);

            /// The ILLEGAL sentinel. Never issued; only used to mark slots
            /// whose value is known to be invalid.
            pub const ILLEGAL: $name = $name(-1);

            /// Wrap a raw value.
            ///
            /// Debug-asserts that the raw value is NULL or inside the live
            /// range; constructing out-of-range values is a programming
            /// error, not a recoverable condition.
            pub fn new(raw: i32) -> $name {
                debug_assert!(
                    raw_is_representable(raw),
                    concat!(stringify!($name), " raw value {} outside live range"),
                    raw
                );
                $name(raw)
            }

            /// Wrap a raw value without validating it.
            ///
            /// For codecs decoding possibly-torn blocks, where inconsistency
            /// must surface as a boolean and not an assertion; callers
            /// validate separately via `is_representable`.
            pub fn from_raw(raw: i32) -> $name {
                $name(raw)
            }

            /// The first value a fresh counter issues.
            pub fn first() -> $name {
                $name(1)
            }

            /// Raw encoding of this scalar.
            pub fn raw(self) -> i32 {
                self.0
            }

            /// Whether this scalar is NULL.
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            /// Whether the raw encoding is NULL or a live value.
            pub fn is_representable(self) -> bool {
                raw_is_representable(self.0)
            }

            /// Add a non-zero signed increment, skipping the reserved gap.
            ///
            /// Incrementing into the gap yields `1`; decrementing below `1`
            /// yields `MAX_LIMIT - 1`. Preconditions (debug-asserted): the
            /// scalar is non-NULL and `n != 0`.
            pub fn advance(self, n: i32) -> $name {
                $name(gap_advance(self.0, n))
            }
        }

        // NULL sorts strictly below every live value even though its raw
        // encoding (0) would otherwise sit below the range anyway; the
        // explicit match keeps the contract independent of the encoding.
        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                match (self.is_null(), other.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => self.0.cmp(&other.0),
                }
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NULL
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, concat!(stringify!($name), "(NULL)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

counter_scalar! {
    /// Unique identifier of a transaction.
    TransactionId
}

counter_scalar! {
    /// Commit sequence number, used as a snapshot read level.
    TransactionNum
}

impl TransactionNum {
    /// Reinterpret a transaction id as a commit sequence number.
    ///
    /// Used when the commit policy derives the commit number directly from
    /// the committing transaction's id.
    pub fn from_trxid(id: TransactionId) -> TransactionNum {
        TransactionNum::new(id.raw())
    }
}

impl TransactionId {
    /// Reinterpret a commit sequence number as a transaction id.
    pub fn from_trxnum(num: TransactionNum) -> TransactionId {
        TransactionId::new(num.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_smallest() {
        let null = TransactionId::NULL;
        for raw in [1, 2, 1000, MAX_LIMIT - 1] {
            let live = TransactionId::new(raw);
            assert!(null < live, "NULL must sort below {live}");
            assert!(live > null);
        }
        assert_eq!(null.cmp(&TransactionId::NULL), Ordering::Equal);
    }

    #[test]
    fn test_live_ordering_is_raw_ordering() {
        let a = TransactionNum::new(10);
        let b = TransactionNum::new(11);
        assert!(a < b);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn test_advance_simple() {
        let id = TransactionId::new(41).advance(1);
        assert_eq!(id.raw(), 42);
        let id = id.advance(-2);
        assert_eq!(id.raw(), 40);
    }

    #[test]
    fn test_gap_skip_incrementing() {
        // One step from the gap plus two lands on 1, never inside the band.
        let near = TransactionId::new(MAX_LIMIT - 2);
        assert_eq!(near.advance(2).raw(), 1);
        assert_eq!(near.advance(1).raw(), 1);
        // Still one short of the band: stays live.
        assert_eq!(TransactionId::new(MAX_LIMIT - 3).advance(1).raw(), MAX_LIMIT - 2);
    }

    #[test]
    fn test_gap_skip_decrementing() {
        let low = TransactionNum::new(1);
        assert_eq!(low.advance(-1).raw(), MAX_LIMIT - 1);
        assert_eq!(TransactionNum::new(2).advance(-3).raw(), MAX_LIMIT - 1);
        assert_eq!(TransactionNum::new(2).advance(-1).raw(), 1);
    }

    #[test]
    fn test_first_and_default() {
        assert_eq!(TransactionId::first().raw(), 1);
        assert!(TransactionId::default().is_null());
    }

    #[test]
    fn test_reinterpret_between_scalars() {
        let id = TransactionId::new(77);
        let num = TransactionNum::from_trxid(id);
        assert_eq!(num.raw(), 77);
        assert_eq!(TransactionId::from_trxnum(num), id);
    }

    #[test]
    fn test_representable() {
        assert!(TransactionId::NULL.is_representable());
        assert!(TransactionId::new(1).is_representable());
        assert!(!TransactionId::ILLEGAL.is_representable());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_zero_increment_asserts() {
        let _ = TransactionId::new(5).advance(0);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_advance_on_null_asserts() {
        let _ = TransactionId::NULL.advance(1);
    }
}
