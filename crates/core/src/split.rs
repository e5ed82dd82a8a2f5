//! Split view of 64-bit counters and high-word reconstruction.
//!
//! The durable formats persist 64-bit counters as two 32-bit halves, and a
//! number of call sites (old identifiers embedded in index entries, wire
//! messages) carry only the low half of a previously issued value. The
//! matching high word is recovered from the current in-memory counter under
//! the invariant that at most one wraparound of the low word separates the
//! observed value from "now".

/// A 64-bit counter viewed as (hi, lo) 32-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitCounter {
    /// Most significant 32 bits.
    pub hi: u32,
    /// Least significant 32 bits.
    pub lo: u32,
}

impl SplitCounter {
    /// Build a split view from halves.
    pub fn new(hi: u32, lo: u32) -> SplitCounter {
        SplitCounter { hi, lo }
    }

    /// Split a full 64-bit value.
    pub fn from_u64(value: u64) -> SplitCounter {
        SplitCounter {
            hi: (value >> 32) as u32,
            lo: value as u32,
        }
    }

    /// Recombine into a full 64-bit value.
    pub fn as_u64(self) -> u64 {
        ((self.hi as u64) << 32) | self.lo as u64
    }
}

/// Recover the high word matching `observed_lo`, the truncated low half of
/// a previously issued value of the counter currently at `current`.
///
/// The signed difference alone is ambiguous near the wrap boundary; pairing
/// its sign with the unsigned relative order of the two low words separates
/// a genuine wraparound from ordinary forward/backward distance:
///
/// - signed diff negative but observed unsigned-below current: the observed
///   value comes from a *future* wrap of the low word (`hi + 1`)
/// - signed diff positive but observed unsigned-above current: the observed
///   value predates the last wraparound (`hi - 1`)
/// - otherwise both values are in the same era (`hi`)
pub fn reconstruct_high(current: SplitCounter, observed_lo: u32) -> u32 {
    let diff = current.lo.wrapping_sub(observed_lo) as i32;
    if diff < 0 && observed_lo < current.lo {
        current.hi.wrapping_add(1)
    } else if diff > 0 && observed_lo > current.lo {
        current.hi.wrapping_sub(1)
    } else {
        current.hi
    }
}

/// Rebuild the full 64-bit value of a previously issued counter from its
/// observed low word and the current counter position.
pub fn reconstruct_u64(current: u64, observed_lo: u32) -> u64 {
    let split = SplitCounter::from_u64(current);
    SplitCounter::new(reconstruct_high(split, observed_lo), observed_lo).as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_roundtrip() {
        for value in [0u64, 1, u32::MAX as u64, 1 << 32, u64::MAX, 0x0000_0005_0000_000A] {
            assert_eq!(SplitCounter::from_u64(value).as_u64(), value);
        }
    }

    #[test]
    fn test_same_era() {
        let current = SplitCounter::new(5, 10);
        // Slightly older value, no wrap in between.
        assert_eq!(reconstruct_high(current, 7), 5);
        assert_eq!(reconstruct_high(current, 10), 5);
    }

    #[test]
    fn test_observed_predates_wraparound() {
        // Current low word is 10 after a wrap; the observed value was issued
        // just before the wrap.
        let current = SplitCounter::new(5, 10);
        assert_eq!(reconstruct_high(current, 4_294_967_290), 4);
    }

    #[test]
    fn test_observed_from_future_wrap() {
        // Current low word sits just below the wrap; the observed value is
        // unsigned-small but signed-ahead, so it belongs to the next era.
        let current = SplitCounter::new(5, 4_294_967_290);
        assert_eq!(reconstruct_high(current, 4), 6);
    }

    #[test]
    fn test_observed_slightly_ahead_same_era() {
        // An allocation racing just past the snapshot of "current" must not
        // be treated as a wraparound.
        let current = SplitCounter::new(5, 10);
        assert_eq!(reconstruct_high(current, 11), 5);
    }

    #[test]
    fn test_reconstruct_u64() {
        let current = 0x0000_0005_0000_000Au64; // (hi=5, lo=10)
        assert_eq!(reconstruct_u64(current, 4_294_967_290), 0x0000_0004_FFFF_FFFAu64);
        assert_eq!(reconstruct_u64(current, 11), 0x0000_0005_0000_000Bu64);
    }
}
