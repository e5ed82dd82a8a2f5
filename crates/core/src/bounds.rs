//! Advisory min/max bounds around the live counters.
//!
//! Stored identifiers are sanity-checked against a fixed-size window around
//! the current TransactionId and TransactionNum positions instead of a full
//! counter walk. The window is an explicit value owned by the database
//! instance and refreshed whenever a counter moves materially (a large jump
//! during recovery, a snapshot restore), not a process-wide static.

use crate::identity::{TransactionId, TransactionNum, BOUNDS_GAP};

/// Advisory lower/upper bounds for stored scalar identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Smallest transaction id considered plausible.
    pub trxid_min: TransactionId,
    /// Largest transaction id considered plausible.
    pub trxid_max: TransactionId,
    /// Smallest commit number considered plausible.
    pub trxnum_min: TransactionNum,
    /// Largest commit number considered plausible.
    pub trxnum_max: TransactionNum,
}

impl Bounds {
    /// Bounds for a database whose counters have not issued anything yet.
    pub fn initial() -> Bounds {
        let mut bounds = Bounds {
            trxid_min: TransactionId::NULL,
            trxid_max: TransactionId::NULL,
            trxnum_min: TransactionNum::NULL,
            trxnum_max: TransactionNum::NULL,
        };
        bounds.refresh(TransactionId::first(), TransactionNum::first());
        bounds
    }

    /// Recompute the window as current ± the fixed gap, with gap-skipping
    /// arithmetic so the window itself never covers the reserved band.
    ///
    /// NULL inputs (a counter that has issued nothing) anchor the window at
    /// the first issuable value.
    pub fn refresh(&mut self, trxid: TransactionId, trxnum: TransactionNum) {
        let id = if trxid.is_null() { TransactionId::first() } else { trxid };
        let num = if trxnum.is_null() { TransactionNum::first() } else { trxnum };
        self.trxid_min = id.advance(-BOUNDS_GAP);
        self.trxid_max = id.advance(BOUNDS_GAP);
        self.trxnum_min = num.advance(-BOUNDS_GAP);
        self.trxnum_max = num.advance(BOUNDS_GAP);
    }

    /// Whether a stored transaction id falls inside the advisory window.
    ///
    /// A window that wraps the gap (min above max) is checked as the union
    /// of the two live segments.
    pub fn plausible_trxid(&self, id: TransactionId) -> bool {
        Self::within(self.trxid_min.raw(), self.trxid_max.raw(), id.raw())
    }

    /// Whether a stored commit number falls inside the advisory window.
    pub fn plausible_trxnum(&self, num: TransactionNum) -> bool {
        Self::within(self.trxnum_min.raw(), self.trxnum_max.raw(), num.raw())
    }

    fn within(min: i32, max: i32, value: i32) -> bool {
        if min <= max {
            (min..=max).contains(&value)
        } else {
            // Window wraps the gap band.
            value >= min || (1..=max).contains(&value)
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MAX_LIMIT;

    #[test]
    fn test_initial_window_is_anchored_at_first() {
        let bounds = Bounds::initial();
        assert!(bounds.plausible_trxid(TransactionId::first()));
        assert!(bounds.plausible_trxid(TransactionId::new(BOUNDS_GAP)));
        assert!(!bounds.plausible_trxid(TransactionId::new(2 * BOUNDS_GAP + 10)));
    }

    #[test]
    fn test_refresh_moves_window() {
        let mut bounds = Bounds::initial();
        let id = TransactionId::new(50_000_000);
        let num = TransactionNum::new(40_000_000);
        bounds.refresh(id, num);

        assert!(bounds.plausible_trxid(id));
        assert!(bounds.plausible_trxid(id.advance(-BOUNDS_GAP + 1)));
        assert!(!bounds.plausible_trxid(TransactionId::new(1)));
        assert!(bounds.plausible_trxnum(num));
        assert!(!bounds.plausible_trxnum(TransactionNum::new(1)));
    }

    #[test]
    fn test_window_wrapping_the_gap() {
        let mut bounds = Bounds::initial();
        // Counter near the top of the live range: the upper edge of the
        // window wraps past the gap to small values.
        let id = TransactionId::new(MAX_LIMIT - 10);
        bounds.refresh(id, TransactionNum::new(MAX_LIMIT - 10));

        assert!(bounds.plausible_trxid(id));
        // The upper edge skipped the gap down to 1.
        assert!(bounds.plausible_trxid(TransactionId::new(1)));
        assert!(!bounds.plausible_trxid(TransactionId::new(MAX_LIMIT / 2)));
    }

    #[test]
    fn test_null_inputs_anchor_at_first() {
        let mut bounds = Bounds::initial();
        bounds.refresh(TransactionId::NULL, TransactionNum::NULL);
        assert!(bounds.plausible_trxid(TransactionId::first()));
    }
}
