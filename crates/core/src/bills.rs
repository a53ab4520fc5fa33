use serde::{Deserialize, Serialize};

/// Cash denominations handed out, largest first.
pub const BILL_DENOMINATIONS: [u64; 3] = [20, 5, 1];

/// Largest amount [`calculate_bills`] will split: `u64::MAX` twenties.
pub const MAX_BILL_AMOUNT: f64 = 20.0 * u64::MAX as f64;

/// Count of each bill that makes up a rounded payout.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillBreakdown {
    pub twenties: u64,
    pub fives: u64,
    pub ones: u64,
}

impl BillBreakdown {
    /// Whole dollars represented by the breakdown.
    pub fn total(&self) -> u128 {
        20 * u128::from(self.twenties) + 5 * u128::from(self.fives) + u128::from(self.ones)
    }
}

impl std::fmt::Display for BillBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×$20 {}×$5 {}×$1", self.twenties, self.fives, self.ones)
    }
}

/// Split `amount` into bills after rounding to the nearest dollar.
///
/// Greedy allocation over [`BILL_DENOMINATIONS`]; exact because `1` is in the set.
/// Negative and non-finite amounts yield an empty breakdown, as do amounts above
/// [`MAX_BILL_AMOUNT`] whose twenties would not fit in a `u64`.
pub fn calculate_bills(amount: f64) -> BillBreakdown {
    let rounded = amount.round();
    if !rounded.is_finite() || rounded <= 0.0 || rounded > MAX_BILL_AMOUNT {
        return BillBreakdown::default();
    }

    // Integral and below 2^69 here, so the cast is exact.
    let mut remainder = rounded as u128;
    let mut counts = [0u64; 3];
    for (slot, value) in counts.iter_mut().zip(BILL_DENOMINATIONS) {
        let value = u128::from(value);
        let Ok(count) = u64::try_from(remainder / value) else {
            return BillBreakdown::default();
        };
        *slot = count;
        remainder -= u128::from(count) * value;
    }
    debug_assert_eq!(remainder, 0);

    BillBreakdown {
        twenties: counts[0],
        fives: counts[1],
        ones: counts[2],
    }
}
