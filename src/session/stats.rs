//! Stats Aggregator.
//!
//! Derives validity percentages from the valid/invalid counters.
//! The invalid percentage is `100 - valid`, never rounded on its own, so the
//! two always sum to exactly 100 (or are both 0 with no data).

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

// ============================================================================
// Constants
// ============================================================================

/// Message shown before any event has been validated.
pub const AWAITING_DATA_MESSAGE: &str = "Awaiting data layers to validate.";

// ============================================================================
// ValidationStats
// ============================================================================

/// Percentages derived from the validity counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    /// Events validated as valid.
    pub valid_count: u64,
    /// Events validated as invalid.
    pub invalid_count: u64,
    /// `valid_count + invalid_count`.
    pub total: u64,
    /// Rounded share of valid events.
    pub valid_percent: u8,
    /// `100 - valid_percent`, or 0 when there is no data.
    pub invalid_percent: u8,
    /// Human-readable summary.
    pub message: String,
}

impl ValidationStats {
    /// Computes the stats for the given counters.
    #[must_use]
    pub fn compute(valid_count: u64, invalid_count: u64) -> Self {
        let total = valid_count.saturating_add(invalid_count);

        if total == 0 {
            return Self {
                valid_count,
                invalid_count,
                total,
                valid_percent: 0,
                invalid_percent: 0,
                message: AWAITING_DATA_MESSAGE.to_string(),
            };
        }

        let valid_percent = rounded_percent(valid_count, total);
        let invalid_percent = 100 - valid_percent;

        Self {
            valid_count,
            invalid_count,
            total,
            valid_percent,
            invalid_percent,
            message: format!("Validation: {valid_percent}% passed ({valid_count}/{total})."),
        }
    }

    /// Returns `true` if no event has been validated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// `round(100 * part / total)` with halves rounded up, in integer arithmetic.
///
/// `part <= total` and `total > 0`.
fn rounded_percent(part: u64, total: u64) -> u8 {
    let part = u128::from(part);
    let total = u128::from(total);
    let percent = (200 * part + total) / (2 * total);

    // part <= total bounds this to 100
    percent.min(100) as u8
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_empty_counters() {
        let stats = ValidationStats::compute(0, 0);
        assert_eq!(stats.valid_percent, 0);
        assert_eq!(stats.invalid_percent, 0);
        assert_eq!(stats.message, AWAITING_DATA_MESSAGE);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_seventy_thirty() {
        let stats = ValidationStats::compute(7, 3);
        assert_eq!(stats.valid_percent, 70);
        assert_eq!(stats.invalid_percent, 30);
        assert_eq!(stats.message, "Validation: 70% passed (7/10).");
    }

    #[test]
    fn test_invalid_percent_uses_subtraction() {
        // 2/3 rounds to 67 on its own; here it must be 100 - 33
        let stats = ValidationStats::compute(1, 2);
        assert_eq!(stats.valid_percent, 33);
        assert_eq!(stats.invalid_percent, 67);

        // 1/3 rounds to 33 on its own; here it must be 100 - 67
        let stats = ValidationStats::compute(2, 1);
        assert_eq!(stats.valid_percent, 67);
        assert_eq!(stats.invalid_percent, 33);
    }

    #[test]
    fn test_half_rounds_up() {
        let stats = ValidationStats::compute(1, 7);
        assert_eq!(stats.valid_percent, 13);
        assert_eq!(stats.invalid_percent, 87);
    }

    #[test]
    fn test_all_valid_and_all_invalid() {
        assert_eq!(ValidationStats::compute(4, 0).valid_percent, 100);
        assert_eq!(ValidationStats::compute(0, 4).invalid_percent, 100);
    }

    #[test]
    fn test_huge_counters_do_not_overflow() {
        let stats = ValidationStats::compute(u64::MAX / 2, u64::MAX / 2);
        assert_eq!(stats.valid_percent, 50);
        assert_eq!(stats.invalid_percent, 50);
    }

    proptest! {
        #[test]
        fn prop_percentages_sum_to_hundred(valid in 0u64..1_000_000, invalid in 0u64..1_000_000) {
            let stats = ValidationStats::compute(valid, invalid);
            if valid + invalid == 0 {
                prop_assert_eq!(stats.valid_percent, 0);
                prop_assert_eq!(stats.invalid_percent, 0);
            } else {
                prop_assert_eq!(u32::from(stats.valid_percent) + u32::from(stats.invalid_percent), 100);
                let exact = 100.0 * valid as f64 / (valid + invalid) as f64;
                prop_assert!((f64::from(stats.valid_percent) - exact).abs() <= 0.5 + 1e-9);
            }
        }
    }
}
