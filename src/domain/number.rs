//! Order number value object and suffix generation.
//!
//! Numbers look like `ORD-YYYYMMDD-NNNNN`. The five-digit suffix comes from
//! an injected [`SuffixSource`]; the default is a process-wide monotonic
//! counter, which removes the collision window a bare random draw has within
//! one process. Uniqueness across processes and restarts is still enforced
//! by the store's unique constraint, and callers retry on conflict.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const SUFFIX_SPACE: u32 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Assigned exactly once at order creation.
    pub fn generate(date: NaiveDate, source: &dyn SuffixSource) -> Self {
        Self(format!(
            "ORD-{}-{:05}",
            date.format("%Y%m%d"),
            source.next_suffix() % SUFFIX_SPACE
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the five-digit order-number suffix.
pub trait SuffixSource: Send + Sync {
    /// Next suffix, in `0..100_000`.
    fn next_suffix(&self) -> u32;
}

/// Monotonic counter, wrapping at 100 000.
#[derive(Debug, Default)]
pub struct CounterSuffix(AtomicU32);

impl SuffixSource for CounterSuffix {
    fn next_suffix(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) % SUFFIX_SPACE
    }
}

/// Random draw over the suffix space.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn next_suffix(&self) -> u32 {
        rand::random::<u32>() % SUFFIX_SPACE
    }
}

/// Always yields the same suffix. Intended for tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedSuffix(pub u32);

impl SuffixSource for FixedSuffix {
    fn next_suffix(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_date_and_zero_padded_suffix() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let n = OrderNumber::generate(date, &FixedSuffix(42));
        assert_eq!(n.as_str(), "ORD-20240315-00042");
    }

    #[test]
    fn counter_is_monotonic_and_wraps() {
        let source = CounterSuffix(AtomicU32::new(99_999));
        assert_eq!(source.next_suffix(), 99_999);
        assert_eq!(source.next_suffix(), 0);
        assert_eq!(source.next_suffix(), 1);
    }

    #[test]
    fn random_suffix_stays_in_range() {
        for _ in 0..100 {
            assert!(RandomSuffix.next_suffix() < 100_000);
        }
    }
}
