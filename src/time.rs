//! Monotonic timestamps fed to the controller.

use std::ops::Add;
use std::time::Duration;

/// A point on a monotonic clock, measured from an arbitrary origin.
///
/// The controller only ever compares timestamps and takes their distance, so
/// the origin is irrelevant as long as all values come from the same clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Timestamp `elapsed` after the origin.
    pub const fn from_duration(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Timestamp `secs` seconds after the origin.
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Timestamp `millis` milliseconds after the origin.
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Time since the origin.
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Distance between two timestamps regardless of their order.
    pub fn abs_diff(self, other: Self) -> Duration {
        if self.0 >= other.0 {
            self.0 - other.0
        } else {
            other.0 - self.0
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_diff_is_symmetric() {
        let a = Timestamp::from_millis(1_500);
        let b = Timestamp::from_secs(10);
        assert_eq!(a.abs_diff(b), Duration::from_millis(8_500));
        assert_eq!(b.abs_diff(a), Duration::from_millis(8_500));
        assert_eq!(a.abs_diff(a), Duration::ZERO);
    }

    #[test]
    fn test_abs_diff_across_second_boundary() {
        // 0.9s and 2.1s are 1.2s apart, not 2s + 0.8s.
        let a = Timestamp::from_millis(900);
        let b = Timestamp::from_millis(2_100);
        assert_eq!(b.abs_diff(a), Duration::from_millis(1_200));
    }

    #[test]
    fn test_add() {
        assert_eq!(
            Timestamp::ZERO + Duration::from_secs(3),
            Timestamp::from_secs(3)
        );
    }
}
