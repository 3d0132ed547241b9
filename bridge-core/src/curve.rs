//! Unlock curves
//!
//! A curve maps seconds elapsed since farming started to the cumulative amount
//! released. Curves are pure and monotonic non-decreasing in elapsed time, and
//! never exceed `total_locked()`.
//!
//! | Curve         | Shape                                   | Bound                  |
//! |---------------|-----------------------------------------|------------------------|
//! | `LinearCurve` | `per_period * floor(t / period)`        | `per_period * periods` |
//! | `CurvedCurve` | `a * t / (t + tau)`, `tau = c * 11.5159`| `a` (asymptotic)       |

use crate::types::Amount;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Scale from `c` to the half-saturation time, in ten-thousandths.
pub const HALF_SATURATION_SCALE: u128 = 115_159;

/// Denominator for `HALF_SATURATION_SCALE`
pub const SCALE_DENOMINATOR: u128 = 10_000;

/// Cumulative release as a function of elapsed seconds
pub trait UnlockCurve {
    /// Amount committed to the pool
    fn total_locked(&self) -> Amount;

    /// Cumulative amount released after `elapsed` seconds
    fn unlocked_after(&self, elapsed: u64) -> Result<Amount>;
}

/// Fixed amount per whole period, up to a horizon of `periods`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearCurve {
    amount_per_period: Amount,
    period_seconds: u64,
    periods: u64,
    total_locked: Amount,
}

impl LinearCurve {
    /// Validate and build
    pub fn new(amount_per_period: Amount, period_seconds: u64, periods: u64) -> Result<Self> {
        if period_seconds == 0 {
            return Err(Error::Config("period_seconds must be positive".to_string()));
        }
        if periods == 0 {
            return Err(Error::Config("periods must be positive".to_string()));
        }

        let total_locked = amount_per_period
            .checked_mul(periods as u128)
            .ok_or(Error::Overflow("linear total_locked"))?;

        Ok(Self {
            amount_per_period,
            period_seconds,
            periods,
            total_locked,
        })
    }

    /// Amount released per whole period
    pub fn amount_per_period(&self) -> Amount {
        self.amount_per_period
    }

    /// Period length in seconds
    pub fn period_seconds(&self) -> u64 {
        self.period_seconds
    }

    /// Number of periods before the pool is exhausted
    pub fn periods(&self) -> u64 {
        self.periods
    }
}

impl UnlockCurve for LinearCurve {
    fn total_locked(&self) -> Amount {
        self.total_locked
    }

    fn unlocked_after(&self, elapsed: u64) -> Result<Amount> {
        let whole_periods = (elapsed / self.period_seconds).min(self.periods);
        // Cannot overflow: bounded by total_locked, which was checked in `new`.
        Ok(self.amount_per_period * whole_periods as u128)
    }
}

/// Hyperbolic saturation toward `a`, half of which is released after `tau` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvedCurve {
    a: Amount,
    c: u128,
    tau: u128,
}

impl CurvedCurve {
    /// Validate and build
    pub fn new(a: Amount, c: u128) -> Result<Self> {
        let tau = c
            .checked_mul(HALF_SATURATION_SCALE)
            .ok_or(Error::Overflow("curved tau"))?
            / SCALE_DENOMINATOR;
        if tau == 0 {
            return Err(Error::Config("curve timescale c must be positive".to_string()));
        }
        Ok(Self { a, c, tau })
    }

    /// Magnitude parameter (asymptotic cap)
    pub fn a(&self) -> Amount {
        self.a
    }

    /// Timescale parameter
    pub fn c(&self) -> u128 {
        self.c
    }

    /// Seconds until half of `a` is released
    pub fn half_saturation_secs(&self) -> u128 {
        self.tau
    }
}

impl UnlockCurve for CurvedCurve {
    fn total_locked(&self) -> Amount {
        self.a
    }

    fn unlocked_after(&self, elapsed: u64) -> Result<Amount> {
        let t = elapsed as u128;
        let numerator = self
            .a
            .checked_mul(t)
            .ok_or(Error::Overflow("curved unlock"))?;
        let denominator = t
            .checked_add(self.tau)
            .ok_or(Error::Overflow("curved unlock"))?;
        Ok(numerator / denominator)
    }
}

/// Either curve, for pools chosen at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    /// Per-period linear release
    Linear(LinearCurve),
    /// Hyperbolic saturation
    Curved(CurvedCurve),
}

impl UnlockCurve for Curve {
    fn total_locked(&self) -> Amount {
        match self {
            Curve::Linear(curve) => curve.total_locked(),
            Curve::Curved(curve) => curve.total_locked(),
        }
    }

    fn unlocked_after(&self, elapsed: u64) -> Result<Amount> {
        match self {
            Curve::Linear(curve) => curve.unlocked_after(elapsed),
            Curve::Curved(curve) => curve.unlocked_after(elapsed),
        }
    }
}

impl From<LinearCurve> for Curve {
    fn from(curve: LinearCurve) -> Self {
        Curve::Linear(curve)
    }
}

impl From<CurvedCurve> for Curve {
    fn from(curve: CurvedCurve) -> Self {
        Curve::Curved(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAD: u128 = 1_000_000_000_000_000_000;
    const DAY: u64 = 86_400;
    const YEAR: u64 = 31_536_000;

    #[test]
    fn test_linear_counts_whole_periods() {
        let curve = LinearCurve::new(1000 * WAD, DAY, 365).unwrap();

        assert_eq!(curve.unlocked_after(0).unwrap(), 0);
        assert_eq!(curve.unlocked_after(DAY - 1).unwrap(), 0);
        assert_eq!(curve.unlocked_after(DAY).unwrap(), 1000 * WAD);
        assert_eq!(curve.unlocked_after(YEAR).unwrap() / WAD, 365_000);
    }

    #[test]
    fn test_linear_clamps_at_horizon() {
        let curve = LinearCurve::new(10, 60, 5).unwrap();
        assert_eq!(curve.total_locked(), 50);
        assert_eq!(curve.unlocked_after(60 * 5).unwrap(), 50);
        assert_eq!(curve.unlocked_after(u64::MAX).unwrap(), 50);
    }

    #[test]
    fn test_linear_rejects_bad_config() {
        assert!(matches!(LinearCurve::new(1, 0, 1), Err(Error::Config(_))));
        assert!(matches!(LinearCurve::new(1, 1, 0), Err(Error::Config(_))));
        assert!(matches!(
            LinearCurve::new(u128::MAX, 1, 2),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_curved_one_year_sample() {
        let curve = CurvedCurve::new(26_499_999_999_995, 2_100_000).unwrap();
        let unlocked = curve.unlocked_after(YEAR).unwrap();

        let leading: u64 = unlocked.to_string()[..7].parse().unwrap();
        assert!((1_499_840..=1_499_850).contains(&leading), "got {}", unlocked);
    }

    #[test]
    fn test_curved_is_concave_and_bounded() {
        let curve = CurvedCurve::new(1_000_000_000, 1_000).unwrap();

        let mut previous = 0;
        let mut previous_step = u128::MAX;
        for step in 1..200u64 {
            let value = curve.unlocked_after(step * 1_000).unwrap();
            assert!(value >= previous);
            assert!(value <= curve.total_locked());
            // Allow one unit of slack for integer truncation
            assert!(value - previous <= previous_step.saturating_add(1));
            previous_step = value - previous;
            previous = value;
        }
        assert_eq!(curve.unlocked_after(0).unwrap(), 0);
    }

    #[test]
    fn test_curved_half_saturation() {
        let curve = CurvedCurve::new(1_000_000, 10_000).unwrap();
        let tau = curve.half_saturation_secs() as u64;
        assert_eq!(curve.unlocked_after(tau).unwrap(), 500_000);
    }

    #[test]
    fn test_curved_overflow_reported() {
        let curve = CurvedCurve::new(u128::MAX, 1).unwrap();
        assert!(matches!(curve.unlocked_after(2), Err(Error::Overflow(_))));
    }

    #[test]
    fn test_curved_rejects_zero_timescale() {
        assert!(matches!(CurvedCurve::new(1, 0), Err(Error::Config(_))));
    }
}
