//! Trial throughput type.

use std::fmt;
use std::time::Duration;

/// Search throughput in trials per second.
///
/// One trial is one digest computation plus one table probe, so this is also
/// the hashrate; it is displayed with H/s units for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialRate(pub u64); // trials per second

impl TrialRate {
    /// Compute a rate from a trial count and the wall-clock time it took.
    ///
    /// Returns a zero rate for a zero or unmeasurably small interval rather
    /// than dividing by it.
    pub fn from_trials(trials: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Self(0);
        }
        Self((trials as f64 / secs) as u64)
    }
}

impl From<TrialRate> for f64 {
    fn from(rate: TrialRate) -> Self {
        rate.0 as f64
    }
}

impl fmt::Display for TrialRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = f64::from(*self);

        let (scaled, suffix) = if value >= 1e9 {
            (value / 1e9, "GH/s")
        } else if value >= 1e6 {
            (value / 1e6, "MH/s")
        } else if value >= 1e3 {
            (value / 1e3, "KH/s")
        } else {
            (value, "H/s")
        };

        if scaled >= 100.0 {
            write!(f, "{:.0} {}", scaled, suffix)
        } else if scaled >= 10.0 {
            write!(f, "{:.1} {}", scaled, suffix)
        } else {
            write!(f, "{:.2} {}", scaled, suffix)
        }
    }
}
