//! Epoch arithmetic.
//!
//! Epochs are fixed-length periods counted from a network-wide base instant.
//! Every document is valid for exactly one epoch.

use super::{PkiError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Length of a production epoch.
pub const PERIOD: Duration = Duration::from_secs(20 * 60);

/// Length of a test-network epoch. Also bounds acceptable decoy round trips.
pub const TEST_PERIOD: Duration = Duration::from_secs(2 * 60);

/// Position within the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochTime {
    pub epoch: u64,
    /// Time since the epoch started.
    pub elapsed: Duration,
    /// Time until the next epoch starts.
    pub till: Duration,
}

/// Source of the current epoch, as seen by the PKI client.
pub trait PkiClock: Send + Sync {
    fn now(&self) -> Result<EpochTime>;
}

/// Wall-clock epoch source.
#[derive(Debug, Clone)]
pub struct EpochClock {
    base: DateTime<Utc>,
    period: Duration,
}

impl EpochClock {
    pub fn new(base: DateTime<Utc>, period: Duration) -> Result<Self> {
        // Epoch arithmetic is done in whole milliseconds.
        if period.as_millis() == 0 {
            return Err(PkiError::InvalidPeriod);
        }
        Ok(Self { base, period })
    }

    /// Epoch position of an arbitrary instant.
    pub fn epoch_at(&self, t: DateTime<Utc>) -> Result<EpochTime> {
        let since_base = (t - self.base)
            .to_std()
            .map_err(|_| PkiError::ClockBeforeEpochBase)?;
        let period_ms = self.period.as_millis();
        let since_ms = since_base.as_millis();

        let epoch = (since_ms / period_ms) as u64;
        let elapsed = Duration::from_millis((since_ms % period_ms) as u64);
        Ok(EpochTime {
            epoch,
            elapsed,
            till: self.period - elapsed,
        })
    }
}

impl Default for EpochClock {
    /// Production period counted from 2017-06-01T00:00:00Z.
    fn default() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2017, 6, 1, 0, 0, 0).unwrap(),
            period: PERIOD,
        }
    }
}

impl PkiClock for EpochClock {
    fn now(&self) -> Result<EpochTime> {
        self.epoch_at(Utc::now())
    }
}
