//! Period arithmetic for the two statistics alignments.
//!
//! Every period is anchored to the Unix epoch. Because the operation interval
//! always divides 60 minutes, interval boundaries coincide with the top of
//! every hour.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Interval lengths (in minutes) that evenly divide an hour.
pub const VALID_OPERATION_INTERVALS: [u32; 12] = [1, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60];

const MINUTES_PER_WEEK: u32 = 7 * 24 * 60;

// ---------------------------------------------------------------------------
// OperationInterval
// ---------------------------------------------------------------------------

/// The configured operation-interval length, validated to divide 60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct OperationInterval(u32);

impl OperationInterval {
    pub const DEFAULT: Self = Self(60);

    pub fn new(minutes: u32) -> Result<Self> {
        if minutes == 0 || 60 % minutes != 0 {
            return Err(StatsError::InvalidConfiguration(format!(
                "operation interval must be a positive divisor of 60 minutes, got {minutes}"
            )));
        }
        Ok(Self(minutes))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn length(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    /// Start of the interval containing `ts`.
    pub fn period_start(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        truncate(ts, self.length())
    }

    /// Start of the interval after the one containing `ts`.
    pub fn next_boundary(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.period_start(ts) + self.length()
    }

    /// First and last second of the interval containing `ts`.
    pub fn bounds(self, ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.period_start(ts);
        (start, start + self.length() - Duration::seconds(1))
    }

    /// Bounds of the last interval that completed before `ts`.
    pub fn previous_bounds(self, ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        self.bounds(self.period_start(ts) - Duration::seconds(1))
    }

    pub fn intervals_per_week(self) -> u32 {
        MINUTES_PER_WEEK / self.0
    }

    /// Index of the interval containing `ts` within its week.
    ///
    /// Weeks start on Sunday at 00:00 UTC, which is interval 0.
    pub fn interval_id(self, ts: DateTime<Utc>) -> u32 {
        let minute_of_week =
            ts.weekday().num_days_from_sunday() * 24 * 60 + ts.hour() * 60 + ts.minute();
        minute_of_week / self.0
    }
}

impl Default for OperationInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for OperationInterval {
    type Error = StatsError;

    fn try_from(minutes: u32) -> Result<Self> {
        Self::new(minutes)
    }
}

impl From<OperationInterval> for u32 {
    fn from(interval: OperationInterval) -> Self {
        interval.0
    }
}

impl fmt::Display for OperationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Which boundary a statistics update is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Intermediate statistics, rolled up every operation interval.
    OperationInterval,
    /// Final statistics, rolled up every hour.
    Hour,
}

impl Alignment {
    /// Evaluation order.
    pub const ALL: [Alignment; 2] = [Alignment::OperationInterval, Alignment::Hour];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OperationInterval => "operation_interval",
            Self::Hour => "hour",
        }
    }

    pub fn period_length(self, interval: OperationInterval) -> Duration {
        match self {
            Self::OperationInterval => interval.length(),
            Self::Hour => Duration::hours(1),
        }
    }

    pub fn period_start(self, interval: OperationInterval, ts: DateTime<Utc>) -> DateTime<Utc> {
        truncate(ts, self.period_length(interval))
    }

    /// The first boundary strictly after the period containing `baseline`.
    pub fn next_boundary(
        self,
        interval: OperationInterval,
        baseline: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.period_start(interval, baseline) + self.period_length(interval)
    }

    /// True once a full period has elapsed after the one containing `baseline`.
    pub fn is_due(
        self,
        interval: OperationInterval,
        baseline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now >= self.next_boundary(interval, baseline)
    }

    /// Single-byte tag used as the storage key prefix.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::OperationInterval => 1,
            Self::Hour => 2,
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alignment {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oi" | "operation_interval" | "operation-interval" => Ok(Self::OperationInterval),
            "hour" => Ok(Self::Hour),
            other => Err(StatsError::UnknownAlignment(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Round `ts` down to a multiple of `period` since the epoch.
fn truncate(ts: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let into_period = ts.timestamp().rem_euclid(period.num_seconds());
    ts - Duration::seconds(into_period)
        - Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StatsError::InvalidTimestamp(s.to_string()))
}
