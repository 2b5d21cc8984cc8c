use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::market::{MAX_PERIOD_SECS, MIN_PERIOD_SECS};

/// Fixed-length settlement period the auction clears once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketPeriod {
    pub id: Uuid,
    /// Seconds since the Unix epoch divided by the period length
    pub period_number: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl MarketPeriod {
    /// Period of `period_secs` length (clamped to one day) that contains `timestamp`,
    /// aligned to the Unix epoch
    pub fn containing(timestamp: DateTime<Utc>, period_secs: u64) -> Self {
        // bounded, so the cast is lossless
        let secs = period_secs.clamp(MIN_PERIOD_SECS, MAX_PERIOD_SECS) as i64;
        let period_number = timestamp.timestamp().div_euclid(secs);
        Self::numbered(period_number, secs, timestamp)
    }

    /// The period immediately after this one
    pub fn next(&self) -> Self {
        let secs = self.length().num_seconds().max(1);
        Self::numbered(self.period_number + 1, secs, self.end_time)
    }

    fn numbered(period_number: i64, secs: i64, fallback: DateTime<Utc>) -> Self {
        let start_time = period_number
            .checked_mul(secs)
            .and_then(|start| DateTime::from_timestamp(start, 0))
            .unwrap_or(fallback);
        let end_time = start_time + Duration::seconds(secs);

        Self {
            id: Uuid::new_v4(),
            period_number,
            start_time,
            end_time,
        }
    }

    pub fn length(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start_time && timestamp < self.end_time
    }

    /// When the scheduler should clear this period
    pub fn next_clearing_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}
