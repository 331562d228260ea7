//! Block height <-> calendar conversion from a fixed average block time.

use super::BlockHeader;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Estimates block times from one anchor block and an average block time.
#[derive(Debug, Clone, Copy)]
pub struct BlockClock {
    anchor_block: u64,
    anchor_time: DateTime<Utc>,
    seconds_per_block: f64,
}

impl BlockClock {
    pub fn new(anchor_block: u64, anchor_time: DateTime<Utc>, seconds_per_block: f64) -> Self {
        Self {
            anchor_block,
            anchor_time,
            seconds_per_block: seconds_per_block.max(f64::EPSILON),
        }
    }

    /// Anchor on a block header; a header with an unusable timestamp anchors on `now`.
    pub fn from_header(header: BlockHeader, seconds_per_block: f64) -> Self {
        let anchor_time = DateTime::from_timestamp(header.timestamp, 0).unwrap_or_else(Utc::now);
        Self::new(header.number, anchor_time, seconds_per_block)
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor_time.date_naive()
    }

    /// Number of blocks in 24 hours.
    pub fn blocks_per_day(&self) -> u64 {
        ((24.0 * 60.0 * 60.0) / self.seconds_per_block).floor().max(1.0) as u64
    }

    pub fn time_of(&self, block: u64) -> DateTime<Utc> {
        let delta_blocks = block as f64 - self.anchor_block as f64;
        let delta_secs = (delta_blocks * self.seconds_per_block).round() as i64;
        self.anchor_time + Duration::seconds(delta_secs)
    }

    pub fn date_of(&self, block: u64) -> NaiveDate {
        self.time_of(block).date_naive()
    }

    /// Estimated block at `time`, clamped to `[0, anchor_block]`.
    pub fn block_at(&self, time: DateTime<Utc>) -> u64 {
        let secs_back = (self.anchor_time - time).num_seconds() as f64;
        let blocks_back = (secs_back / self.seconds_per_block).round();
        if blocks_back <= 0.0 {
            return self.anchor_block;
        }
        self.anchor_block.saturating_sub(blocks_back as u64)
    }

    /// Estimated first block of `date` (UTC midnight).
    pub fn block_at_start_of(&self, date: NaiveDate) -> u64 {
        self.block_at(date.and_time(NaiveTime::MIN).and_utc())
    }
}
