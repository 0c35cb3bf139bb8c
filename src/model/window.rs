//! Date window used for partition pruning.

use chrono::NaiveDate;
use serde::Deserialize;

use super::error::{ModelError, ModelResult};

/// Partition date format (`thedate` style).
pub const PARTITION_DATE_FORMAT: &str = "%Y%m%d";

/// Inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawTimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = ModelError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.start, raw.end)
    }
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ModelResult<Self> {
        if end < start {
            return Err(ModelError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Partition values for the lower and upper bound.
    pub fn partition_bounds(&self) -> (String, String) {
        (
            self.start.format(PARTITION_DATE_FORMAT).to_string(),
            self.end.format(PARTITION_DATE_FORMAT).to_string(),
        )
    }
}
