use serde::{Deserialize, Serialize};

/// One observed transition point of the raw climbing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimbingStateSample {
    #[serde(rename = "climbing")]
    pub is_climbing: bool,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl ClimbingStateSample {
    pub fn new(is_climbing: bool, timestamp: i64) -> Self {
        Self {
            is_climbing,
            timestamp,
        }
    }

    pub fn climbing(timestamp: i64) -> Self {
        Self::new(true, timestamp)
    }

    pub fn idle(timestamp: i64) -> Self {
        Self::new(false, timestamp)
    }
}

/// A debounced climbing interval, in milliseconds relative to the session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Attempt {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Absolute bounds of one recording, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: i64,
    pub end: i64,
}

impl SessionWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Offset of an absolute timestamp from the window start.
    pub fn offset(&self, timestamp: i64) -> i64 {
        timestamp - self.start
    }
}
