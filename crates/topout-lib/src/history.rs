use crate::signal::ClimbingStateSample;
use log::warn;
use serde::{Deserialize, Serialize};

/// Append-only log of climbing state transitions for one recording session.
///
/// Repeated states are dropped on ingestion, so consecutive samples always
/// differ in `is_climbing` and timestamps never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "Vec<ClimbingStateSample>",
    into = "Vec<ClimbingStateSample>"
)]
pub struct ClimbingStateHistory {
    samples: Vec<ClimbingStateSample>,
}

impl ClimbingStateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay raw observations through [`Self::on_new_state`].
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = ClimbingStateSample>,
    {
        let mut history = Self::new();
        for sample in samples {
            history.on_new_state(sample.is_climbing, sample.timestamp);
        }
        history
    }

    /// Record a detector observation. Returns `true` when a transition was appended.
    pub fn on_new_state(&mut self, is_climbing: bool, timestamp: i64) -> bool {
        let timestamp = match self.samples.last() {
            Some(last) if last.is_climbing == is_climbing => return false,
            Some(last) if timestamp < last.timestamp => {
                warn!(
                    "out-of-order climbing state at {} (last {}), clamping",
                    timestamp, last.timestamp
                );
                last.timestamp
            }
            _ => timestamp,
        };
        self.samples
            .push(ClimbingStateSample::new(is_climbing, timestamp));
        true
    }

    pub fn samples(&self) -> &[ClimbingStateSample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&ClimbingStateSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forget everything; used when a new recording starts.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl From<Vec<ClimbingStateSample>> for ClimbingStateHistory {
    fn from(samples: Vec<ClimbingStateSample>) -> Self {
        Self::from_samples(samples)
    }
}

impl From<ClimbingStateHistory> for Vec<ClimbingStateSample> {
    fn from(history: ClimbingStateHistory) -> Self {
        history.samples
    }
}
