use crate::{
    error::{AttemptError, Result},
    history::ClimbingStateHistory,
    signal::{Attempt, ClimbingStateSample, SessionWindow},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// State reversals shorter than this are treated as detector flicker.
pub const MIN_DURATION_MS: i64 = 1000;

/// Tunables for attempt extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Debounce window: a gap longer than this between two transitions
    /// confirms the state in between as stable.
    pub min_duration_ms: i64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: MIN_DURATION_MS,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_duration_ms <= 0 {
            return Err(AttemptError::InvalidConfig(format!(
                "min_duration_ms must be positive, got {}",
                self.min_duration_ms
            )));
        }
        Ok(())
    }
}

/// Attempts together with the inputs that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptExtraction {
    pub window: SessionWindow,
    pub min_duration_ms: i64,
    pub sample_count: usize,
    pub attempts: Vec<Attempt>,
}

/// Extract attempts with the default debounce window.
pub fn get_attempts(
    history: &ClimbingStateHistory,
    session_start: i64,
    session_end: i64,
) -> Result<Vec<Attempt>> {
    extract_attempts(
        history,
        SessionWindow::new(session_start, session_end),
        &ExtractorConfig::default(),
    )
}

/// Convenience wrapper bundling the attempts with their inputs.
pub fn run_attempt_pipeline(
    history: &ClimbingStateHistory,
    window: SessionWindow,
    cfg: &ExtractorConfig,
) -> Result<AttemptExtraction> {
    let attempts = extract_attempts(history, window, cfg)?;
    Ok(AttemptExtraction {
        window,
        min_duration_ms: cfg.min_duration_ms,
        sample_count: history.len(),
        attempts,
    })
}

/// Turn a transition log into debounced, non-overlapping attempts.
///
/// Transitions are grouped while consecutive gaps stay within the debounce
/// window. Once a longer gap follows a group, the state of the group's last
/// transition is confirmed as stable. An attempt opens at the first climbing
/// transition of a group that settles into climbing and closes at the last
/// transition of the next group that settles into idle. Time before the first
/// transition counts as idle, and an attempt still open at the end of the
/// history is closed at the session end.
pub fn extract_attempts(
    history: &ClimbingStateHistory,
    window: SessionWindow,
    cfg: &ExtractorConfig,
) -> Result<Vec<Attempt>> {
    cfg.validate()?;
    validate_window(history.samples(), window)?;

    let mut extractor = Extractor::new(window);
    let mut group: Option<Group> = None;

    for &sample in history.samples() {
        match group.as_mut() {
            Some(current) if sample.timestamp - current.last.timestamp <= cfg.min_duration_ms => {
                current.push(sample);
            }
            _ => {
                if let Some(closed) = group.take() {
                    extractor.settle(&closed);
                }
                group = Some(Group::start(sample));
            }
        }
    }

    // The end of the recording confirms whatever the last group settled into.
    if let Some(closed) = group.take() {
        extractor.settle(&closed);
    }

    Ok(extractor.finish())
}

fn validate_window(samples: &[ClimbingStateSample], window: SessionWindow) -> Result<()> {
    if window.end < window.start {
        return Err(AttemptError::InvalidWindow {
            start: window.start,
            end: window.end,
        });
    }
    // Samples are non-decreasing, so the extremes are enough.
    for sample in samples.first().into_iter().chain(samples.last()) {
        if !window.contains(sample.timestamp) {
            return Err(AttemptError::SampleOutsideWindow {
                timestamp: sample.timestamp,
                start: window.start,
                end: window.end,
            });
        }
    }
    Ok(())
}

/// Run of transitions separated by gaps no longer than the debounce window.
struct Group {
    first_climbing: Option<i64>,
    last: ClimbingStateSample,
}

impl Group {
    fn start(sample: ClimbingStateSample) -> Self {
        Self {
            first_climbing: sample.is_climbing.then_some(sample.timestamp),
            last: sample,
        }
    }

    fn push(&mut self, sample: ClimbingStateSample) {
        if sample.is_climbing && self.first_climbing.is_none() {
            self.first_climbing = Some(sample.timestamp);
        }
        self.last = sample;
    }

    /// Stable state reached once this group is over.
    fn settled_climbing(&self) -> bool {
        self.last.is_climbing
    }
}

struct Extractor {
    window: SessionWindow,
    open_since: Option<i64>,
    attempts: Vec<Attempt>,
}

impl Extractor {
    fn new(window: SessionWindow) -> Self {
        Self {
            window,
            open_since: None,
            attempts: Vec::new(),
        }
    }

    fn settle(&mut self, group: &Group) {
        match (self.open_since, group.settled_climbing()) {
            (None, true) => {
                self.open_since = group.first_climbing.or(Some(group.last.timestamp));
            }
            (Some(start), false) => self.close(start, group.last.timestamp),
            _ => {}
        }
    }

    fn close(&mut self, start: i64, end: i64) {
        let attempt = Attempt::new(self.window.offset(start), self.window.offset(end));
        debug!(
            "attempt {}..{} ms ({} ms)",
            attempt.start_ms,
            attempt.end_ms,
            attempt.duration_ms()
        );
        self.attempts.push(attempt);
        self.open_since = None;
    }

    fn finish(mut self) -> Vec<Attempt> {
        if let Some(start) = self.open_since {
            self.close(start, self.window.end);
        }
        self.attempts
    }
}
