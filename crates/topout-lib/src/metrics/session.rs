use crate::{
    history::ClimbingStateHistory,
    signal::{Attempt, SessionWindow},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub attempt_count: usize,
    pub session_ms: i64,
    pub total_climbing_ms: i64,
    pub longest_attempt_ms: i64,
    pub mean_attempt_ms: f64,
    /// Mean idle time between consecutive attempts
    pub mean_rest_ms: f64,
    /// Fraction of the session spent inside attempts
    pub climbing_ratio: f64,
    /// Raw transitions recorded, before debouncing
    pub transitions: usize,
    pub transitions_per_minute: f64,
}

pub fn session_summary(
    history: &ClimbingStateHistory,
    window: SessionWindow,
    attempts: &[Attempt],
) -> SessionSummary {
    let n = attempts.len();
    let session_ms = window.duration_ms().max(0);
    let total_climbing_ms: i64 = attempts.iter().map(Attempt::duration_ms).sum();
    let longest_attempt_ms = attempts
        .iter()
        .map(Attempt::duration_ms)
        .max()
        .unwrap_or(0);
    let mean_attempt_ms = if n > 0 {
        total_climbing_ms as f64 / n as f64
    } else {
        0.0
    };
    let mean_rest_ms = if n > 1 {
        let rests: i64 = attempts
            .windows(2)
            .map(|w| w[1].start_ms - w[0].end_ms)
            .sum();
        rests as f64 / (n as f64 - 1.0)
    } else {
        0.0
    };
    let climbing_ratio = if session_ms > 0 {
        total_climbing_ms as f64 / session_ms as f64
    } else {
        0.0
    };
    let transitions = history.len();
    let transitions_per_minute = if session_ms > 0 {
        transitions as f64 * 60_000.0 / session_ms as f64
    } else {
        0.0
    };

    SessionSummary {
        attempt_count: n,
        session_ms,
        total_climbing_ms,
        longest_attempt_ms,
        mean_attempt_ms,
        mean_rest_ms,
        climbing_ratio,
        transitions,
        transitions_per_minute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ClimbingStateSample;

    #[test]
    fn summarizes_two_attempts() {
        let history = ClimbingStateHistory::from_samples([
            ClimbingStateSample::idle(0),
            ClimbingStateSample::climbing(2000),
            ClimbingStateSample::idle(5000),
            ClimbingStateSample::climbing(8000),
            ClimbingStateSample::idle(12000),
        ]);
        let attempts = [Attempt::new(2000, 5000), Attempt::new(8000, 12000)];
        let summary = session_summary(&history, SessionWindow::new(0, 20000), &attempts);
        assert_eq!(summary.attempt_count, 2);
        assert_eq!(summary.total_climbing_ms, 7000);
        assert_eq!(summary.longest_attempt_ms, 4000);
        assert!((summary.mean_attempt_ms - 3500.0).abs() < 1e-9);
        assert!((summary.mean_rest_ms - 3000.0).abs() < 1e-9);
        assert!((summary.climbing_ratio - 0.35).abs() < 1e-9);
        assert_eq!(summary.transitions, 5);
        assert!((summary.transitions_per_minute - 15.0).abs() < 1e-9);
    }

    #[test]
    fn empty_session_is_all_zero() {
        let summary = session_summary(
            &ClimbingStateHistory::new(),
            SessionWindow::new(100, 100),
            &[],
        );
        assert_eq!(summary.attempt_count, 0);
        assert_eq!(summary.session_ms, 0);
        assert_eq!(summary.climbing_ratio, 0.0);
        assert_eq!(summary.mean_rest_ms, 0.0);
    }
}
