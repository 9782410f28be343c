use crate::history::ClimbingStateHistory;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Raw detector verdict for one analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimbingState {
    NotDetected,
    Idle,
    Climbing,
}

impl ClimbingState {
    /// Collapse to the two-valued signal the recorder consumes.
    /// A missing pose counts as not climbing.
    pub fn is_climbing(self) -> bool {
        matches!(self, ClimbingState::Climbing)
    }
}

/// One timestamped detector verdict, as logged before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateObservation {
    pub state: ClimbingState,
    pub timestamp: i64,
}

/// Feed a raw verdict log through the recorder.
pub fn normalize_observations(observations: &[StateObservation]) -> ClimbingStateHistory {
    let mut history = ClimbingStateHistory::new();
    for obs in observations {
        history.on_new_state(obs.state.is_climbing(), obs.timestamp);
    }
    history
}

/// Point sampled around a foot landmark, normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub x: f64,
    pub y: f64,
    pub in_mask: bool,
}

/// Angles (in turns) of the probes placed around each foot.
const PROBE_TURNS: [f64; 4] = [0.3, 0.45, 0.65, 0.7];
const PROBE_DISTANCE: f64 = 0.055;
pub const DEFAULT_ASPECT: f64 = 4.0 / 3.0;

/// Strict majority of the points lie inside the mask.
pub fn majority_in_mask(points: &[TrackingPoint]) -> bool {
    points.iter().filter(|p| p.in_mask).count() > points.len() / 2
}

/// Probe positions around a foot landmark, below and to the sides of the heel.
pub fn surrounding_tracking_points(foot: (f64, f64), aspect: f64) -> Vec<(f64, f64)> {
    PROBE_TURNS
        .iter()
        .map(|turns| {
            let angle = turns * PI * 2.0;
            let dx = angle.cos() * PROBE_DISTANCE * aspect;
            let dy = angle.sin() * PROBE_DISTANCE;
            (foot.0 - dx, foot.1 + dy)
        })
        .collect()
}

/// Segmentation output: one byte per pixel, 0 marks the segmented region.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    pub mask: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl SegmentationMask {
    pub fn new(mask: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            mask,
            width,
            height,
        }
    }

    /// Look up a point given in the rotated camera frame: `top_relative`
    /// runs along the mask width, `right_relative` against its height.
    pub fn contains_point(&self, top_relative: f64, right_relative: f64) -> bool {
        let x = top_relative * self.width as f64;
        let y = (1.0 - right_relative) * self.height as f64;
        if x < 0.0 || y < 0.0 {
            return false;
        }
        let i = (y as usize) * self.width + x as usize;
        i > 0 && i < self.mask.len() && self.mask[i] == 0
    }
}

/// Verdict for one frame from the detected feet and the latest mask.
pub fn classify_feet(
    feet: Option<&[(f64, f64)]>,
    mask: Option<&SegmentationMask>,
) -> ClimbingState {
    let Some(feet) = feet else {
        return ClimbingState::NotDetected;
    };
    let points = foot_tracking_points(feet, mask, DEFAULT_ASPECT);
    if !points.is_empty() && majority_in_mask(&points) {
        ClimbingState::Climbing
    } else {
        ClimbingState::Idle
    }
}

/// Probe points for every foot, tagged with their mask membership.
pub fn foot_tracking_points(
    feet: &[(f64, f64)],
    mask: Option<&SegmentationMask>,
    aspect: f64,
) -> Vec<TrackingPoint> {
    feet.iter()
        .flat_map(|&foot| surrounding_tracking_points(foot, aspect))
        .map(|(x, y)| TrackingPoint {
            x,
            y,
            in_mask: mask.map(|m| m.contains_point(x, y)).unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(in_mask: bool) -> TrackingPoint {
        TrackingPoint {
            x: 0.0,
            y: 0.0,
            in_mask,
        }
    }

    #[test]
    fn only_climbing_is_climbing() {
        assert!(ClimbingState::Climbing.is_climbing());
        assert!(!ClimbingState::Idle.is_climbing());
        assert!(!ClimbingState::NotDetected.is_climbing());
    }

    #[test]
    fn not_detected_collapses_into_idle() {
        let log = [
            StateObservation {
                state: ClimbingState::Idle,
                timestamp: 0,
            },
            StateObservation {
                state: ClimbingState::NotDetected,
                timestamp: 40,
            },
            StateObservation {
                state: ClimbingState::Climbing,
                timestamp: 80,
            },
            StateObservation {
                state: ClimbingState::NotDetected,
                timestamp: 120,
            },
        ];
        let history = normalize_observations(&log);
        let states: Vec<(bool, i64)> = history
            .samples()
            .iter()
            .map(|s| (s.is_climbing, s.timestamp))
            .collect();
        assert_eq!(states, vec![(false, 0), (true, 80), (false, 120)]);
    }

    #[test]
    fn majority_is_strict() {
        assert!(!majority_in_mask(&[]));
        assert!(!majority_in_mask(&[point(true), point(false)]));
        assert!(majority_in_mask(&[point(true), point(true), point(false)]));
        assert!(majority_in_mask(&[point(true)]));
    }

    #[test]
    fn probes_surround_the_foot() {
        let probes = surrounding_tracking_points((0.5, 0.5), DEFAULT_ASPECT);
        assert_eq!(probes.len(), 4);
        for (x, y) in probes {
            let dx = (x - 0.5) / DEFAULT_ASPECT;
            let dy = y - 0.5;
            assert!(((dx * dx + dy * dy).sqrt() - PROBE_DISTANCE).abs() < 1e-9);
        }
    }

    #[test]
    fn mask_lookup_uses_rotated_frame() {
        // 4x2 mask, only pixel (x=1, y=1) is segmented.
        let mut mask = vec![1u8; 8];
        mask[5] = 0;
        let mask = SegmentationMask::new(mask, 4, 2);
        // x = 0.3 * 4 = 1.2, y = (1 - 0.4) * 2 = 1.2 -> index 5
        assert!(mask.contains_point(0.3, 0.4));
        assert!(!mask.contains_point(0.0, 0.9));
        assert!(!mask.contains_point(2.0, 0.0));
        assert!(!mask.contains_point(-0.5, 0.5));
    }

    #[test]
    fn classifies_feet_against_mask() {
        assert_eq!(classify_feet(None, None), ClimbingState::NotDetected);

        let feet = [(0.5, 0.5), (0.6, 0.5)];
        assert_eq!(classify_feet(Some(&feet[..]), None), ClimbingState::Idle);

        let full = SegmentationMask::new(vec![0u8; 100 * 100], 100, 100);
        assert_eq!(
            classify_feet(Some(&feet[..]), Some(&full)),
            ClimbingState::Climbing
        );

        let empty = SegmentationMask::new(vec![255u8; 100 * 100], 100, 100);
        assert_eq!(
            classify_feet(Some(&feet[..]), Some(&empty)),
            ClimbingState::Idle
        );
    }
}
