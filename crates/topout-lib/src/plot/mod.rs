use crate::{
    history::ClimbingStateHistory,
    signal::{Attempt, SessionWindow},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Shaded span along the x axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSeries {
    pub name: String,
    pub spans: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Band(BandSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub x_range: [f64; 2],
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            x_range: [0.0, 1.0],
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Step line of the raw climbing signal (seconds from session start, 0/1).
pub fn signal_steps(history: &ClimbingStateHistory, window: SessionWindow) -> Vec<[f64; 2]> {
    let secs = |ts: i64| window.offset(ts) as f64 / 1000.0;
    let mut points = Vec::with_capacity(history.len() * 2 + 2);
    let mut level = 0.0;
    points.push([0.0, level]);
    for sample in history.samples() {
        let x = secs(sample.timestamp);
        points.push([x, level]);
        level = if sample.is_climbing { 1.0 } else { 0.0 };
        points.push([x, level]);
    }
    points.push([secs(window.end), level]);
    points
}

pub fn figure_from_session_limit(
    history: &ClimbingStateHistory,
    window: SessionWindow,
    attempts: &[Attempt],
    max_points: usize,
) -> Figure {
    let mut fig = Figure::new(Some("Climbing attempts".into()));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("climbing".into());
    fig.x_range = [0.0, (window.duration_ms().max(1) as f64) / 1000.0];
    fig.add_series(Series::Band(BandSeries {
        name: "attempts".into(),
        spans: attempts
            .iter()
            .map(|a| [a.start_ms as f64 / 1000.0, a.end_ms as f64 / 1000.0])
            .collect(),
        style: Style {
            width: 1.0,
            color: Color(0x8FD694),
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "raw signal".into(),
        points: decimate_points(&signal_steps(history, window), max_points),
        style: Style {
            width: 1.4,
            color: Color(0xFF0077),
        },
    }));
    fig
}

pub fn figure_from_session(
    history: &ClimbingStateHistory,
    window: SessionWindow,
    attempts: &[Attempt],
) -> Figure {
    figure_from_session_limit(history, window, attempts, 4096)
}
