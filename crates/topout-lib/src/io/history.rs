use crate::{
    detectors::climbing::StateObservation,
    history::ClimbingStateHistory,
    signal::{Attempt, ClimbingStateSample},
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Parse a JSON array of `{"climbing": bool, "timestamp": ms}` entries.
/// Repeated states are dropped on the way in.
pub fn parse_history_json(text: &str) -> Result<ClimbingStateHistory> {
    let samples: Vec<ClimbingStateSample> =
        serde_json::from_str(text).context("parsing climbing state history")?;
    Ok(ClimbingStateHistory::from_samples(samples))
}

pub fn read_history_json(path: &Path) -> Result<ClimbingStateHistory> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_history_json(&text).with_context(|| format!("in {}", path.display()))
}

/// Parse a delimited history with `timestamp` and `climbing` columns.
pub fn parse_history_csv<R: Read>(reader: R, delimiter: u8) -> Result<ClimbingStateHistory> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    let ts_idx = locate_column(&headers, "timestamp")?;
    let state_idx = locate_column(&headers, "climbing")?;

    let mut history = ClimbingStateHistory::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", idx + 1))?;
        let timestamp = record
            .get(ts_idx)
            .unwrap_or_default()
            .parse::<i64>()
            .with_context(|| format!("row {} has no integer timestamp", idx + 1))?;
        let raw_state = record.get(state_idx).unwrap_or_default();
        let is_climbing = parse_climbing_flag(raw_state)
            .with_context(|| format!("row {}: unrecognized state {:?}", idx + 1, raw_state))?;
        history.on_new_state(is_climbing, timestamp);
    }
    Ok(history)
}

pub fn read_history_csv(path: &Path, delimiter: u8) -> Result<ClimbingStateHistory> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_history_csv(file, delimiter).with_context(|| format!("in {}", path.display()))
}

/// Pick the reader from the file extension: `.csv`, `.tsv`, anything else is JSON.
pub fn read_history(path: &Path) -> Result<ClimbingStateHistory> {
    match extension(path).as_deref() {
        Some("csv") => read_history_csv(path, b','),
        Some("tsv") => read_history_csv(path, b'\t'),
        _ => read_history_json(path),
    }
}

/// Parse a JSON array of `{"state": "Climbing" | "Idle" | "NotDetected", "timestamp": ms}`.
pub fn parse_observations_json(text: &str) -> Result<Vec<StateObservation>> {
    serde_json::from_str(text).context("parsing detector state log")
}

pub fn read_observations_json(path: &Path) -> Result<Vec<StateObservation>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_observations_json(&text).with_context(|| format!("in {}", path.display()))
}

pub fn write_attempts_json(path: &Path, attempts: &[Attempt]) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, attempts)?;
    Ok(())
}

pub fn read_attempts_json(path: &Path) -> Result<Vec<Attempt>> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let attempts = serde_json::from_reader(file)
        .with_context(|| format!("parsing attempts {}", path.display()))?;
    Ok(attempts)
}

fn parse_climbing_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "climbing" => Some(true),
        "false" | "0" | "idle" | "notdetected" | "not_detected" => Some(false),
        _ => None,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn locate_column(headers: &StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column", requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::climbing::ClimbingState;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn test_data(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace")
            .join("test_data")
            .join(name)
    }

    #[test]
    fn reads_device_export() {
        let history = read_history(&test_data("device_session.json")).unwrap();
        assert_eq!(
            history.samples(),
            &[
                ClimbingStateSample::idle(1718799624875),
                ClimbingStateSample::climbing(1718799628489),
                ClimbingStateSample::idle(1718799628937),
                ClimbingStateSample::climbing(1718799629267),
                ClimbingStateSample::idle(1718799631086),
            ]
        );
    }

    #[test]
    fn reads_csv_history() {
        let history = read_history(&test_data("flicker_history.csv")).unwrap();
        assert_eq!(history.len(), 11);
        assert_eq!(history.samples()[0], ClimbingStateSample::idle(1000));
        assert_eq!(history.samples()[10], ClimbingStateSample::idle(11600));
    }

    #[test]
    fn csv_accepts_state_words_and_drops_repeats() {
        let text = "climbing\ttimestamp\nidle\t0\nClimbing\t10\n1\t20\nfalse\t30\n";
        let history = parse_history_csv(text.as_bytes(), b'\t').unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn csv_rejects_unknown_state() {
        let text = "timestamp,climbing\n0,maybe\n";
        let err = parse_history_csv(text.as_bytes(), b',').unwrap_err();
        assert!(format!("{:#}", err).contains("maybe"));
    }

    #[test]
    fn csv_requires_columns() {
        let text = "time,state\n0,true\n";
        assert!(parse_history_csv(text.as_bytes(), b',').is_err());
    }

    #[test]
    fn parses_observation_log() {
        let text = r#"[
            {"state": "NotDetected", "timestamp": 0},
            {"state": "Climbing", "timestamp": 33}
        ]"#;
        let log = parse_observations_json(text).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].state, ClimbingState::Climbing);
    }

    #[test]
    fn writes_and_reads_attempts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attempts.json");
        let attempts = vec![Attempt::new(0, 1500), Attempt::new(4000, 9000)];
        write_attempts_json(&path, &attempts).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"startMs\": 4000"));
        assert_eq!(read_attempts_json(&path).unwrap(), attempts);
    }
}
