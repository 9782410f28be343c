use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use topout_lib::{
    detectors::{
        attempts::{extract_attempts, ExtractorConfig},
        climbing::{normalize_observations, ClimbingState, StateObservation},
    },
    Attempt, ClimbingStateHistory, SessionWindow,
};

pub const MANIFEST_FILE: &str = "session.json";
pub const HISTORY_FILE: &str = "history.json";
pub const ATTEMPTS_FILE: &str = "attempts.tsv";
pub const ATTEMPTS_SIDECAR_FILE: &str = "attempts.json";

/// Synthetic recording session, read from TOML.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionDesign {
    pub name: String,
    /// Time between two detector verdicts.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: i64,
    /// Chance that a single verdict reports the opposite state.
    #[serde(default)]
    pub flicker_probability: f64,
    /// Chance that a single verdict reports no pose at all.
    #[serde(default)]
    pub dropout_probability: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub trailing_idle_ms: i64,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub bouts: Vec<BoutSpec>,
}

fn default_sample_interval_ms() -> i64 {
    33
}

/// Idle lead-in followed by a climb.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct BoutSpec {
    pub idle_ms: i64,
    pub climb_ms: i64,
}

impl SessionDesign {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms <= 0 {
            bail!("sample_interval_ms must be positive");
        }
        for (label, p) in [
            ("flicker_probability", self.flicker_probability),
            ("dropout_probability", self.dropout_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("{} must be within [0, 1], got {}", label, p);
            }
        }
        let negative_bout = self.bouts.iter().any(|b| b.idle_ms < 0 || b.climb_ms < 0);
        if self.trailing_idle_ms < 0 || negative_bout {
            bail!("phase durations must not be negative");
        }
        self.extractor.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionManifest {
    pub id: String,
    pub recording_file: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub min_duration_ms: i64,
    pub sample_count: usize,
    pub attempt_count: usize,
    #[serde(default)]
    pub design: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SessionManifest {
    pub fn window(&self) -> SessionWindow {
        SessionWindow::new(self.start_timestamp, self.end_timestamp)
    }
}

/// Everything persisted for one recording.
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub manifest: SessionManifest,
    pub history: ClimbingStateHistory,
    pub attempts: Vec<Attempt>,
}

impl SessionBundle {
    /// Extract attempts from a finished recording.
    pub fn from_history(
        id: &str,
        history: ClimbingStateHistory,
        window: SessionWindow,
        cfg: &ExtractorConfig,
    ) -> Result<Self> {
        let attempts = extract_attempts(&history, window, cfg)
            .with_context(|| format!("extracting attempts for {}", id))?;
        let manifest = SessionManifest {
            id: id.to_string(),
            recording_file: format!("topout-{}.mp4", window.start),
            start_timestamp: window.start,
            end_timestamp: window.end,
            min_duration_ms: cfg.min_duration_ms,
            sample_count: history.len(),
            attempt_count: attempts.len(),
            design: None,
            seed: None,
        };
        Ok(Self {
            manifest,
            history,
            attempts,
        })
    }

    /// Re-run extraction with another debounce window.
    pub fn reextract(&self, cfg: &ExtractorConfig) -> Result<Self> {
        let mut bundle = Self::from_history(
            &self.manifest.id,
            self.history.clone(),
            self.manifest.window(),
            cfg,
        )?;
        bundle.manifest.recording_file = self.manifest.recording_file.clone();
        bundle.manifest.design = self.manifest.design.clone();
        bundle.manifest.seed = self.manifest.seed;
        Ok(bundle)
    }
}

/// Simulated session plus the attempts the design intended.
pub struct SimulatedSession {
    pub bundle: SessionBundle,
    pub observations: Vec<StateObservation>,
    pub planned: Vec<Attempt>,
}

pub fn read_design(path: &Path) -> Result<SessionDesign> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read design {}", path.display()))?;
    let design: SessionDesign =
        toml::from_str(&contents).with_context(|| format!("parsing design {}", path.display()))?;
    design
        .validate()
        .with_context(|| format!("invalid design {}", path.display()))?;
    Ok(design)
}

pub fn simulate_session(design: &SessionDesign, start_timestamp: i64) -> Result<SimulatedSession> {
    design.validate()?;
    let seed = design.seed.unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut observations = Vec::new();
    let mut planned = Vec::new();
    let mut t = start_timestamp;
    for bout in &design.bouts {
        emit_phase(&mut observations, &mut rng, design, false, t, bout.idle_ms);
        t += bout.idle_ms;
        emit_phase(&mut observations, &mut rng, design, true, t, bout.climb_ms);
        planned.push(Attempt::new(
            t - start_timestamp,
            t + bout.climb_ms - start_timestamp,
        ));
        t += bout.climb_ms;
    }
    emit_phase(
        &mut observations,
        &mut rng,
        design,
        false,
        t,
        design.trailing_idle_ms,
    );
    t += design.trailing_idle_ms;

    let window = SessionWindow::new(start_timestamp, t);
    let history = normalize_observations(&observations);
    let id = format!("{}-{}", design.name.replace(' ', "-"), start_timestamp);
    let mut bundle = SessionBundle::from_history(&id, history, window, &design.extractor)?;
    bundle.manifest.design = Some(design.name.clone());
    bundle.manifest.seed = design.seed;
    Ok(SimulatedSession {
        bundle,
        observations,
        planned,
    })
}

fn emit_phase(
    out: &mut Vec<StateObservation>,
    rng: &mut StdRng,
    design: &SessionDesign,
    climbing: bool,
    from: i64,
    duration_ms: i64,
) {
    let mut t = from;
    while t < from + duration_ms {
        let state = if rng.gen_bool(design.dropout_probability) {
            ClimbingState::NotDetected
        } else if climbing != rng.gen_bool(design.flicker_probability) {
            ClimbingState::Climbing
        } else {
            ClimbingState::Idle
        };
        out.push(StateObservation {
            state,
            timestamp: t,
        });
        t += design.sample_interval_ms;
    }
}

/// `duration_ms` is derived, so reading ignores it.
#[derive(Debug, Deserialize)]
struct AttemptRow {
    start_ms: i64,
    end_ms: i64,
}

pub fn write_attempts_tsv(path: &Path, attempts: &[Attempt]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
    writer.write_record(["start_ms", "end_ms", "duration_ms"])?;
    for attempt in attempts {
        writer.write_record(&[
            attempt.start_ms.to_string(),
            attempt.end_ms.to_string(),
            attempt.duration_ms().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_attempts_tsv(path: &Path) -> Result<Vec<Attempt>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening attempts {}", path.display()))?;
    let mut attempts = Vec::new();
    for row in reader.deserialize::<AttemptRow>() {
        let row = row.with_context(|| format!("parsing attempts in {}", path.display()))?;
        attempts.push(Attempt::new(row.start_ms, row.end_ms));
    }
    Ok(attempts)
}

pub fn write_attempts_sidecar(path: &Path) -> Result<()> {
    let metadata = serde_json::json!({
        "columns": {
            "start_ms": { "units": "milliseconds", "reference": "session start" },
            "end_ms": { "units": "milliseconds", "reference": "session start" },
            "duration_ms": { "units": "milliseconds" },
        }
    });
    fs::write(path, serde_json::to_string_pretty(&metadata)?)?;
    Ok(())
}

pub fn write_manifest(path: &Path, manifest: &SessionManifest) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<SessionManifest> {
    let file =
        fs::File::open(path).with_context(|| format!("opening manifest {}", path.display()))?;
    let manifest = serde_json::from_reader::<_, SessionManifest>(file)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}

pub fn write_bundle(dir: &Path, bundle: &SessionBundle) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_manifest(&dir.join(MANIFEST_FILE), &bundle.manifest)?;
    let history = fs::File::create(dir.join(HISTORY_FILE))?;
    serde_json::to_writer_pretty(history, &bundle.history)?;
    write_attempts_tsv(&dir.join(ATTEMPTS_FILE), &bundle.attempts)?;
    write_attempts_sidecar(&dir.join(ATTEMPTS_SIDECAR_FILE))?;
    info!(
        "wrote session {} ({} attempts) to {}",
        bundle.manifest.id,
        bundle.attempts.len(),
        dir.display()
    );
    Ok(())
}

pub fn read_bundle(dir: &Path) -> Result<SessionBundle> {
    let manifest = read_manifest(&dir.join(MANIFEST_FILE))?;
    let history = topout_lib::io::history::read_history_json(&dir.join(HISTORY_FILE))?;
    let attempts = read_attempts_tsv(&dir.join(ATTEMPTS_FILE))?;
    if attempts.len() != manifest.attempt_count {
        bail!(
            "{} lists {} attempts but manifest expects {}",
            ATTEMPTS_FILE,
            attempts.len(),
            manifest.attempt_count
        );
    }
    Ok(SessionBundle {
        manifest,
        history,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn design(flicker: f64, dropout: f64) -> SessionDesign {
        SessionDesign {
            name: "wall session".into(),
            sample_interval_ms: 50,
            flicker_probability: flicker,
            dropout_probability: dropout,
            seed: Some(7),
            trailing_idle_ms: 3000,
            extractor: ExtractorConfig::default(),
            bouts: vec![
                BoutSpec {
                    idle_ms: 4000,
                    climb_ms: 12000,
                },
                BoutSpec {
                    idle_ms: 6000,
                    climb_ms: 8000,
                },
            ],
        }
    }

    #[test]
    fn clean_signal_yields_planned_attempts() {
        let sim = simulate_session(&design(0.0, 0.0), 1_000_000).unwrap();
        assert_eq!(
            sim.planned,
            vec![Attempt::new(4000, 16000), Attempt::new(22000, 30000)]
        );
        assert_eq!(sim.bundle.attempts, sim.planned);
        assert_eq!(sim.bundle.manifest.end_timestamp, 1_033_000);
        assert_eq!(sim.bundle.manifest.id, "wall-session-1000000");
        assert_eq!(sim.bundle.manifest.sample_count, 5);
    }

    #[test]
    fn same_seed_same_session() {
        let a = simulate_session(&design(0.2, 0.05), 0).unwrap();
        let b = simulate_session(&design(0.2, 0.05), 0).unwrap();
        assert_eq!(a.observations, b.observations);
        assert_eq!(a.bundle.attempts, b.bundle.attempts);
        assert!(a.bundle.history.len() > 5);
    }

    #[test]
    fn noisy_attempts_stay_in_session() {
        let sim = simulate_session(&design(0.1, 0.02), 0).unwrap();
        let duration = sim.bundle.manifest.window().duration_ms();
        for attempt in &sim.bundle.attempts {
            assert!(attempt.start_ms >= 0 && attempt.end_ms <= duration);
        }
    }

    #[test]
    fn rejects_bad_probabilities() {
        let mut bad = design(0.0, 0.0);
        bad.flicker_probability = 1.5;
        assert!(simulate_session(&bad, 0).is_err());
    }

    #[test]
    fn writes_and_reads_bundle() {
        let dir = tempdir().unwrap();
        let sim = simulate_session(&design(0.05, 0.0), 500).unwrap();
        write_bundle(dir.path(), &sim.bundle).unwrap();
        assert!(dir.path().join(ATTEMPTS_SIDECAR_FILE).exists());
        let back = read_bundle(dir.path()).unwrap();
        assert_eq!(back.manifest, sim.bundle.manifest);
        assert_eq!(back.history, sim.bundle.history);
        assert_eq!(back.attempts, sim.bundle.attempts);
    }

    #[test]
    fn attempts_tsv_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(ATTEMPTS_FILE);
        write_attempts_tsv(&path, &[Attempt::new(100, 2100)]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("start_ms\tend_ms\tduration_ms"));
        assert!(contents.contains("100\t2100\t2000"));
    }

    #[test]
    fn reextract_keeps_identity() {
        let sim = simulate_session(&design(0.0, 0.0), 0).unwrap();
        let merged = sim
            .bundle
            .reextract(&ExtractorConfig {
                min_duration_ms: 7000,
            })
            .unwrap();
        assert_eq!(merged.manifest.id, sim.bundle.manifest.id);
        assert_eq!(merged.manifest.design.as_deref(), Some("wall session"));
        assert_eq!(merged.attempts, vec![Attempt::new(4000, 30000)]);
    }
}
