use crate::detectors::attempts::ExtractorConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// On-disk settings file.
///
/// ```toml
/// [extractor]
/// min_duration_ms = 1500
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub extractor: ExtractorConfig,
}

pub fn parse_settings(text: &str) -> Result<SettingsFile> {
    let settings: SettingsFile = toml::from_str(text).context("parsing settings")?;
    settings.extractor.validate()?;
    Ok(settings)
}

pub fn read_settings(path: &Path) -> Result<SettingsFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    parse_settings(&contents).with_context(|| format!("in {}", path.display()))
}
