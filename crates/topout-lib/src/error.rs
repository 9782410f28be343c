use thiserror::Error;

/// Contract violations when extracting attempts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("session ends before it starts: start={start}, end={end}")]
    InvalidWindow { start: i64, end: i64 },

    #[error("sample at {timestamp} lies outside the session window [{start}, {end}]")]
    SampleOutsideWindow { timestamp: i64, start: i64, end: i64 },

    #[error("invalid extractor configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AttemptError>;
