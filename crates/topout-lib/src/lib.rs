pub mod detectors;
pub mod error;
pub mod history;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod signal;

pub use detectors::*;
pub use error::{AttemptError, Result};
pub use history::ClimbingStateHistory;
pub use metrics::*;
pub use signal::*;
