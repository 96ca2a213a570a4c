//! Recoverable failure kinds seen while scanning a video.
//!
//! None of these abort a scan. They are produced at the point of failure so the
//! caller can log a typed reason and carry on with the documented fallback.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// Seek past the end of the video or a decode failure.
    #[error("no frame available at {time:.2}s")]
    FrameUnavailable { time: f64 },

    /// The text recognizer raised for a whole batch.
    #[error("text recognition failed for a batch of {batch}: {reason}")]
    OracleFailure { batch: usize, reason: String },

    #[error("unparseable timer token '{0}'")]
    InvalidTimerToken(String),

    /// Crop with (near) zero area after clamping to the frame.
    #[error("degenerate region {width}x{height}")]
    DegenerateRegion { width: u32, height: u32 },

    #[error("refinement over [{low:.2}s, {high:.2}s] ended at best score {best_score}")]
    RefinementExhausted { low: f64, high: f64, best_score: i32 },

    #[error("formations of {left} and {right} members cannot be compared")]
    IncomparableFormations { left: usize, right: usize },
}
