use thiserror::Error;

use crate::driver::DriverState;

#[derive(Debug, Clone, Error)]
pub enum DetectError {
    /// Fatal for the session; the user has to retry explicitly.
    #[error("failed to load the object detection model: {0}")]
    ModelLoad(String),
    /// Camera denied, missing device, unreadable file.
    #[error("failed to acquire media source: {0}")]
    SourceAcquisition(String),
    /// A single frame failed; the loop moves on.
    #[error("detection failed for frame: {0}")]
    Frame(String),
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        from: DriverState,
        action: &'static str,
    },
}

impl DetectError {
    pub fn model_load(err: impl std::fmt::Display) -> Self {
        DetectError::ModelLoad(format!("{err:#}"))
    }

    pub fn acquisition(err: impl std::fmt::Display) -> Self {
        DetectError::SourceAcquisition(format!("{err:#}"))
    }

    pub fn frame(err: impl std::fmt::Display) -> Self {
        DetectError::Frame(format!("{err:#}"))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectError::ModelLoad(_))
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
