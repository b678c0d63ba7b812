//! Error taxonomy for the projector boundary.
//!
//! Three kinds: [`ProjectorError::Configuration`] (a native backend
//! could not be set up), [`ProjectorError::Argument`] (precondition
//! violated before any kernel launch) and [`ProjectorError::Device`] (a
//! CUDA allocation or launch failed after having started). NaN/Inf
//! propagation is deliberately not an error variant here: it is
//! documented, silent behavior, left for reconstruction layers above to
//! handle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ProjectorError>;
