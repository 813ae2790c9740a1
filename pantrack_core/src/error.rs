use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PanError {
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("interlock fault: both limit switches pressed")]
    InterlockFault,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("{0} did not stop within {1} ms")]
    Shutdown(&'static str, u64),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing frame source")]
    MissingFrames,
    #[error("missing stepper driver")]
    MissingStepper,
    #[error("missing limit switches")]
    MissingSwitches,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
