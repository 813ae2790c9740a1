use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("frame stream closed")]
    StreamClosed,
    #[error("simulated capture failure after {0} frames")]
    SimCaptureFailure(u64),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
