//! Maps `Box<dyn Error>` from trait boundaries to typed `PanError`.
//!
//! The traits in `pantrack_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum, with
//! an optional feature-gated path for `pantrack_hardware::HwError` downcasting.

use crate::error::PanError;

/// Map a hardware-line error (stepper or switch) to a typed `PanError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PanError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pantrack_hardware::error::HwError>() {
            return match hw {
                pantrack_hardware::error::HwError::Gpio(msg) => PanError::HardwareFault(msg.clone()),
                other => PanError::Hardware(other.to_string()),
            };
        }
    }

    PanError::Hardware(e.to_string())
}

/// Map a frame source error; every capture problem is fatal to the tracking cycle.
pub fn map_capture_error(e: &(dyn std::error::Error + 'static)) -> PanError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(pantrack_hardware::error::HwError::StreamClosed) =
            e.downcast_ref::<pantrack_hardware::error::HwError>()
        {
            return PanError::Capture("frame stream closed".into());
        }
    }

    PanError::Capture(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_keep_their_message() {
        let e = std::io::Error::other("line stuck");
        match map_hw_error(&e) {
            PanError::Hardware(m) => assert!(m.contains("line stuck")),
            other => panic!("unexpected {other:?}"),
        }
        match map_capture_error(&e) {
            PanError::Capture(m) => assert!(m.contains("line stuck")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn gpio_errors_are_faults() {
        let e = pantrack_hardware::error::HwError::Gpio("export failed".into());
        assert!(matches!(map_hw_error(&e), PanError::HardwareFault(_)));
        let closed = pantrack_hardware::error::HwError::StreamClosed;
        match map_capture_error(&closed) {
            PanError::Capture(m) => assert_eq!(m, "frame stream closed"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
