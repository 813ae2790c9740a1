//! Backends for the pan tracker's boundary traits.
//!
//! - `sim`: a closed-loop simulated rig (stepper position pans a synthetic
//!   camera and presses the limit switches at the travel bounds)
//! - `stream`: frames read from any raw RGB24 byte stream
//! - `gpio` (feature `hardware`, Linux): stepper and limit switches on rppal GPIO
pub mod error;
pub mod sim;
pub mod stream;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{SimCamera, SimRig, SimRigCfg, SimStepper, SimSwitches};
pub use stream::RawFrameReader;
