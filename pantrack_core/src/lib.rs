#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core pan-tracking logic (hardware-agnostic).
//!
//! All hardware interactions go through the `pantrack_traits` boundary traits:
//! `FrameSource`, `StepperDriver`, `LimitSwitches` and `Clock`.
//!
//! ## Architecture
//!
//! - **Localization**: HSV range mask + connected regions, largest wins (`segment`, `localizer`)
//! - **Control**: stateless proportional offset controller (`controller`)
//! - **Coordination**: single owner of `MotorState`; safety overrides win (`coordinator`)
//! - **Actuation**: long-lived step pulse loop (`actuator`)
//! - **Safety**: debounced limit-switch interlock on its own thread (`interlock`)
//! - **Runner**: the frame cycle, run limits and summary (`runner`, `status`)
//!
//! ## Threads
//!
//! `PanTracker::run` processes frames on the caller's thread. The pulse loop
//! and the interlock monitor each own one thread, started by the builder and
//! joined with a bounded timeout when the run ends or the tracker is dropped.

pub mod actuator;
pub mod builder;
pub mod config;
pub mod controller;
mod conversions;
pub mod coordinator;
pub mod error;
pub mod hw_error;
pub mod interlock;
pub mod localizer;
pub mod mocks;
pub mod runner;
pub mod segment;
pub mod status;
pub mod types;
pub mod util;
mod worker;

pub use builder::{Missing, PanTrackerBuilder, Set};
pub use config::{ActuatorCfg, InterlockCfg, MaskParams, PulseCfg, RunLimits, Setpoint};
pub use coordinator::{Coordinator, Motion, RejectReason, Submission};
pub use error::{BuildError, PanError, Result};
pub use localizer::{Localizer, MaskHandle};
pub use runner::{Cycle, PanTracker};
pub use segment::{HsvRegionExtractor, Region, RegionExtractor};
pub use status::{InterlockStatus, LatencyStats, RunSummary, StatusSnapshot, StopReason};
pub use types::{
    BoundingBox, Direction, LimitSwitchState, MotorCommand, MotorState, Observation, Override,
};
