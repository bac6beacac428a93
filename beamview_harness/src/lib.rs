//! Harness for exercising beamview without hardware
//!
//! Provides a synthetic beam camera that serves generated Gaussian-spot
//! frames through the `CameraInterface` trait, so the whole acquisition and
//! fitting pipeline runs end-to-end in simulation.

pub mod beam_camera;

pub use beam_camera::{BeamParams, SyntheticBeamCamera};
