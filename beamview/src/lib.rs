//! BEAMVIEW - headless beam-profile analysis pipeline
//!
//! Polls a scientific camera for frames, maintains a rolling average over the
//! most recent frames, reduces each frame to horizontal/vertical intensity
//! profiles, and fits those profiles to an offset Gaussian to report beam
//! width. Rendering and storage of the results are left to the caller; the
//! pipeline itself has no display dependencies.

pub mod accumulator;
pub mod acquisition;
pub mod camera_interface;
pub mod fit;
pub mod persistence;
pub mod projection;

// Re-export commonly used types for external use
pub use crate::accumulator::FrameAccumulator;
pub use crate::acquisition::{
    AcquisitionConfig, AcquisitionLoop, LoopState, ProjectionSnapshot,
};
pub use crate::camera_interface::{
    CameraError, CameraInterface, CameraResult, FrameMetadata, Roi, SensorInfo,
};
pub use crate::fit::{check_concavity, fit_gaussian, Concavity, FitError, FitResult};
pub use crate::projection::{Profile, ProjectionReducer};
