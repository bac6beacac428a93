//! Camera abstraction for polled frame acquisition
//!
//! The pipeline never talks to vendor SDKs directly; it is written against
//! [`CameraInterface`], a pull-based trait with non-blocking poll semantics.
//! Hardware backends live outside this crate. [`mock`] provides a
//! deterministic in-memory implementation for tests and simulation.

pub mod mock;

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Errors that can occur when talking to a camera
#[derive(Error, Debug)]
pub enum CameraError {
    /// No camera hardware was found at discovery time
    #[error("no camera detected")]
    NoCameraDetected,
    /// A requested setting could not be applied; the previous configuration
    /// remains in effect
    #[error("camera rejected {field}: {reason}")]
    ConfigRejected { field: &'static str, reason: String },
    /// Frame capture failed at the hardware level
    #[error("capture failed: {0}")]
    CaptureError(String),
    /// The camera was polled without being armed first
    #[error("camera is not armed")]
    NotArmed,
}

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Static description of the sensor behind a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorInfo {
    /// Full sensor height in pixels (rows)
    pub height: usize,
    /// Full sensor width in pixels (columns)
    pub width: usize,
    /// ADC bit depth of each sample
    pub bit_depth: u8,
}

impl SensorInfo {
    /// ROI covering the whole sensor
    pub fn full_roi(&self) -> Roi {
        Roi::from_coords(0, 0, self.height - 1, self.width - 1)
    }
}

/// Rectangular pixel sub-window of the sensor, with inclusive bounds.
///
/// Rows increase downward, columns rightward. Frame dimensions follow the
/// ROI: a captured frame has `roi.height()` rows and `roi.width()` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Minimum row (inclusive)
    pub min_row: usize,
    /// Minimum column (inclusive)
    pub min_col: usize,
    /// Maximum row (inclusive)
    pub max_row: usize,
    /// Maximum column (inclusive)
    pub max_col: usize,
}

impl Roi {
    /// Create an ROI from inclusive corner coordinates
    pub fn from_coords(min_row: usize, min_col: usize, max_row: usize, max_col: usize) -> Self {
        Self {
            min_row,
            min_col,
            max_row,
            max_col,
        }
    }

    /// Height in pixels (rows)
    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Width in pixels (columns)
    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Frame shape `(rows, cols)` produced by this ROI
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Check that the ROI is well-formed and fits on the given sensor
    pub fn validate_for_sensor(&self, sensor: &SensorInfo) -> CameraResult<()> {
        if self.min_row > self.max_row || self.min_col > self.max_col {
            return Err(CameraError::ConfigRejected {
                field: "roi",
                reason: format!(
                    "inverted bounds: rows {}..={}, cols {}..={}",
                    self.min_row, self.max_row, self.min_col, self.max_col
                ),
            });
        }
        if self.max_row >= sensor.height || self.max_col >= sensor.width {
            return Err(CameraError::ConfigRejected {
                field: "roi",
                reason: format!(
                    "exceeds sensor {}x{}: rows {}..={}, cols {}..={}",
                    sensor.height, sensor.width, self.min_row, self.max_row, self.min_col,
                    self.max_col
                ),
            });
        }
        Ok(())
    }

    /// Crop a full-sensor frame down to this ROI
    pub fn extract_from_frame(&self, frame: &ArrayView2<u16>) -> Array2<u16> {
        frame
            .slice(s![
                self.min_row..=self.max_row,
                self.min_col..=self.max_col
            ])
            .to_owned()
    }
}

/// Metadata attached to every captured frame
#[derive(Debug, Clone, Copy)]
pub struct FrameMetadata {
    /// Monotonic frame counter, starting at 1 for the first frame after arm
    pub frame_number: u64,
    /// Exposure the frame was captured with
    pub exposure: Duration,
    /// Capture timestamp
    pub timestamp: SystemTime,
    /// ROI actually applied by the hardware for this frame
    pub roi: Roi,
}

/// Pull-based camera abstraction
///
/// Implementations must apply `configure` atomically: on error the previous
/// exposure and ROI stay in effect. The ROI returned by `configure` is the
/// one the hardware actually applied. It may differ from the request (sensor
/// readout granularity), and callers must size buffers from it, never from
/// the requested ROI.
pub trait CameraInterface {
    /// Static sensor description
    fn sensor(&self) -> &SensorInfo;

    /// Apply exposure and ROI, returning the hardware-applied ROI
    fn configure(&mut self, exposure: Duration, roi: Roi) -> CameraResult<Roi>;

    /// Currently applied (hardware-reported) ROI
    fn roi(&self) -> Roi;

    /// Currently applied exposure
    fn exposure(&self) -> Duration;

    /// Arm the camera for continuous capture
    fn start(&mut self) -> CameraResult<()>;

    /// Disarm the camera; subsequent polls are invalid until re-armed
    fn stop(&mut self) -> CameraResult<()>;

    /// Non-blocking poll for the next frame
    ///
    /// Returns `Ok(None)` when no frame is pending; this is not an error.
    fn try_get_frame(&mut self) -> CameraResult<Option<(Array2<u16>, FrameMetadata)>>;
}
