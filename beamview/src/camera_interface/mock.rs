//! Mock camera for tests and simulation
//!
//! Serves canned full-sensor frames through the [`CameraInterface`] trait,
//! cropping to the applied ROI in software. ROI requests are snapped to a
//! configurable readout granularity so callers exercise the
//! actual-differs-from-requested path that real sensors exhibit.

use super::{CameraError, CameraInterface, CameraResult, FrameMetadata, Roi, SensorInfo};
use ndarray::Array2;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// In-memory camera implementation
pub struct MockCameraInterface {
    sensor: SensorInfo,
    /// Full-sensor source frames, served round-robin
    frames: Vec<Array2<u16>>,
    next_frame: usize,
    armed: bool,
    exposure: Duration,
    roi: Roi,
    /// Readout granularity in pixels; requested ROI bounds are snapped to
    /// multiples of this step
    roi_step: usize,
    frame_number: u64,
    /// Upcoming polls that should report no pending frame
    scripted_misses: VecDeque<()>,
}

impl MockCameraInterface {
    /// Camera that serves the same full-sensor frame on every poll
    pub fn new_repeating(sensor: SensorInfo, frame: Array2<u16>) -> Self {
        Self::new_sequence(sensor, vec![frame])
    }

    /// Camera that cycles through a sequence of full-sensor frames
    ///
    /// # Panics
    /// Panics if the sequence is empty or any frame does not match the
    /// sensor dimensions.
    pub fn new_sequence(sensor: SensorInfo, frames: Vec<Array2<u16>>) -> Self {
        assert!(!frames.is_empty(), "mock camera needs at least one frame");
        for frame in &frames {
            assert_eq!(
                frame.dim(),
                (sensor.height, sensor.width),
                "mock frame dimensions must match the sensor"
            );
        }

        Self {
            sensor,
            frames,
            next_frame: 0,
            armed: false,
            exposure: Duration::from_micros(110),
            roi: sensor.full_roi(),
            roi_step: 1,
            frame_number: 0,
            scripted_misses: VecDeque::new(),
        }
    }

    /// Set the readout granularity used to snap requested ROI bounds
    pub fn with_roi_step(mut self, step: usize) -> Self {
        assert!(step >= 1, "ROI step must be at least 1");
        self.roi_step = step;
        self
    }

    /// Make the next `count` polls report no pending frame
    pub fn starve(&mut self, count: usize) {
        self.scripted_misses.extend(std::iter::repeat(()).take(count));
    }

    /// Replace the served frames (full-sensor dimensions required)
    pub fn set_frames(&mut self, frames: Vec<Array2<u16>>) {
        assert!(!frames.is_empty(), "mock camera needs at least one frame");
        for frame in &frames {
            assert_eq!(frame.dim(), (self.sensor.height, self.sensor.width));
        }
        self.frames = frames;
        self.next_frame = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Snap requested bounds outward to the readout granularity
    fn snap_roi(&self, roi: Roi) -> Roi {
        let step = self.roi_step;
        let min_row = roi.min_row - roi.min_row % step;
        let min_col = roi.min_col - roi.min_col % step;
        let max_row = ((roi.max_row / step + 1) * step - 1).min(self.sensor.height - 1);
        let max_col = ((roi.max_col / step + 1) * step - 1).min(self.sensor.width - 1);
        Roi::from_coords(min_row, min_col, max_row, max_col)
    }
}

impl CameraInterface for MockCameraInterface {
    fn sensor(&self) -> &SensorInfo {
        &self.sensor
    }

    fn configure(&mut self, exposure: Duration, roi: Roi) -> CameraResult<Roi> {
        if exposure.is_zero() {
            return Err(CameraError::ConfigRejected {
                field: "exposure",
                reason: "exposure time must be positive".to_string(),
            });
        }
        roi.validate_for_sensor(&self.sensor)?;

        self.exposure = exposure;
        self.roi = self.snap_roi(roi);
        Ok(self.roi)
    }

    fn roi(&self) -> Roi {
        self.roi
    }

    fn exposure(&self) -> Duration {
        self.exposure
    }

    fn start(&mut self) -> CameraResult<()> {
        self.armed = true;
        Ok(())
    }

    fn stop(&mut self) -> CameraResult<()> {
        self.armed = false;
        Ok(())
    }

    fn try_get_frame(&mut self) -> CameraResult<Option<(Array2<u16>, FrameMetadata)>> {
        if !self.armed {
            return Err(CameraError::NotArmed);
        }
        if self.scripted_misses.pop_front().is_some() {
            return Ok(None);
        }

        let full = &self.frames[self.next_frame];
        self.next_frame = (self.next_frame + 1) % self.frames.len();

        let frame = self.roi.extract_from_frame(&full.view());
        self.frame_number += 1;

        let metadata = FrameMetadata {
            frame_number: self.frame_number,
            exposure: self.exposure,
            timestamp: SystemTime::now(),
            roi: self.roi,
        };

        Ok(Some((frame, metadata)))
    }
}
