//! Polling acquisition state machine
//!
//! Owns the camera, the frame accumulator, and the projection reducer, and
//! exposes a narrow command surface: `start`, `stop`, `tick`, `apply_config`,
//! `request_fit`. The driver (a timer, a test, a CLI loop) calls `tick` once
//! per poll period; everything inside a tick runs to completion on the
//! caller's thread, so readers of the cached snapshot never observe a
//! half-updated state.

use crate::accumulator::FrameAccumulator;
use crate::camera_interface::{CameraInterface, CameraResult, Roi, SensorInfo};
use crate::fit::{fit_gaussian, FitError, FitResult};
use crate::projection::{Profile, ProjectionReducer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Full acquisition configuration, applied atomically via `apply_config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Poll cadence the driver should tick at
    pub poll_period: Duration,
    /// Camera exposure time
    pub exposure: Duration,
    /// Rolling-average window length; 1 disables averaging
    pub average_count: usize,
    /// Pixel pitch along the horizontal-profile axis, µm
    pub pixel_size_h_um: f64,
    /// Pixel pitch along the vertical-profile axis, µm
    pub pixel_size_v_um: f64,
    /// Requested capture window; the hardware-applied window is what the
    /// loop actually sizes its buffers from
    pub roi: Roi,
}

impl AcquisitionConfig {
    /// Reasonable defaults covering the full sensor
    pub fn full_sensor(sensor: &SensorInfo) -> Self {
        Self {
            poll_period: Duration::from_millis(10),
            exposure: Duration::from_micros(110),
            average_count: 1,
            pixel_size_h_um: 1.0,
            pixel_size_v_um: 1.0,
            roi: sensor.full_roi(),
        }
    }

    fn validate(&self) -> CameraResult<()> {
        use crate::camera_interface::CameraError::ConfigRejected;
        if self.poll_period.is_zero() {
            return Err(ConfigRejected {
                field: "poll_period",
                reason: "poll period must be positive".to_string(),
            });
        }
        if self.average_count == 0 {
            return Err(ConfigRejected {
                field: "average_count",
                reason: "averaging window must hold at least one frame".to_string(),
            });
        }
        if self.pixel_size_h_um <= 0.0 {
            return Err(ConfigRejected {
                field: "pixel_size_h_um",
                reason: format!("pixel size must be positive, got {}", self.pixel_size_h_um),
            });
        }
        if self.pixel_size_v_um <= 0.0 {
            return Err(ConfigRejected {
                field: "pixel_size_v_um",
                reason: format!("pixel size must be positive, got {}", self.pixel_size_v_um),
            });
        }
        Ok(())
    }
}

/// Acquisition states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Latest reduced data, published once per processed frame
#[derive(Debug, Clone)]
pub struct ProjectionSnapshot {
    /// Per-row profile (see `projection` for the orientation convention)
    pub horizontal: Profile,
    /// Per-column profile
    pub vertical: Profile,
    /// Camera frame number the snapshot was reduced from
    pub frame_number: u64,
}

/// Polling acquisition loop over a camera
pub struct AcquisitionLoop<C: CameraInterface> {
    camera: C,
    config: AcquisitionConfig,
    state: LoopState,
    accumulator: FrameAccumulator,
    reducer: ProjectionReducer,
    latest: Option<ProjectionSnapshot>,
    latest_frame: Option<Array2<f64>>,
    fit_h: Option<FitResult>,
    fit_v: Option<FitResult>,
}

impl<C: CameraInterface> AcquisitionLoop<C> {
    /// Create a loop around a camera, applying the initial configuration
    ///
    /// The camera's reported ROI (which may differ from the requested one)
    /// determines buffer and axis sizing. The loop starts Stopped.
    pub fn new(mut camera: C, config: AcquisitionConfig) -> CameraResult<Self> {
        config.validate()?;
        let actual_roi = camera.configure(config.exposure, config.roi)?;
        if actual_roi != config.roi {
            log::info!(
                "camera adjusted ROI: requested {:?}, applied {:?}",
                config.roi,
                actual_roi
            );
        }
        let (rows, cols) = actual_roi.shape();
        let config = AcquisitionConfig {
            roi: actual_roi,
            ..config
        };

        Ok(Self {
            accumulator: FrameAccumulator::new(config.average_count, rows, cols),
            reducer: ProjectionReducer::new(config.pixel_size_h_um, config.pixel_size_v_um),
            camera,
            config,
            state: LoopState::Stopped,
            latest: None,
            latest_frame: None,
            fit_h: None,
            fit_v: None,
        })
    }

    /// Arm the camera and enter Running; idempotent
    pub fn start(&mut self) -> CameraResult<()> {
        if self.state == LoopState::Running {
            return Ok(());
        }
        self.camera.start()?;
        self.state = LoopState::Running;
        log::info!("acquisition started");
        Ok(())
    }

    /// Disarm the camera and enter Stopped; idempotent
    pub fn stop(&mut self) -> CameraResult<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }
        self.camera.stop()?;
        self.state = LoopState::Stopped;
        log::info!("acquisition stopped");
        Ok(())
    }

    /// Process one poll period
    ///
    /// While Stopped this is a no-op that does not touch the camera. While
    /// Running it polls for a frame; a pending frame is accumulated, reduced,
    /// and published as the latest snapshot. Returns whether a frame was
    /// processed.
    pub fn tick(&mut self) -> CameraResult<bool> {
        if self.state == LoopState::Stopped {
            return Ok(false);
        }

        let Some((frame, metadata)) = self.camera.try_get_frame()? else {
            // Nothing pending this tick
            return Ok(false);
        };

        if frame.dim() != self.accumulator.shape() {
            // Stale-shaped frame from before a reconfiguration; never let it
            // reach the reducer
            log::warn!(
                "dropping frame {}: shape {:?} does not match configured {:?}",
                metadata.frame_number,
                frame.dim(),
                self.accumulator.shape()
            );
            return Ok(false);
        }

        let frame = frame.mapv(f64::from);
        let averaged = self.accumulator.push(frame.view());
        let (horizontal, vertical) = self.reducer.reduce(averaged.view());

        self.latest = Some(ProjectionSnapshot {
            horizontal,
            vertical,
            frame_number: metadata.frame_number,
        });
        self.latest_frame = Some(averaged);

        Ok(true)
    }

    /// Fit both cached profiles to offset Gaussians
    ///
    /// Runs synchronously on the caller's thread, so in the cooperative
    /// model a fit can never interleave with a tick. On failure the previous
    /// fit for that orientation is left in place, so consumers keep
    /// rendering the last good overlay. Returns the first error encountered;
    /// both orientations are always attempted.
    pub fn request_fit(&mut self) -> Result<(), FitError> {
        let snapshot = self.latest.as_ref().ok_or(FitError::InsufficientData {
            expected: 4,
            got: 0,
        })?;

        let mut first_error = None;

        match fit_gaussian(&snapshot.horizontal.axis, &snapshot.horizontal.values) {
            Ok(fit) => {
                log::debug!("horizontal fit: width {:.3}", fit.beam_width());
                self.fit_h = Some(fit);
            }
            Err(e) => {
                log::warn!("horizontal fit failed: {e}");
                first_error = Some(e);
            }
        }

        match fit_gaussian(&snapshot.vertical.axis, &snapshot.vertical.values) {
            Ok(fit) => {
                log::debug!("vertical fit: width {:.3}", fit.beam_width());
                self.fit_v = Some(fit);
            }
            Err(e) => {
                log::warn!("vertical fit failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Replace the configuration: stop, reconfigure, reset caches, restart
    ///
    /// If the camera rejects the new settings the previous configuration
    /// stays authoritative and the loop resumes in its prior state; the
    /// returned error names the rejected field.
    pub fn apply_config(&mut self, config: AcquisitionConfig) -> CameraResult<()> {
        config.validate()?;

        let was_running = self.state == LoopState::Running;
        if was_running {
            self.camera.stop()?;
            self.state = LoopState::Stopped;
        }

        let applied = self.camera.configure(config.exposure, config.roi);

        match applied {
            Ok(actual_roi) => {
                if actual_roi != config.roi {
                    log::info!(
                        "camera adjusted ROI: requested {:?}, applied {:?}",
                        config.roi,
                        actual_roi
                    );
                }
                let (rows, cols) = actual_roi.shape();
                self.config = AcquisitionConfig {
                    roi: actual_roi,
                    ..config
                };
                self.accumulator.set_capacity(self.config.average_count);
                self.accumulator.reset(rows, cols);
                self.reducer
                    .set_pixel_sizes(self.config.pixel_size_h_um, self.config.pixel_size_v_um);
                self.reducer.invalidate();
                self.latest = None;
                self.latest_frame = None;
            }
            Err(e) => {
                log::warn!("configuration rejected, keeping previous: {e}");
                if was_running {
                    self.camera.start()?;
                    self.state = LoopState::Running;
                }
                return Err(e);
            }
        }

        if was_running {
            self.camera.start()?;
            self.state = LoopState::Running;
        }
        Ok(())
    }

    /// Active configuration (ROI is the hardware-applied one)
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Latest reduced profiles, if any frame has been processed
    pub fn latest(&self) -> Option<&ProjectionSnapshot> {
        self.latest.as_ref()
    }

    /// Averaged frame behind the latest snapshot
    pub fn latest_frame(&self) -> Option<&Array2<f64>> {
        self.latest_frame.as_ref()
    }

    /// Most recent successful horizontal fit
    pub fn fit_horizontal(&self) -> Option<&FitResult> {
        self.fit_h.as_ref()
    }

    /// Most recent successful vertical fit
    pub fn fit_vertical(&self) -> Option<&FitResult> {
        self.fit_v.as_ref()
    }

    /// Access the underlying camera
    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }
}
