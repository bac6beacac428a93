//! Synthetic beam camera
//!
//! Renders an elliptical Gaussian spot on a constant background, with
//! optional seeded per-pixel noise and a slow circular drift of the spot
//! center, and serves the result through `CameraInterface`. Frames are
//! rendered at full sensor size and cropped to the applied ROI, the same way
//! a sensor with windowed readout behaves.

use beamview::camera_interface::{
    CameraError, CameraInterface, CameraResult, FrameMetadata, Roi, SensorInfo,
};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, SystemTime};

/// Beam shape and noise parameters
#[derive(Debug, Clone)]
pub struct BeamParams {
    /// Spot center, full-sensor pixel coordinates
    pub center_row: f64,
    pub center_col: f64,
    /// Gaussian widths per axis, pixels
    pub sigma_row: f64,
    pub sigma_col: f64,
    /// Peak height above background, ADU
    pub amplitude: f64,
    /// Constant background level, ADU
    pub background: f64,
    /// Uniform noise half-range, ADU; 0 disables noise
    pub noise_amplitude: f64,
    /// Radius of the circular center drift, pixels; 0 keeps the spot fixed
    pub drift_radius: f64,
    /// Frames per full drift revolution
    pub drift_period_frames: u64,
}

impl Default for BeamParams {
    fn default() -> Self {
        Self {
            center_row: 32.0,
            center_col: 40.0,
            sigma_row: 4.0,
            sigma_col: 6.0,
            amplitude: 20000.0,
            background: 800.0,
            noise_amplitude: 0.0,
            drift_radius: 0.0,
            drift_period_frames: 100,
        }
    }
}

/// Camera that renders synthetic beam frames on every poll
pub struct SyntheticBeamCamera {
    sensor: SensorInfo,
    params: BeamParams,
    armed: bool,
    exposure: Duration,
    roi: Roi,
    frame_number: u64,
    rng: ChaCha8Rng,
}

impl SyntheticBeamCamera {
    pub fn new(sensor: SensorInfo, params: BeamParams, seed: u64) -> Self {
        Self {
            sensor,
            params,
            armed: false,
            exposure: Duration::from_micros(110),
            roi: sensor.full_roi(),
            frame_number: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &BeamParams {
        &self.params
    }

    /// Render the next full-sensor frame
    fn render_frame(&mut self) -> Array2<u16> {
        let p = &self.params;

        let (center_row, center_col) = if p.drift_radius > 0.0 {
            let angle = self.frame_number as f64 / p.drift_period_frames as f64
                * 2.0
                * std::f64::consts::PI;
            (
                p.center_row + p.drift_radius * angle.sin(),
                p.center_col + p.drift_radius * angle.cos(),
            )
        } else {
            (p.center_row, p.center_col)
        };

        let two_sig_r2 = 2.0 * p.sigma_row * p.sigma_row;
        let two_sig_c2 = 2.0 * p.sigma_col * p.sigma_col;
        let max_adu = ((1u32 << self.sensor.bit_depth) - 1) as f64;

        let mut frame = Array2::from_shape_fn((self.sensor.height, self.sensor.width), |(r, c)| {
            let dr = r as f64 - center_row;
            let dc = c as f64 - center_col;
            p.amplitude * (-dr * dr / two_sig_r2 - dc * dc / two_sig_c2).exp() + p.background
        });

        if p.noise_amplitude > 0.0 {
            let half = p.noise_amplitude;
            for value in frame.iter_mut() {
                *value += self.rng.gen_range(-half..half);
            }
        }

        frame.mapv(|v| v.round().clamp(0.0, max_adu) as u16)
    }
}

impl CameraInterface for SyntheticBeamCamera {
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
        self.roi = roi;
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

        let full = self.render_frame();
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_sensor() -> SensorInfo {
        SensorInfo {
            height: 64,
            width: 80,
            bit_depth: 16,
        }
    }

    #[test]
    fn test_spot_sits_on_background() {
        let mut camera = SyntheticBeamCamera::new(test_sensor(), BeamParams::default(), 1);
        camera.start().unwrap();

        let (frame, _) = camera.try_get_frame().unwrap().unwrap();
        assert_eq!(frame.dim(), (64, 80));

        // Peak at the configured center, background in the corner
        assert_relative_eq!(f64::from(frame[[32, 40]]), 20800.0, max_relative = 1e-3);
        assert_relative_eq!(f64::from(frame[[0, 0]]), 800.0, max_relative = 1e-2);
    }

    #[test]
    fn test_noise_is_seeded() {
        let params = BeamParams {
            noise_amplitude: 50.0,
            ..Default::default()
        };
        let mut a = SyntheticBeamCamera::new(test_sensor(), params.clone(), 99);
        let mut b = SyntheticBeamCamera::new(test_sensor(), params, 99);
        a.start().unwrap();
        b.start().unwrap();

        let (fa, _) = a.try_get_frame().unwrap().unwrap();
        let (fb, _) = b.try_get_frame().unwrap().unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn test_drift_moves_the_spot() {
        let params = BeamParams {
            drift_radius: 8.0,
            drift_period_frames: 4,
            ..Default::default()
        };
        let mut camera = SyntheticBeamCamera::new(test_sensor(), params, 1);
        camera.start().unwrap();

        let (first, _) = camera.try_get_frame().unwrap().unwrap();
        let (second, _) = camera.try_get_frame().unwrap().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_roi_crop() {
        let mut camera = SyntheticBeamCamera::new(test_sensor(), BeamParams::default(), 1);
        camera
            .configure(Duration::from_micros(110), Roi::from_coords(16, 20, 47, 59))
            .unwrap();
        camera.start().unwrap();

        let (frame, _) = camera.try_get_frame().unwrap().unwrap();
        assert_eq!(frame.dim(), (32, 40));
        // Spot center lands at the window-relative position
        assert_relative_eq!(f64::from(frame[[16, 20]]), 20800.0, max_relative = 1e-3);
    }
}
