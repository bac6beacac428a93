//! End-to-end pipeline tests using pure ndarray frames without hardware

use approx::assert_relative_eq;
use beamview::camera_interface::mock::MockCameraInterface;
use beamview::{AcquisitionConfig, AcquisitionLoop, Roi, SensorInfo};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SENSOR: SensorInfo = SensorInfo {
    height: 64,
    width: 80,
    bit_depth: 16,
};

/// Create a synthetic beam frame: separable Gaussian spot plus background
fn create_beam_frame(
    center_row: f64,
    center_col: f64,
    sigma_row: f64,
    sigma_col: f64,
    amplitude: f64,
    background: f64,
) -> Array2<u16> {
    Array2::from_shape_fn((SENSOR.height, SENSOR.width), |(r, c)| {
        let dr = r as f64 - center_row;
        let dc = c as f64 - center_col;
        let value = amplitude
            * (-dr * dr / (2.0 * sigma_row * sigma_row)).exp()
            * (-dc * dc / (2.0 * sigma_col * sigma_col)).exp()
            + background;
        value.round().clamp(0.0, 65535.0) as u16
    })
}

/// Same beam with seeded per-pixel noise
fn create_noisy_beam_frame(seed: u64) -> Array2<u16> {
    let clean = create_beam_frame(32.0, 40.0, 4.0, 6.0, 20000.0, 800.0);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    clean.mapv(|v| {
        let noise: i32 = rng.gen_range(-60..=60);
        (v as i32 + noise).clamp(0, 65535) as u16
    })
}

#[test]
fn test_full_pipeline_recovers_beam_widths() {
    let frames: Vec<Array2<u16>> = (0..8).map(create_noisy_beam_frame).collect();
    let camera = MockCameraInterface::new_sequence(SENSOR, frames);

    let mut config = AcquisitionConfig::full_sensor(&SENSOR);
    config.average_count = 4;
    let mut acq = AcquisitionLoop::new(camera, config).unwrap();

    acq.start().unwrap();
    for _ in 0..8 {
        assert!(acq.tick().unwrap());
    }

    acq.request_fit().unwrap();

    // The horizontal profile is per-row, so it carries the row-direction
    // sigma; pixel size is 1 µm so widths come out in pixels
    let fit_h = acq.fit_horizontal().unwrap();
    assert_relative_eq!(fit_h.sigma, 4.0, max_relative = 0.02);
    assert_relative_eq!(fit_h.beam_width(), 8.0, max_relative = 0.02);

    let fit_v = acq.fit_vertical().unwrap();
    assert_relative_eq!(fit_v.sigma, 6.0, max_relative = 0.02);
    assert_relative_eq!(fit_v.beam_width(), 12.0, max_relative = 0.02);
}

#[test]
fn test_pixel_size_scales_fitted_width() {
    let frame = create_beam_frame(32.0, 40.0, 4.0, 6.0, 20000.0, 800.0);
    let camera = MockCameraInterface::new_repeating(SENSOR, frame);

    let mut config = AcquisitionConfig::full_sensor(&SENSOR);
    config.pixel_size_h_um = 6.9;
    config.pixel_size_v_um = 3.45;
    let mut acq = AcquisitionLoop::new(camera, config).unwrap();

    acq.start().unwrap();
    acq.tick().unwrap();
    acq.request_fit().unwrap();

    let fit_h = acq.fit_horizontal().unwrap();
    assert_relative_eq!(fit_h.sigma, 4.0 * 6.9, max_relative = 0.02);

    let fit_v = acq.fit_vertical().unwrap();
    assert_relative_eq!(fit_v.sigma, 6.0 * 3.45, max_relative = 0.02);
}

#[test]
fn test_roi_shrink_while_running() {
    let frame = create_beam_frame(32.0, 40.0, 4.0, 6.0, 20000.0, 800.0);
    let camera = MockCameraInterface::new_repeating(SENSOR, frame);

    let mut acq = AcquisitionLoop::new(camera, AcquisitionConfig::full_sensor(&SENSOR)).unwrap();
    acq.start().unwrap();
    acq.tick().unwrap();
    assert_eq!(acq.latest().unwrap().horizontal.len(), 64);

    // Shrink to a window around the beam while the loop is running
    let mut config = acq.config().clone();
    config.roi = Roi::from_coords(16, 16, 47, 63);
    acq.apply_config(config).unwrap();

    // No stale full-sensor data survives the change
    assert!(acq.latest().is_none());

    acq.tick().unwrap();
    let snapshot = acq.latest().unwrap();
    assert_eq!(snapshot.horizontal.len(), 32);
    assert_eq!(snapshot.vertical.len(), 48);

    // The beam still fits inside the window; widths are unchanged
    acq.request_fit().unwrap();
    assert_relative_eq!(
        acq.fit_horizontal().unwrap().sigma,
        4.0,
        max_relative = 0.02
    );
}

#[test]
fn test_averaging_suppresses_noise_in_profiles() {
    let frames: Vec<Array2<u16>> = (0..16).map(create_noisy_beam_frame).collect();
    let camera = MockCameraInterface::new_sequence(SENSOR, frames.clone());

    // Single-frame pipeline
    let mut single = AcquisitionLoop::new(
        MockCameraInterface::new_sequence(SENSOR, frames),
        AcquisitionConfig::full_sensor(&SENSOR),
    )
    .unwrap();
    single.start().unwrap();
    single.tick().unwrap();

    // 16-frame averaged pipeline
    let mut config = AcquisitionConfig::full_sensor(&SENSOR);
    config.average_count = 16;
    let mut averaged = AcquisitionLoop::new(camera, config).unwrap();
    averaged.start().unwrap();
    for _ in 0..16 {
        averaged.tick().unwrap();
    }

    // Per-row mean absolute deviation from the clean row sums
    let clean = create_beam_frame(32.0, 40.0, 4.0, 6.0, 20000.0, 800.0);
    let clean_sums: Vec<f64> = clean
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| f64::from(v)).sum())
        .collect();
    let mean_abs_err = |values: &[f64]| -> f64 {
        values
            .iter()
            .zip(clean_sums.iter())
            .map(|(v, c)| (v - c).abs())
            .sum::<f64>()
            / values.len() as f64
    };

    let single_err = mean_abs_err(&single.latest().unwrap().horizontal.values);
    let averaged_err = mean_abs_err(&averaged.latest().unwrap().horizontal.values);

    // Averaging 16 frames should sit well below a single noisy frame
    assert!(
        averaged_err < single_err,
        "averaged profile should be closer to the clean sums: {averaged_err} vs {single_err}"
    );
}

#[test]
fn test_export_measurements_from_pipeline() {
    let frame = create_beam_frame(32.0, 40.0, 4.0, 6.0, 20000.0, 800.0);
    let camera = MockCameraInterface::new_repeating(SENSOR, frame);
    let mut acq = AcquisitionLoop::new(camera, AcquisitionConfig::full_sensor(&SENSOR)).unwrap();

    acq.start().unwrap();
    acq.tick().unwrap();
    acq.request_fit().unwrap();

    let dir = tempfile::tempdir().unwrap();

    // Averaged frame round-trips through CSV text
    let frame_path = dir.path().join("frame.csv");
    beamview::persistence::write_frame_csv(&frame_path, acq.latest_frame().unwrap().view())
        .unwrap();
    let text = std::fs::read_to_string(&frame_path).unwrap();
    assert_eq!(text.lines().count(), 64);

    // Fit widths round-trip through the measurement table
    let record = beamview::persistence::WidthRecord {
        width_h: acq.fit_horizontal().unwrap().beam_width(),
        width_v: acq.fit_vertical().unwrap().beam_width(),
        label: "pipeline".to_string(),
    };
    let table_path = dir.path().join("widths.csv");
    beamview::persistence::write_width_table(&table_path, &[record.clone()]).unwrap();
    let loaded = beamview::persistence::read_width_table(&table_path).unwrap();
    assert_eq!(loaded, vec![record]);
}
