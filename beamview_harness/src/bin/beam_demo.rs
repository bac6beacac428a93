use anyhow::Context;
use beamview::persistence::{read_width_table, write_frame_csv, write_width_table, WidthRecord};
use beamview::{AcquisitionConfig, AcquisitionLoop, SensorInfo};
use beamview_harness::{BeamParams, SyntheticBeamCamera};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments for the beam profiling demo
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "End-to-end beam profiling demo on a synthetic camera",
    long_about = "Runs the full acquisition pipeline against a synthetic beam camera:\n\
        poll frames at a fixed cadence, accumulate a rolling average, reduce to\n\
        horizontal/vertical profiles, and fit each profile to an offset Gaussian.\n\
        Reports the fitted beam widths (2-sigma) and can export the averaged frame\n\
        and append the measurement to a CSV table."
)]
struct Args {
    /// Sensor height in pixels
    #[arg(long, default_value_t = 64)]
    height: usize,

    /// Sensor width in pixels
    #[arg(long, default_value_t = 80)]
    width: usize,

    /// Number of poll ticks to run
    #[arg(long, default_value_t = 20)]
    ticks: usize,

    /// Rolling-average window length (1 disables averaging)
    #[arg(long, default_value_t = 4)]
    average: usize,

    /// Poll cadence in milliseconds
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// Exposure time in microseconds
    #[arg(long, default_value_t = 110)]
    exposure_us: u64,

    /// Pixel pitch in micrometers (both axes)
    #[arg(long, default_value_t = 3.45)]
    pixel_size_um: f64,

    /// Beam sigma along the row axis, pixels
    #[arg(long, default_value_t = 4.0)]
    sigma_row: f64,

    /// Beam sigma along the column axis, pixels
    #[arg(long, default_value_t = 6.0)]
    sigma_col: f64,

    /// Uniform noise half-range in ADU
    #[arg(long, default_value_t = 120.0)]
    noise: f64,

    /// RNG seed for the synthetic noise
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write the final averaged frame to this CSV file
    #[arg(long)]
    export_frame: Option<PathBuf>,

    /// Append the fitted widths to this CSV measurement table
    #[arg(long)]
    table: Option<PathBuf>,

    /// Label for the appended table row
    #[arg(long, default_value = "beam_demo")]
    label: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let sensor = SensorInfo {
        height: args.height,
        width: args.width,
        bit_depth: 16,
    };
    let params = BeamParams {
        center_row: args.height as f64 / 2.0,
        center_col: args.width as f64 / 2.0,
        sigma_row: args.sigma_row,
        sigma_col: args.sigma_col,
        noise_amplitude: args.noise,
        ..Default::default()
    };
    let camera = SyntheticBeamCamera::new(sensor, params, args.seed);

    let mut config = AcquisitionConfig::full_sensor(&sensor);
    config.poll_period = Duration::from_millis(args.period_ms);
    config.exposure = Duration::from_micros(args.exposure_us);
    config.average_count = args.average;
    config.pixel_size_h_um = args.pixel_size_um;
    config.pixel_size_v_um = args.pixel_size_um;

    let mut acq = AcquisitionLoop::new(camera, config).context("camera configuration failed")?;

    acq.start()?;
    let mut processed = 0usize;
    for _ in 0..args.ticks {
        if acq.tick()? {
            processed += 1;
        }
        std::thread::sleep(acq.config().poll_period);
    }
    acq.stop()?;
    info!("processed {processed} frames over {} ticks", args.ticks);

    acq.request_fit().context("profile fit failed")?;
    let fit_h = acq
        .fit_horizontal()
        .context("no horizontal fit available")?;
    let fit_v = acq.fit_vertical().context("no vertical fit available")?;

    println!("Beam profile fit ({processed} frames, {}x averaging):", args.average);
    println!(
        "  horizontal: width {:8.3} um  center {:8.3} um  amplitude {:12.1}",
        fit_h.beam_width(),
        fit_h.center,
        fit_h.amplitude
    );
    println!(
        "  vertical:   width {:8.3} um  center {:8.3} um  amplitude {:12.1}",
        fit_v.beam_width(),
        fit_v.center,
        fit_v.amplitude
    );

    if let Some(path) = &args.export_frame {
        let frame = acq.latest_frame().context("no frame to export")?;
        write_frame_csv(path, frame.view())
            .with_context(|| format!("writing frame to {}", path.display()))?;
        println!("wrote averaged frame to {}", path.display());
    }

    if let Some(path) = &args.table {
        let mut records = if path.exists() {
            read_width_table(path)
                .with_context(|| format!("reading existing table {}", path.display()))?
        } else {
            Vec::new()
        };
        records.push(WidthRecord {
            width_h: fit_h.beam_width(),
            width_v: fit_v.beam_width(),
            label: args.label.clone(),
        });
        write_width_table(path, &records)
            .with_context(|| format!("writing table to {}", path.display()))?;
        println!("appended measurement to {}", path.display());
    }

    Ok(())
}
