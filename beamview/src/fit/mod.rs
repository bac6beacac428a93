//! Offset-Gaussian fitting of 1-D beam profiles
//!
//! The model is `f(x) = A·exp(−(x−x0)²/(2σ²)) + d`, so σ is the standard
//! deviation of the profile and the reported beam width is `2σ`. Initial
//! parameters are estimated from the data itself: a chord heuristic decides
//! whether the profile is a peak or a dip, the extremum seeds amplitude and
//! center, and the span of samples past a 60/40 threshold between baseline
//! and extremum seeds the width.

pub mod levmar;

use levmar::{LevMarConfig, Model1D, N_PARAMS};
use thiserror::Error;

/// Minimum number of samples required for fitting
const MIN_SAMPLES: usize = 4;

/// Errors that can occur during profile fitting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Axis and signal have different lengths
    #[error("length mismatch: axis has {axis_len} points, signal has {signal_len}")]
    LengthMismatch { axis_len: usize, signal_len: usize },
    /// Not enough samples to constrain four parameters
    #[error("insufficient data: expected at least {expected}, got {got}")]
    InsufficientData { expected: usize, got: usize },
    /// The profile has no usable structure to seed a width estimate
    /// (flat signal, or fewer than two samples past the seed threshold)
    #[error("degenerate profile: cannot estimate initial width")]
    DegenerateProfile,
    /// The least-squares solver did not converge
    #[error("fit did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },
}

/// Shape classification of a profile relative to its endpoint chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concavity {
    /// A bump above the chord (normal bright-beam profile)
    Peak,
    /// A notch below the chord (e.g. absorption profile)
    Dip,
}

/// Result of fitting an offset Gaussian to a profile
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Peak height above the offset; negative for a dip
    pub amplitude: f64,
    /// Center position in axis units
    pub center: f64,
    /// Standard deviation in axis units, always non-negative
    pub sigma: f64,
    /// Constant baseline offset
    pub offset: f64,
    /// Model sampled at the axis points the fit was made against
    pub curve: Vec<f64>,
}

impl FitResult {
    /// Conventional beam width, `2σ`
    pub fn beam_width(&self) -> f64 {
        2.0 * self.sigma
    }

    /// Evaluate the fitted model at an arbitrary coordinate
    pub fn evaluate(&self, x: f64) -> f64 {
        let dx = x - self.center;
        self.amplitude * (-dx * dx / (2.0 * self.sigma * self.sigma)).exp() + self.offset
    }
}

/// Offset Gaussian, parameters `[amplitude, center, sigma, offset]`
struct OffsetGaussian;

impl Model1D for OffsetGaussian {
    fn evaluate(&self, x: f64, params: &[f64; N_PARAMS]) -> f64 {
        let [amp, center, sigma, offset] = *params;
        let dx = x - center;
        amp * (-dx * dx / (2.0 * sigma * sigma)).exp() + offset
    }

    fn jacobian_row(&self, x: f64, params: &[f64; N_PARAMS]) -> [f64; N_PARAMS] {
        let [amp, center, sigma, _offset] = *params;
        let sigma2 = sigma * sigma;
        let dx = x - center;
        let exp_val = (-dx * dx / (2.0 * sigma2)).exp();
        let amp_exp = amp * exp_val;

        [
            exp_val,                          // df/damp
            amp_exp * dx / sigma2,            // df/dcenter
            amp_exp * dx * dx / (sigma2 * sigma), // df/dsigma
            1.0,                              // df/doffset
        ]
    }

    fn constrain(&self, params: &mut [f64; N_PARAMS]) {
        // Keep sigma away from zero; the solver is free to visit either sign
        if params[2].abs() < 1e-12 {
            params[2] = 1e-12;
        }
    }
}

/// Classify a profile as peak-like or dip-like
///
/// Draws the chord between the samples at the smallest and largest axis
/// values and averages the signed vertical distance of all samples from that
/// line. A non-negative average means the data bulges above the chord.
pub fn check_concavity(axis: &[f64], signal: &[f64]) -> Concavity {
    let first = argmin_by(axis);
    let last = argmax_by(axis);

    let x0 = axis[first];
    let dx = axis[last] - x0;
    let slope = if dx.abs() > f64::EPSILON {
        (signal[last] - signal[first]) / dx
    } else {
        0.0
    };
    let intercept = signal[first];

    let mean_distance: f64 = axis
        .iter()
        .zip(signal.iter())
        .map(|(&x, &y)| y - (intercept + slope * (x - x0)))
        .sum::<f64>()
        / axis.len() as f64;

    if mean_distance >= 0.0 {
        Concavity::Peak
    } else {
        Concavity::Dip
    }
}

fn argmax_by(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

fn argmin_by(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(bi, bv), (i, &v)| {
            if v < bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

/// Estimate starting parameters `[amplitude, center, sigma, offset]`
fn initial_guess(
    axis: &[f64],
    signal: &[f64],
    concavity: Concavity,
) -> Result<[f64; N_PARAMS], FitError> {
    let max_idx = argmax_by(signal);
    let min_idx = argmin_by(signal);
    let max = signal[max_idx];
    let min = signal[min_idx];

    let (amplitude, center, offset, threshold) = match concavity {
        Concavity::Peak => (max - min, axis[max_idx], min, 0.6 * max + 0.4 * min),
        Concavity::Dip => (min - max, axis[min_idx], max, 0.6 * min + 0.4 * max),
    };

    // Samples on the extremum side of the 60/40 threshold bracket the core
    // of the profile; half their axis span seeds sigma.
    let mut span_min = f64::INFINITY;
    let mut span_max = f64::NEG_INFINITY;
    let mut count = 0usize;
    for (&x, &y) in axis.iter().zip(signal.iter()) {
        let inside = match concavity {
            Concavity::Peak => y > threshold,
            Concavity::Dip => y < threshold,
        };
        if inside {
            span_min = span_min.min(x);
            span_max = span_max.max(x);
            count += 1;
        }
    }

    let span = span_max - span_min;
    if count < 2 || span <= 0.0 {
        return Err(FitError::DegenerateProfile);
    }

    Ok([amplitude, center, span / 2.0, offset])
}

/// Fit an offset Gaussian to a profile
///
/// `axis` and `signal` must have equal length of at least four samples; the
/// axis does not need to be sorted. On success σ is reported as `abs(σ)`.
pub fn fit_gaussian(axis: &[f64], signal: &[f64]) -> Result<FitResult, FitError> {
    fit_gaussian_with(axis, signal, &LevMarConfig::default())
}

/// Fit an offset Gaussian with explicit solver settings
pub fn fit_gaussian_with(
    axis: &[f64],
    signal: &[f64],
    config: &LevMarConfig,
) -> Result<FitResult, FitError> {
    if axis.len() != signal.len() {
        return Err(FitError::LengthMismatch {
            axis_len: axis.len(),
            signal_len: signal.len(),
        });
    }
    if axis.len() < MIN_SAMPLES {
        return Err(FitError::InsufficientData {
            expected: MIN_SAMPLES,
            got: axis.len(),
        });
    }

    let concavity = check_concavity(axis, signal);
    let initial = initial_guess(axis, signal, concavity)?;

    let model = OffsetGaussian;
    let result = levmar::optimize(&model, axis, signal, initial, config);

    if !result.converged {
        return Err(FitError::DidNotConverge {
            iterations: result.iterations,
        });
    }

    let [amplitude, center, sigma, offset] = result.params;
    let curve = axis
        .iter()
        .map(|&x| model.evaluate(x, &result.params))
        .collect();

    Ok(FitResult {
        amplitude,
        center,
        sigma: sigma.abs(),
        offset,
        curve,
    })
}
