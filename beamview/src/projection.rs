//! Reduction of 2-D frames to 1-D intensity profiles
//!
//! Orientation convention used throughout this crate: the *horizontal*
//! profile has one entry per frame row (each row summed across its columns)
//! and is displayed against row index; the *vertical* profile has one entry
//! per column. Profile values are raw sums; normalization, if wanted, is the
//! fitting stage's concern.
//!
//! Physical axes are `pixel_size * index` and are cached per profile length,
//! so repeated frames of the same shape reuse the same coordinates instead of
//! recomputing them every tick.

use ndarray::ArrayView2;
use num_traits::ToPrimitive;

/// A 1-D intensity profile paired with its physical axis
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Raw per-row or per-column sums
    pub values: Vec<f64>,
    /// Physical coordinate of each entry, in the pixel-size units
    pub axis: Vec<f64>,
}

impl Profile {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reduces frames to horizontal/vertical profiles with cached axes
#[derive(Debug)]
pub struct ProjectionReducer {
    pixel_size_h: f64,
    pixel_size_v: f64,
    axis_h: Vec<f64>,
    axis_v: Vec<f64>,
}

impl ProjectionReducer {
    /// Create a reducer with the given pixel pitches (e.g. µm per pixel)
    ///
    /// # Panics
    /// Panics if either pixel size is not strictly positive.
    pub fn new(pixel_size_h: f64, pixel_size_v: f64) -> Self {
        assert!(
            pixel_size_h > 0.0 && pixel_size_v > 0.0,
            "pixel sizes must be positive"
        );
        Self {
            pixel_size_h,
            pixel_size_v,
            axis_h: Vec::new(),
            axis_v: Vec::new(),
        }
    }

    /// Replace the pixel pitches, invalidating cached axes if they changed
    pub fn set_pixel_sizes(&mut self, pixel_size_h: f64, pixel_size_v: f64) {
        assert!(
            pixel_size_h > 0.0 && pixel_size_v > 0.0,
            "pixel sizes must be positive"
        );
        if pixel_size_h != self.pixel_size_h || pixel_size_v != self.pixel_size_v {
            self.pixel_size_h = pixel_size_h;
            self.pixel_size_v = pixel_size_v;
            self.invalidate();
        }
    }

    /// Drop cached axes; they are rebuilt on the next `reduce`
    pub fn invalidate(&mut self) {
        self.axis_h.clear();
        self.axis_v.clear();
    }

    pub fn pixel_sizes(&self) -> (f64, f64) {
        (self.pixel_size_h, self.pixel_size_v)
    }

    /// Reduce a frame to `(horizontal, vertical)` profiles
    ///
    /// Accepts any sample type convertible to `f64`, so both raw `u16`
    /// camera frames and averaged `f64` frames reduce through the same path.
    pub fn reduce<T: ToPrimitive>(&mut self, frame: ArrayView2<T>) -> (Profile, Profile) {
        let (rows, cols) = frame.dim();

        let mut horizontal = vec![0.0; rows];
        let mut vertical = vec![0.0; cols];
        for ((r, c), sample) in frame.indexed_iter() {
            let v = sample.to_f64().unwrap_or(0.0);
            horizontal[r] += v;
            vertical[c] += v;
        }

        if self.axis_h.len() != rows {
            self.axis_h = (0..rows).map(|i| self.pixel_size_h * i as f64).collect();
        }
        if self.axis_v.len() != cols {
            self.axis_v = (0..cols).map(|i| self.pixel_size_v * i as f64).collect();
        }

        (
            Profile {
                values: horizontal,
                axis: self.axis_h.clone(),
            },
            Profile {
                values: vertical,
                axis: self.axis_v.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_uniform_frame_sums() {
        let frame = Array2::<f64>::from_elem((4, 6), 3.0);
        let mut reducer = ProjectionReducer::new(1.0, 1.0);

        let (h, v) = reducer.reduce(frame.view());

        // Each row sums 6 columns, each column sums 4 rows
        assert_eq!(h.len(), 4);
        assert_eq!(v.len(), 6);
        for value in &h.values {
            assert_relative_eq!(*value, 18.0);
        }
        for value in &v.values {
            assert_relative_eq!(*value, 12.0);
        }
    }

    #[test]
    fn test_single_hot_pixel() {
        let mut frame = Array2::<u16>::zeros((5, 7));
        frame[[2, 3]] = 100;
        let mut reducer = ProjectionReducer::new(1.0, 1.0);

        let (h, v) = reducer.reduce(frame.view());
        assert_relative_eq!(h.values[2], 100.0);
        assert_relative_eq!(h.values[0], 0.0);
        assert_relative_eq!(v.values[3], 100.0);
        assert_relative_eq!(v.values[6], 0.0);
    }

    #[test]
    fn test_axis_scaling() {
        let frame = Array2::<f64>::zeros((3, 4));
        let mut reducer = ProjectionReducer::new(6.9, 2.5);

        let (h, v) = reducer.reduce(frame.view());
        assert_relative_eq!(h.axis[0], 0.0);
        assert_relative_eq!(h.axis[2], 13.8);
        assert_relative_eq!(v.axis[3], 7.5);
    }

    #[test]
    fn test_axis_cache_reused_across_frames() {
        let frame = Array2::<f64>::zeros((3, 3));
        let mut reducer = ProjectionReducer::new(1.0, 1.0);

        let (h1, _) = reducer.reduce(frame.view());
        let (h2, _) = reducer.reduce(frame.view());
        assert_eq!(h1.axis, h2.axis);
    }

    #[test]
    fn test_axis_rebuilt_on_shape_change() {
        let mut reducer = ProjectionReducer::new(2.0, 2.0);

        let (h, _) = reducer.reduce(Array2::<f64>::zeros((4, 4)).view());
        assert_eq!(h.axis.len(), 4);

        let (h, v) = reducer.reduce(Array2::<f64>::zeros((6, 2)).view());
        assert_eq!(h.axis.len(), 6);
        assert_eq!(v.axis.len(), 2);
        assert_relative_eq!(h.axis[5], 10.0);
    }

    #[test]
    fn test_pixel_size_change_invalidates_axes() {
        let frame = Array2::<f64>::zeros((4, 4));
        let mut reducer = ProjectionReducer::new(1.0, 1.0);

        let (h, _) = reducer.reduce(frame.view());
        assert_relative_eq!(h.axis[3], 3.0);

        reducer.set_pixel_sizes(2.0, 2.0);
        let (h, _) = reducer.reduce(frame.view());
        assert_relative_eq!(h.axis[3], 6.0);
    }
}
