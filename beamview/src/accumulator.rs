//! Rolling average over the most recent camera frames
//!
//! Keeps a bounded ring of the last N frames plus a running sum, so each push
//! returns the current average without re-summing the whole window. While the
//! ring is still filling, the average divides by the number of frames seen so
//! far; once full, the oldest frame is evicted and the divisor stays at N.

use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;

/// Bounded ring buffer of frames with an on-demand average
///
/// A capacity of 1 acts as a pass-through: every push returns the pushed
/// frame unchanged.
#[derive(Debug)]
pub struct FrameAccumulator {
    capacity: usize,
    frames: VecDeque<Array2<f64>>,
    sum: Array2<f64>,
}

impl FrameAccumulator {
    /// Create an accumulator for frames of the given shape
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize, rows: usize, cols: usize) -> Self {
        assert!(capacity >= 1, "accumulator capacity must be at least 1");
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
            sum: Array2::zeros((rows, cols)),
        }
    }

    /// Push a frame and return the average over the current window
    ///
    /// # Panics
    /// Panics if the frame shape does not match the accumulator shape; the
    /// caller must `reset` to the new dimensions after any ROI change before
    /// pushing again.
    pub fn push(&mut self, frame: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(
            frame.dim(),
            self.sum.dim(),
            "frame shape does not match accumulator shape"
        );

        if self.frames.len() == self.capacity {
            // Evict the oldest frame from the running sum
            if let Some(oldest) = self.frames.pop_front() {
                self.sum -= &oldest;
            }
        }

        self.sum += &frame;
        self.frames.push_back(frame.to_owned());

        &self.sum / self.frames.len() as f64
    }

    /// Drop all buffered frames and adopt new frame dimensions
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.frames.clear();
        self.sum = Array2::zeros((rows, cols));
    }

    /// Change the window length, clearing any buffered frames
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn set_capacity(&mut self, capacity: usize) {
        assert!(capacity >= 1, "accumulator capacity must be at least 1");
        self.capacity = capacity;
        let (rows, cols) = self.sum.dim();
        self.reset(rows, cols);
    }

    /// Window length N
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently buffered (0..=N)
    pub fn fill_count(&self) -> usize {
        self.frames.len()
    }

    /// Expected frame shape `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.sum.dim()
    }
}
