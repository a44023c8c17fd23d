//! Bounded history of clean observations used for outlier detection.

use statrs::statistics::{Data, Median};
use std::collections::VecDeque;

/// Outcome of testing an observation against a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowVerdict<const N: usize> {
    /// Window not yet full; accepted without judgement
    Bootstrap,
    /// Within the allowed deviation of the median
    Accepted,
    /// Too far from the median; window left untouched
    Rejected { median: [f64; N] },
}

impl<const N: usize> WindowVerdict<N> {
    /// Whether the observation was accepted.
    pub fn is_clean(&self) -> bool {
        !matches!(self, WindowVerdict::Rejected { .. })
    }
}

/// Fixed-capacity FIFO of clean observations.
///
/// Each observation has `N` fields (one price for bars and trades, ask and
/// bid for quotes). The median is taken per field.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanlinessWindow<const N: usize> {
    values: VecDeque<[f64; N]>,
    capacity: usize,
}

/// Window of single prices.
pub type PriceWindow = CleanlinessWindow<1>;

/// Window of `[ask, bid]` pairs.
pub type QuoteWindow = CleanlinessWindow<2>;

impl<const N: usize> CleanlinessWindow<N> {
    /// Create an empty window.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Get the number of observations.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the window is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the configured capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether enough observations are held to judge outliers.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &[f64; N]> {
        self.values.iter()
    }

    /// Per-field median of the window, `None` when empty.
    pub fn median(&self) -> Option<[f64; N]> {
        if self.values.is_empty() {
            return None;
        }
        let mut median = [0.0; N];
        for (field, slot) in median.iter_mut().enumerate() {
            let column: Vec<f64> = self.values.iter().map(|v| v[field]).collect();
            *slot = Data::new(column).median();
        }
        Some(median)
    }

    /// Test an observation and insert it if clean.
    ///
    /// While the window holds fewer than `capacity` observations everything
    /// is accepted. Once full, every field must satisfy
    /// `|value - median| / median < max_relative_deviation`; accepted values
    /// evict the oldest entry, rejected ones leave the window untouched.
    pub fn test_and_insert(&mut self, value: [f64; N], max_relative_deviation: f64) -> WindowVerdict<N> {
        if !self.is_full() {
            self.values.push_back(value);
            return WindowVerdict::Bootstrap;
        }

        let Some(median) = self.median() else {
            // capacity 0: nothing to compare against
            return WindowVerdict::Bootstrap;
        };

        let clean = value
            .iter()
            .zip(median.iter())
            .all(|(v, m)| relative_deviation(*v, *m) < max_relative_deviation);

        if clean {
            self.values.push_back(value);
            while self.values.len() > self.capacity {
                self.values.pop_front();
            }
            WindowVerdict::Accepted
        } else {
            WindowVerdict::Rejected { median }
        }
    }
}

/// `|value - median| / median`; NaN when the median is zero and the value is too.
fn relative_deviation(value: f64, median: f64) -> f64 {
    ((value - median) / median).abs()
}
