//! Stacking per-trial arrays into the `[trial, unit, bin]` output tensor.
use ndarray::{Array2, Array3, Axis};

use crate::error::{PrepError, Result};

/// Stack `[unit, bin]` trial arrays into `[trial, unit, bin]`.
///
/// Every trial must have shape `(n_units, n_bins)`; the explicit shape keeps
/// a zero-trial run well-typed (`[0, n_units, n_bins]`).
pub fn stack_trials<T: Clone + Default>(
    trials: &[Array2<T>],
    n_units: usize,
    n_bins: usize,
) -> Result<Array3<T>> {
    let mut out = Array3::<T>::from_elem((trials.len(), n_units, n_bins), T::default());
    for (i, (trial, mut slot)) in trials.iter().zip(out.axis_iter_mut(Axis(0))).enumerate() {
        if trial.dim() != (n_units, n_bins) {
            return Err(PrepError::ShapeMismatch {
                trial: i,
                expected: (n_units, n_bins),
                got: trial.dim(),
            });
        }
        slot.assign(trial);
    }
    Ok(out)
}

/// Terminal artifact handed to the decoding stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityTensor {
    /// Exact spike counts (sorted, thresholded).
    Counts(Array3<u32>),
    /// Summed component probabilities (clusterless).
    Weights(Array3<f64>),
}

impl ActivityTensor {
    /// `(n_trials, n_units_or_components, n_time_bins)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            ActivityTensor::Counts(a) => a.dim(),
            ActivityTensor::Weights(a) => a.dim(),
        }
    }

    pub fn n_units(&self) -> usize {
        self.dim().1
    }

    /// Widen to `f64` for comparison across representations.
    pub fn to_f64(&self) -> Array3<f64> {
        match self {
            ActivityTensor::Counts(a) => a.mapv(f64::from),
            ActivityTensor::Weights(a) => a.clone(),
        }
    }

    pub fn as_counts(&self) -> Option<&Array3<u32>> {
        match self {
            ActivityTensor::Counts(a) => Some(a),
            ActivityTensor::Weights(_) => None,
        }
    }

    pub fn as_weights(&self) -> Option<&Array3<f64>> {
        match self {
            ActivityTensor::Weights(a) => Some(a),
            ActivityTensor::Counts(_) => None,
        }
    }
}
