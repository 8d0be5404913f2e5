//! Trial-relative time binning.
//!
//! Bin `k` covers `[edges[k], edges[k + 1])` with `edges[k] = k * width` and
//! `width = 1.5 / n_time_bins`; the last bin ends at 1.5 s.  A time sitting
//! exactly on an edge belongs to the bin that edge opens.
use crate::epoch::TRIAL_LENGTH_S;
use crate::error::{PrepError, Result};

/// Treatment of trial-relative times outside `[0, 1.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfRangePolicy {
    /// Discard the spike.
    #[default]
    Drop,
    /// Assign to the first or last bin, whichever is nearer.
    Clamp,
}

/// Equal-width binning of the trial window.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBinner {
    edges: Vec<f64>,
    policy: OutOfRangePolicy,
}

impl TimeBinner {
    pub fn new(n_time_bins: usize, policy: OutOfRangePolicy) -> Result<Self> {
        if n_time_bins == 0 {
            return Err(PrepError::InvalidConfig("n_time_bins must be at least 1".into()));
        }
        let width = TRIAL_LENGTH_S / n_time_bins as f64;
        let edges = (0..n_time_bins).map(|k| k as f64 * width).collect();
        Ok(Self { edges, policy })
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.edges.len()
    }

    /// Lower edge of every bin.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin of a trial-relative time, or `None` if the policy drops it.
    pub fn bin_of(&self, t: f64) -> Option<usize> {
        if t.is_nan() {
            return None;
        }
        if (0.0..TRIAL_LENGTH_S).contains(&t) {
            // Number of lower edges <= t, minus one.  Never 0 since edges[0] = 0 <= t.
            return Some(self.edges.partition_point(|&e| e <= t) - 1);
        }
        match self.policy {
            OutOfRangePolicy::Drop => None,
            OutOfRangePolicy::Clamp if t < 0.0 => Some(0),
            OutOfRangePolicy::Clamp => Some(self.n_bins() - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bins_rejected() {
        assert!(TimeBinner::new(0, OutOfRangePolicy::Drop).is_err());
    }

    #[test]
    fn edges_are_lower_closed() {
        let b = TimeBinner::new(3, OutOfRangePolicy::Drop).unwrap();
        assert_eq!(b.edges(), &[0.0, 0.5, 1.0]);
        assert_eq!(b.bin_of(0.0), Some(0));
        assert_eq!(b.bin_of(0.4999), Some(0));
        assert_eq!(b.bin_of(0.5), Some(1));
        assert_eq!(b.bin_of(1.0), Some(2));
        assert_eq!(b.bin_of(1.4999), Some(2));
    }

    #[test]
    fn out_of_range_policy() {
        let drop = TimeBinner::new(30, OutOfRangePolicy::Drop).unwrap();
        assert_eq!(drop.bin_of(1.5), None);
        assert_eq!(drop.bin_of(-0.01), None);
        assert_eq!(drop.bin_of(f64::NAN), None);

        let clamp = TimeBinner::new(30, OutOfRangePolicy::Clamp).unwrap();
        assert_eq!(clamp.bin_of(1.5), Some(29));
        assert_eq!(clamp.bin_of(-0.01), Some(0));
    }

    #[test]
    fn every_default_edge_maps_to_its_own_bin() {
        let b = TimeBinner::new(30, OutOfRangePolicy::Drop).unwrap();
        for (k, &e) in b.edges().iter().enumerate() {
            assert_eq!(b.bin_of(e), Some(k));
        }
    }
}
