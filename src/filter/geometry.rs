//! Probe-extent bounds on localized spikes.
//!
//! Localization occasionally places a spike far outside the probe.  Spikes
//! whose `x` or `z` fall outside the channel extent widened by a margin are
//! discarded (strict inequality on both sides).
use ndarray::Array2;

use crate::error::{PrepError, Result};
use crate::spikes::SpikeSet;

/// Channel positions of the probe, `[n_channels, 2]` as `(x, z)` in µm.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeGeometry {
    channel_xz: Array2<f64>,
}

impl ProbeGeometry {
    pub fn new(channel_xz: Array2<f64>) -> Result<Self> {
        if channel_xz.ncols() != 2 {
            return Err(PrepError::DataShapeMismatch {
                column: "geometry (columns)",
                expected: 2,
                got: channel_xz.ncols(),
            });
        }
        Ok(Self { channel_xz })
    }

    pub fn n_channels(&self) -> usize {
        self.channel_xz.nrows()
    }

    /// `(x_min, x_max, z_min, z_max)` of the channel layout.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let fold = |col: usize| {
            self.channel_xz
                .column(col)
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
        };
        let (x0, x1) = fold(0);
        let (z0, z1) = fold(1);
        (x0, x1, z0, z1)
    }

    /// Rows of `spikes` that lie within the extent widened by `margin`.
    /// Spikes without localizations are passed through unchanged.
    pub fn filter(&self, spikes: &SpikeSet, margin: f64) -> Result<SpikeSet> {
        let Some(loc) = spikes.localizations() else {
            return Ok(spikes.clone());
        };
        let (x0, x1, z0, z1) = self.extent();
        let mask: Vec<bool> = loc
            .x
            .iter()
            .zip(&loc.z)
            .map(|(&x, &z)| {
                x > x0 - margin && x < x1 + margin && z > z0 - margin && z < z1 + margin
            })
            .collect();
        spikes.select_mask(&mask)
    }
}
