//! Triage mask application.
//!
//! Upstream triage produces two masks row-aligned with the *raw* spike set:
//! `lowPtpFilter` drops low-amplitude detections and `idxKeep` indexes into
//! what survives it.  `idxKeep` is therefore only meaningful after
//! `lowPtpFilter` has been applied, and the order here is fixed.
use crate::error::{PrepError, Result};
use crate::spikes::{Localizations, SpikeSet};

/// One triage stage: a boolean keep-mask or an explicit list of kept rows.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelector {
    Mask(Vec<bool>),
    Indices(Vec<usize>),
}

impl RowSelector {
    /// Resolve to kept row indices against a set of `n` rows.
    fn rows(&self, n: usize, name: &'static str) -> Result<Vec<usize>> {
        match self {
            RowSelector::Mask(mask) => {
                if mask.len() != n {
                    return Err(PrepError::DataShapeMismatch {
                        column: name,
                        expected: n,
                        got: mask.len(),
                    });
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect())
            }
            RowSelector::Indices(idx) => {
                if let Some(&bad) = idx.iter().find(|&&i| i >= n) {
                    return Err(PrepError::MaskIndexOutOfRange { mask: name, index: bad, len: n });
                }
                Ok(idx.clone())
            }
        }
    }
}

/// The ordered triage masks plus optional re-localized features for the
/// surviving spikes.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageMasks {
    pub low_ptp_filter: RowSelector,
    pub idx_keep: RowSelector,
    /// `(x, z, amplitude)` recomputed for the post-triage rows.
    pub relocalized: Option<Localizations>,
}

impl TriageMasks {
    pub fn new(low_ptp_filter: RowSelector, idx_keep: RowSelector) -> Self {
        Self { low_ptp_filter, idx_keep, relocalized: None }
    }

    /// Apply `lowPtpFilter`, then `idxKeep`, to every column of `spikes`.
    pub fn apply(&self, spikes: &SpikeSet) -> Result<SpikeSet> {
        let rows = self.low_ptp_filter.rows(spikes.len(), "low_ptp_filter")?;
        let stage1 = spikes.select(&rows);
        let rows = self.idx_keep.rows(stage1.len(), "idx_keep")?;
        let mut out = stage1.select(&rows);
        if let Some(loc) = &self.relocalized {
            out.replace_localizations(loc.clone())?;
        }
        Ok(out)
    }
}
