//! Per-trial activity aggregation.
//!
//! Two modes, fixed by data provenance:
//!
//! ```text
//! counts   [unit, bin]       h[u, b] += 1                  (sorted, thresholded)
//! weights  [component, bin]  w[k, b] += p(spike ∈ k)       (clusterless)
//! ```
//!
//! The unit / component axis is an identity space computed once over the
//! whole filtered spike set before any windowing, so that row `r` means the
//! same unit in every trial of a run.
use ndarray::Array2;

use crate::binning::TimeBinner;
use crate::epoch::TrialSpikes;
use crate::error::{PrepError, Result};
use crate::spikes::ComponentColumns;

// ── Identity spaces ───────────────────────────────────────────────────────

/// Largest unit id accepted in whole-session mode, where the id itself sizes
/// the unit axis.  Regional (dense) mode has no such limit.
pub const MAX_UNIT_ID: i64 = 1 << 20;

/// Row layout of the unit axis for counting modes.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitSpace {
    /// Row is the unit id itself; `n_units = max id + 1`.
    Direct { n_units: usize },
    /// Row is the rank of the id among the distinct retained ids.
    Dense { ids: Vec<i64> },
}

impl UnitSpace {
    /// Whole-session layout over `ids`.  Empty input gives zero units; ids
    /// above [`MAX_UNIT_ID`] are rejected.
    pub fn whole_session(ids: &[i64]) -> Result<Self> {
        reject_negative(ids)?;
        let n_units = match ids.iter().max() {
            None => 0,
            Some(&m) if m <= MAX_UNIT_ID => m as usize + 1,
            Some(&m) => {
                return Err(PrepError::InvalidUnitIdentity { id: m, axis_len: MAX_UNIT_ID as usize + 1 })
            }
        };
        Ok(UnitSpace::Direct { n_units })
    }

    /// Dense `0..k` renumbering of the distinct ids, in ascending id order.
    pub fn regional(ids: &[i64]) -> Result<Self> {
        reject_negative(ids)?;
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(UnitSpace::Dense { ids })
    }

    pub fn len(&self) -> usize {
        match self {
            UnitSpace::Direct { n_units } => *n_units,
            UnitSpace::Dense { ids } => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tensor row of a unit id.
    pub fn row_of(&self, id: i64) -> Result<usize> {
        let axis_len = self.len();
        let row = match self {
            UnitSpace::Direct { n_units } => (id >= 0 && (id as usize) < *n_units).then_some(id as usize),
            UnitSpace::Dense { ids } => ids.binary_search(&id).ok(),
        };
        row.ok_or(PrepError::InvalidUnitIdentity { id, axis_len })
    }

    /// Original id of every row.
    pub fn unit_ids(&self) -> Vec<i64> {
        match self {
            UnitSpace::Direct { n_units } => (0..*n_units as i64).collect(),
            UnitSpace::Dense { ids } => ids.clone(),
        }
    }
}

fn reject_negative(ids: &[i64]) -> Result<()> {
    match ids.iter().find(|&&id| id < 0) {
        Some(&id) => Err(PrepError::InvalidUnitIdentity { id, axis_len: 0 }),
        None => Ok(()),
    }
}

/// Probability columns that make up the component axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpace {
    columns: Vec<usize>,
}

impl ComponentSpace {
    /// Distinct hard labels (ascending) when present, otherwise every
    /// probability column.  A spike set with no rows observes no components.
    pub fn from_columns(comp: &ComponentColumns) -> Result<Self> {
        let n_cols = comp.probs.ncols();
        if comp.probs.nrows() == 0 {
            return Ok(Self { columns: vec![] });
        }
        let Some(labels) = &comp.labels else {
            return Ok(Self { columns: (0..n_cols).collect() });
        };
        let mut columns = Vec::with_capacity(n_cols);
        for &label in labels {
            if label < 0 || label as usize >= n_cols {
                return Err(PrepError::InvalidUnitIdentity { id: label, axis_len: n_cols });
            }
            columns.push(label as usize);
        }
        columns.sort_unstable();
        columns.dedup();
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn component_ids(&self) -> Vec<i64> {
        self.columns.iter().map(|&c| c as i64).collect()
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────

/// Exact spike counts `[unit, bin]` for one trial.
///
/// `unit_ids` is the unit column of the filtered spike set the trial rows
/// index into.
pub fn count_units(
    trial: &TrialSpikes,
    unit_ids: &[i64],
    space: &UnitSpace,
    binner: &TimeBinner,
) -> Result<Array2<u32>> {
    let mut counts = Array2::<u32>::zeros((space.len(), binner.n_bins()));
    for (&row, &t) in trial.rows.iter().zip(&trial.relative_times) {
        let unit = space.row_of(unit_ids[row])?;
        if let Some(bin) = binner.bin_of(t) {
            counts[[unit, bin]] += 1;
        }
    }
    Ok(counts)
}

/// Expected spike count per mixture component `[component, bin]` for one
/// trial: the sum of the membership probabilities of the spikes in each bin.
pub fn sum_components(
    trial: &TrialSpikes,
    probs: &Array2<f64>,
    space: &ComponentSpace,
    binner: &TimeBinner,
) -> Result<Array2<f64>> {
    if let Some(&bad) = space.columns().iter().find(|&&c| c >= probs.ncols()) {
        return Err(PrepError::InvalidUnitIdentity { id: bad as i64, axis_len: probs.ncols() });
    }
    let mut weights = Array2::<f64>::zeros((space.len(), binner.n_bins()));
    for (&row, &t) in trial.rows.iter().zip(&trial.relative_times) {
        let Some(bin) = binner.bin_of(t) else { continue };
        for (k, &col) in space.columns().iter().enumerate() {
            weights[[k, bin]] += probs[[row, col]];
        }
    }
    Ok(weights)
}
