//! Row-aligned spike table.
//!
//! Every per-spike column (time, channel, localization, cluster id,
//! component probabilities) lives in one [`SpikeSet`].  The constructor checks
//! that all columns share the row count of `times`, and every row selection
//! goes through [`SpikeSet::select`] so the columns can never drift apart.
use ndarray::{Array2, ArrayView2};

use crate::error::{PrepError, Result};
use crate::session::SampleClock;

/// Which identity a spike contributes to the output tensor.
///
/// Chosen once from data provenance when a pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeRepresentation {
    /// Hard cluster identity from spike sorting; counts per cluster.
    Sorted,
    /// Detection channel as a multi-unit identity; counts per channel.
    Thresholded,
    /// Soft mixture membership; probability sums per component.
    Clusterless,
}

impl SpikeRepresentation {
    pub fn name(self) -> &'static str {
        match self {
            SpikeRepresentation::Sorted => "sorted",
            SpikeRepresentation::Thresholded => "thresholded",
            SpikeRepresentation::Clusterless => "clusterless",
        }
    }

    /// Region filtering works on cluster labels for sorted spikes and on
    /// channel labels otherwise.
    pub fn filters_by_cluster(self) -> bool {
        self == SpikeRepresentation::Sorted
    }
}

/// Localization columns of the unsorted spike record.
#[derive(Debug, Clone, PartialEq)]
pub struct Localizations {
    pub x: Vec<f64>,
    pub z: Vec<f64>,
    /// Peak-to-peak amplitude.
    pub amplitude: Vec<f64>,
}

impl Localizations {
    /// Split an `[n, 3]` array of `(x, z, amplitude)` rows into columns.
    pub fn from_rows(rows: ArrayView2<f64>) -> Result<Self> {
        if rows.ncols() != 3 {
            return Err(PrepError::DataShapeMismatch {
                column: "localizations (columns)",
                expected: 3,
                got: rows.ncols(),
            });
        }
        Ok(Self {
            x: rows.column(0).to_vec(),
            z: rows.column(1).to_vec(),
            amplitude: rows.column(2).to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn select(&self, rows: &[usize]) -> Self {
        Self {
            x: pick(&self.x, rows),
            z: pick(&self.z, rows),
            amplitude: pick(&self.amplitude, rows),
        }
    }
}

/// Soft mixture membership per spike.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentColumns {
    /// `[n_spikes, n_components]` membership probabilities.
    pub probs: Array2<f64>,
    /// Hard (argmax) component label per spike, when the mixture fit kept it.
    pub labels: Option<Vec<i64>>,
}

/// A filtered-or-raw set of spikes with all parallel columns row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeSet {
    times: Vec<f64>,
    channels: Vec<i64>,
    localizations: Option<Localizations>,
    clusters: Option<Vec<i64>>,
    components: Option<ComponentColumns>,
}

impl SpikeSet {
    /// Build a spike set from spike times and detection channels.
    pub fn new(times: Vec<f64>, channels: Vec<i64>) -> Result<Self> {
        check_len("channels", times.len(), channels.len())?;
        Ok(Self {
            times,
            channels,
            localizations: None,
            clusters: None,
            components: None,
        })
    }

    /// Build from the upstream `[n, 2]` spike index (sample, channel) and
    /// `[n, 3]` localization results, converting samples to seconds with `clock`.
    pub fn from_spike_index(
        spike_index: ArrayView2<f64>,
        localizations: ArrayView2<f64>,
        clock: &SampleClock,
    ) -> Result<Self> {
        if spike_index.ncols() != 2 {
            return Err(PrepError::DataShapeMismatch {
                column: "spike_index (columns)",
                expected: 2,
                got: spike_index.ncols(),
            });
        }
        let times = clock.samples_to_times(spike_index.column(0).iter().copied());
        let channels = ids_from_f64("spike_index (channel)", spike_index.column(1).iter().copied())?;
        Self::new(times, channels)?.with_localizations(Localizations::from_rows(localizations)?)
    }

    pub fn with_localizations(mut self, loc: Localizations) -> Result<Self> {
        check_len("localizations", self.len(), loc.len())?;
        self.localizations = Some(loc);
        Ok(self)
    }

    pub fn with_clusters(mut self, clusters: Vec<i64>) -> Result<Self> {
        check_len("clusters", self.len(), clusters.len())?;
        self.clusters = Some(clusters);
        Ok(self)
    }

    /// Attach cluster ids from an upstream `[n, 2]` sorted spike train
    /// (sample, cluster).  Only the cluster column is used; times come from
    /// the spike index the train is aligned to.
    pub fn with_spike_train(self, spike_train: ArrayView2<f64>) -> Result<Self> {
        if spike_train.ncols() != 2 {
            return Err(PrepError::DataShapeMismatch {
                column: "spike_train (columns)",
                expected: 2,
                got: spike_train.ncols(),
            });
        }
        let clusters = ids_from_f64("spike_train (cluster)", spike_train.column(1).iter().copied())?;
        self.with_clusters(clusters)
    }

    pub fn with_components(mut self, probs: Array2<f64>, labels: Option<Vec<i64>>) -> Result<Self> {
        check_len("component_probs", self.len(), probs.nrows())?;
        if let Some(l) = &labels {
            check_len("component_labels", self.len(), l.len())?;
        }
        self.components = Some(ComponentColumns { probs, labels });
        Ok(self)
    }

    /// Replace the localization columns; used when triage re-localizes the
    /// surviving spikes.
    pub fn replace_localizations(&mut self, loc: Localizations) -> Result<()> {
        check_len("localizations", self.len(), loc.len())?;
        self.localizations = Some(loc);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn channels(&self) -> &[i64] {
        &self.channels
    }

    pub fn localizations(&self) -> Option<&Localizations> {
        self.localizations.as_ref()
    }

    pub fn clusters(&self) -> Option<&[i64]> {
        self.clusters.as_deref()
    }

    pub fn components(&self) -> Option<&ComponentColumns> {
        self.components.as_ref()
    }

    /// Keep the given rows, in the given order, from every column.
    ///
    /// Callers guarantee `rows` are in range; filter stages validate user
    /// supplied indices before calling this.
    pub fn select(&self, rows: &[usize]) -> Self {
        Self {
            times: pick(&self.times, rows),
            channels: pick(&self.channels, rows),
            localizations: self.localizations.as_ref().map(|l| l.select(rows)),
            clusters: self.clusters.as_ref().map(|c| pick(c, rows)),
            components: self.components.as_ref().map(|c| ComponentColumns {
                probs: pick_rows(&c.probs, rows),
                labels: c.labels.as_ref().map(|l| pick(l, rows)),
            }),
        }
    }

    /// Keep the rows for which `mask` is true.
    pub fn select_mask(&self, mask: &[bool]) -> Result<Self> {
        check_len("mask", self.len(), mask.len())?;
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        Ok(self.select(&rows))
    }
}

fn check_len(column: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(PrepError::DataShapeMismatch { column, expected, got });
    }
    Ok(())
}

/// Integer ids from an upstream float column.  NaN, infinities, fractions
/// and values outside `i64` are rejected rather than truncated.
pub(crate) fn ids_from_f64(column: &'static str, values: impl IntoIterator<Item = f64>) -> Result<Vec<i64>> {
    values
        .into_iter()
        .map(|v| {
            // i64::MAX as f64 rounds up to 2^63, hence the strict bound.
            if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(PrepError::NonIntegralId { column, value: v })
            }
        })
        .collect()
}

fn pick<T: Copy>(src: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&r| src[r]).collect()
}

fn pick_rows(src: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), src.ncols()), |(i, k)| src[[rows[i], k]])
}
