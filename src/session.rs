//! Session-scoped context.
//!
//! Everything the transformation needs to know about one recording besides
//! the spikes themselves: trial onsets, the active-trial subset, anatomical
//! labels, the sample-to-time conversion and the probe geometry.  A
//! [`SessionContext`] is resolved once per probe by a [`SessionSource`] and
//! passed explicitly into the pipeline.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::filter::geometry::ProbeGeometry;

// ── Sample clock ──────────────────────────────────────────────────────────

/// Converts acquisition sample indices to seconds on the behavior clock.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleClock {
    /// `t = sample / rate + offset`.
    Linear { rate: f64, offset: f64 },
    /// Piecewise-linear map through sync pulses.  Outside the first/last
    /// pulse the outermost segment is extended.
    Sync { samples: Vec<f64>, times: Vec<f64> },
}

impl SampleClock {
    /// Linear clock starting at `t = 0`.
    pub fn linear(rate: f64) -> Self {
        SampleClock::Linear { rate, offset: 0.0 }
    }

    /// Sync-table clock.  Needs at least two pulses with strictly increasing
    /// sample indices.
    pub fn sync(samples: Vec<f64>, times: Vec<f64>) -> Result<Self> {
        if samples.len() != times.len() {
            return Err(PrepError::DataShapeMismatch {
                column: "sync_times",
                expected: samples.len(),
                got: times.len(),
            });
        }
        if samples.len() < 2 {
            return Err(PrepError::InvalidConfig(
                "sync clock needs at least two pulses".into(),
            ));
        }
        if samples.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PrepError::InvalidConfig(
                "sync samples must be strictly increasing".into(),
            ));
        }
        Ok(SampleClock::Sync { samples, times })
    }

    /// Convert one sample index.
    pub fn to_seconds(&self, sample: f64) -> f64 {
        match self {
            SampleClock::Linear { rate, offset } => sample / rate + offset,
            SampleClock::Sync { samples, times } => {
                // Segment [i-1, i], clamped so the ends extrapolate.
                let i = samples
                    .partition_point(|&s| s <= sample)
                    .clamp(1, samples.len() - 1);
                let (s0, s1) = (samples[i - 1], samples[i]);
                let (t0, t1) = (times[i - 1], times[i]);
                t0 + (sample - s0) * (t1 - t0) / (s1 - s0)
            }
        }
    }

    pub fn samples_to_times<I: IntoIterator<Item = f64>>(&self, samples: I) -> Vec<f64> {
        samples.into_iter().map(|s| self.to_seconds(s)).collect()
    }
}

// ── Region labels ─────────────────────────────────────────────────────────

/// Anatomical acronym per channel and per cluster (`regions.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionLabels {
    /// Acronym of channel `i`.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Acronym of cluster `i`.
    #[serde(default)]
    pub clusters: Vec<String>,
}

impl RegionLabels {
    /// Sorted ids of the channels whose acronym contains `needle`, ignoring case.
    pub fn matching_channels(&self, needle: &str) -> Vec<i64> {
        matching(&self.channels, needle)
    }

    /// Sorted ids of the clusters whose acronym contains `needle`, ignoring case.
    pub fn matching_clusters(&self, needle: &str) -> Vec<i64> {
        matching(&self.clusters, needle)
    }

    /// Number of channels per distinct acronym.
    pub fn available_regions(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for acronym in &self.channels {
            *out.entry(acronym.clone()).or_insert(0) += 1;
        }
        out
    }
}

fn matching(labels: &[String], needle: &str) -> Vec<i64> {
    let needle = needle.to_lowercase();
    labels
        .iter()
        .enumerate()
        .filter(|(_, acronym)| acronym.to_lowercase().contains(&needle))
        .map(|(i, _)| i as i64)
        .collect()
}

// ── Session context ───────────────────────────────────────────────────────

/// Resolved state of one probe/session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Behavioral event (stimulus onset) time per trial, seconds.
    pub onset_times: Vec<f64>,
    /// Ids of the trials kept for decoding, in output order.
    pub active_trials: Option<Vec<usize>>,
    pub labels: RegionLabels,
    pub clock: SampleClock,
    pub geometry: Option<ProbeGeometry>,
}

impl SessionContext {
    /// Context with onsets only: no active-trial subset, no labels,
    /// 30 kHz linear clock, no geometry.
    pub fn new(onset_times: Vec<f64>) -> Self {
        Self {
            onset_times,
            active_trials: None,
            labels: RegionLabels::default(),
            clock: SampleClock::linear(30_000.0),
            geometry: None,
        }
    }

    /// Onsets of the trials to featurize.
    ///
    /// With `keep_active` and an active-trial list, returns the onsets of
    /// those trials in list order; otherwise all onsets.
    pub fn trial_onsets(&self, keep_active: bool) -> Result<Vec<f64>> {
        match (&self.active_trials, keep_active) {
            (Some(ids), true) => ids
                .iter()
                .map(|&i| {
                    self.onset_times.get(i).copied().ok_or(PrepError::TrialIndexOutOfRange {
                        index: i,
                        n_trials: self.onset_times.len(),
                    })
                })
                .collect(),
            _ => Ok(self.onset_times.clone()),
        }
    }
}

/// The laboratory data-access layer: resolves a probe id to its session.
pub trait SessionSource {
    fn load_session(&self, probe_id: &str) -> anyhow::Result<SessionContext>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_clock_applies_offset() {
        let clock = SampleClock::Linear { rate: 30_000.0, offset: 2.0 };
        assert_abs_diff_eq!(clock.to_seconds(45_000.0), 3.5, epsilon = 1e-12);
    }

    #[test]
    fn sync_clock_interpolates_and_extrapolates() {
        let clock = SampleClock::sync(vec![0.0, 100.0, 300.0], vec![10.0, 11.0, 12.0]).unwrap();
        assert_abs_diff_eq!(clock.to_seconds(50.0), 10.5, epsilon = 1e-12);
        assert_abs_diff_eq!(clock.to_seconds(200.0), 11.5, epsilon = 1e-12);
        // Beyond the ends: outermost segment slope.
        assert_abs_diff_eq!(clock.to_seconds(-100.0), 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(clock.to_seconds(500.0), 13.0, epsilon = 1e-12);
    }

    #[test]
    fn sync_clock_rejects_non_monotonic_pulses() {
        assert!(SampleClock::sync(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(SampleClock::sync(vec![0.0], vec![1.0]).is_err());
    }

    #[test]
    fn region_match_is_case_insensitive_substring() {
        let labels = RegionLabels {
            channels: vec!["CA1".into(), "DG-mo".into(), "CA3".into(), "VISa5".into()],
            clusters: vec![],
        };
        assert_eq!(labels.matching_channels("ca"), vec![0, 2]);
        assert_eq!(labels.matching_channels("visa"), vec![3]);
        assert!(labels.matching_channels("xyz").is_empty());
    }

    #[test]
    fn active_trials_select_onsets_in_order() {
        let mut ctx = SessionContext::new(vec![1.0, 2.0, 3.0, 4.0]);
        ctx.active_trials = Some(vec![3, 1]);
        assert_eq!(ctx.trial_onsets(true).unwrap(), vec![4.0, 2.0]);
        assert_eq!(ctx.trial_onsets(false).unwrap().len(), 4);

        ctx.active_trials = Some(vec![9]);
        assert_eq!(
            ctx.trial_onsets(true).unwrap_err(),
            PrepError::TrialIndexOutOfRange { index: 9, n_trials: 4 }
        );
    }
}
