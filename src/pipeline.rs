//! The staged spike → tensor pipeline.
//!
//! ```text
//! SpikeSet ─ SpikeFilter ─ identity space ─┬─ window ─ bin ─ aggregate ─┐
//!                                          ├─ window ─ bin ─ aggregate ─┼─ stack ─ ActivityTensor
//!                                          └─ …      (one per trial)    ─┘
//! ```
//!
//! The identity space (unit or component axis) is computed once over the
//! filtered, un-windowed spikes.  Trials are then independent and run on the
//! rayon pool; each worker reads the shared spike set and writes its own
//! `[unit, bin]` array.
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::{count_units, sum_components, ComponentSpace, UnitSpace};
use crate::assemble::{stack_trials, ActivityTensor};
use crate::binning::TimeBinner;
use crate::config::PipelineConfig;
use crate::epoch::{window_trials, TrialSpikes};
use crate::error::{Notice, PrepError, Result};
use crate::filter::{FilterReport, SpikeFilter, TriageMasks};
use crate::session::SessionContext;
use crate::spikes::{SpikeRepresentation, SpikeSet};

/// Output of one (session, region, representation) run.
#[derive(Debug, Clone)]
pub struct Featurized {
    /// `[n_trials, n_units_or_components, n_time_bins]`.
    pub tensor: ActivityTensor,
    /// Original cluster / channel / component id of each unit row.
    pub unit_ids: Vec<i64>,
    /// Onset of each trial row.
    pub onset_times: Vec<f64>,
    /// Spikes inside each trial window, before out-of-range binning.
    pub window_counts: Vec<usize>,
    pub report: FilterReport,
    pub notices: Vec<Notice>,
}

/// A configured pipeline for one spike representation.
#[derive(Debug, Clone)]
pub struct Pipeline {
    cfg: PipelineConfig,
    representation: SpikeRepresentation,
    binner: TimeBinner,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig, representation: SpikeRepresentation) -> Result<Self> {
        let binner = TimeBinner::new(cfg.n_time_bins, cfg.out_of_range)?;
        Ok(Self { cfg, representation, binner })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn representation(&self) -> SpikeRepresentation {
        self.representation
    }

    /// Filter, window, bin and aggregate one session.
    ///
    /// `triage` is required when the config enables triage and ignored
    /// otherwise.
    pub fn run(
        &self,
        ctx: &SessionContext,
        spikes: &SpikeSet,
        triage: Option<&TriageMasks>,
    ) -> Result<Featurized> {
        let onset_times = ctx.trial_onsets(self.cfg.keep_active_trials)?;
        debug!(n_trials = onset_times.len(), "resolved trial onsets");

        let triage = if self.cfg.triage {
            Some(triage.ok_or(PrepError::MissingColumn("triage masks"))?)
        } else {
            None
        };
        let filter = SpikeFilter {
            triage,
            region: &self.cfg.region,
            representation: self.representation,
            geometry: ctx.geometry.as_ref().map(|g| (g, self.cfg.geometry_margin_um)),
        };
        let (filtered, report) = filter.apply(spikes, &ctx.labels)?;

        let mut notices = Vec::new();
        if report.region_matches == Some(0) {
            warn!("region {} matched no labels; output has zero units", self.cfg.region);
            notices.push(Notice::RegionNotFound { region: self.cfg.region.to_string() });
        }

        let trials = window_trials(filtered.times(), &onset_times);
        let empty: Vec<usize> = trials
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.is_empty().then_some(i))
            .collect();
        if !empty.is_empty() {
            warn!("{} of {} trial windows hold no spikes", empty.len(), trials.len());
        }
        notices.extend(empty.into_iter().map(|trial| Notice::EmptyTrialWindow { trial }));

        let (tensor, unit_ids) = match self.representation {
            SpikeRepresentation::Sorted => {
                let ids = filtered.clusters().ok_or(PrepError::MissingColumn("clusters"))?;
                self.counts(&trials, ids)?
            }
            SpikeRepresentation::Thresholded => self.counts(&trials, filtered.channels())?,
            SpikeRepresentation::Clusterless => self.weights(&trials, &filtered)?,
        };

        let (n_trials, n_units, n_bins) = tensor.dim();
        info!(
            "{} tensor [{n_trials}, {n_units}, {n_bins}] from {} spikes",
            self.representation.name(),
            filtered.len()
        );

        Ok(Featurized {
            tensor,
            unit_ids,
            onset_times,
            window_counts: trials.iter().map(TrialSpikes::len).collect(),
            report,
            notices,
        })
    }

    fn counts(&self, trials: &[TrialSpikes], ids: &[i64]) -> Result<(ActivityTensor, Vec<i64>)> {
        let space = if self.cfg.regional {
            UnitSpace::regional(ids)?
        } else {
            UnitSpace::whole_session(ids)?
        };
        let per_trial: Vec<Array2<u32>> = trials
            .par_iter()
            .map(|trial| count_units(trial, ids, &space, &self.binner))
            .collect::<Result<_>>()?;
        let tensor = stack_trials(&per_trial, space.len(), self.binner.n_bins())?;
        Ok((ActivityTensor::Counts(tensor), space.unit_ids()))
    }

    fn weights(&self, trials: &[TrialSpikes], filtered: &SpikeSet) -> Result<(ActivityTensor, Vec<i64>)> {
        let comp = filtered
            .components()
            .ok_or(PrepError::MissingColumn("component_probs"))?;
        let space = ComponentSpace::from_columns(comp)?;
        let per_trial: Vec<Array2<f64>> = trials
            .par_iter()
            .map(|trial| sum_components(trial, &comp.probs, &space, &self.binner))
            .collect::<Result<_>>()?;
        let tensor = stack_trials(&per_trial, space.len(), self.binner.n_bins())?;
        Ok((ActivityTensor::Weights(tensor), space.component_ids()))
    }
}
