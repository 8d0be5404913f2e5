//! # spikebin: trial-aligned spike tensors for neural decoding
//!
//! `spikebin` turns per-spike outputs of detection, localization and
//! (optionally) spike sorting into fixed-shape `[trial, unit, bin]` tensors
//! aligned to behavioral events, ready for a decoder.  The same session can
//! be featurized as **sorted** cluster counts, **thresholded** channel
//! counts, or **clusterless** Gaussian-mixture membership sums, with
//! identical windowing and binning so the representations stay comparable.
//!
//! ## Pipeline overview
//!
//! ```text
//! Artifacts (spike_index, localizations, spike_train, triage, GMM probs)
//!   │
//!   ├─ SpikeSet              row-aligned columns, sample → seconds
//!   ├─ filter::triage        lowPtpFilter, then idxKeep
//!   ├─ filter::region        acronym substring on channel / cluster labels
//!   ├─ filter::geometry      drop spikes localized off the probe
//!   ├─ identity space        unit ids (max+1 or dense) / GMM components
//!   ├─ epoch                 [onset − 0.5, onset + 1.0] s, relative to first spike
//!   ├─ binning               n_time_bins over [0, 1.5) s
//!   ├─ aggregate             counts or probability sums per (unit, bin)
//!   └─ assemble              stack trials
//!        │
//!        └─→ ActivityTensor [n_trials, n_units, n_time_bins]
//! ```
//!
//! ## Quick start
//!
//! ```
//! use spikebin::{featurize, PipelineConfig, SessionContext, SpikeRepresentation, SpikeSet};
//!
//! // Three trials, five spikes on two channels.
//! let ctx    = SessionContext::new(vec![1.0, 5.0, 10.0]);
//! let spikes = SpikeSet::new(vec![0.6, 1.2, 4.6, 9.8, 9.9], vec![0, 1, 1, 0, 0]).unwrap();
//!
//! let cfg = PipelineConfig { n_time_bins: 3, ..PipelineConfig::default() };
//! let out = featurize(&ctx, &spikes, None, SpikeRepresentation::Thresholded, &cfg).unwrap();
//!
//! assert_eq!(out.tensor.dim(), (3, 2, 3));
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use spikebin::binning::{OutOfRangePolicy, TimeBinner};
//! use spikebin::epoch::window_trials;
//!
//! let trials = window_trials(&[0.6, 1.2, 4.6], &[1.0, 5.0]);
//! let binner = TimeBinner::new(3, OutOfRangePolicy::Drop).unwrap();
//! assert_eq!(binner.bin_of(trials[0].relative_times[1]), Some(1));
//! ```

pub mod aggregate;
pub mod assemble;
pub mod behavior;
pub mod binning;
pub mod config;
pub mod epoch;
pub mod error;
pub mod filter;
pub mod io;
pub mod pipeline;
pub mod session;
pub mod spikes;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::PipelineConfig;

// data model
pub use session::{RegionLabels, SampleClock, SessionContext, SessionSource};
pub use spikes::{ComponentColumns, Localizations, SpikeRepresentation, SpikeSet};

// stages
pub use aggregate::{count_units, sum_components, ComponentSpace, UnitSpace};
pub use assemble::{stack_trials, ActivityTensor};
pub use binning::{OutOfRangePolicy, TimeBinner};
pub use epoch::{window_trial, window_trials, TrialSpikes, TrialWindow};
pub use filter::{FilterReport, ProbeGeometry, RegionFilter, RowSelector, SpikeFilter, TriageMasks};
pub use pipeline::{Featurized, Pipeline};

// errors
pub use error::{Notice, PrepError};

// behavior
pub use behavior::{BehaviorLayout, StaticBehaviors, StimulusEncoding};

// io
pub use io::{write_featurized, Artifacts, SessionFiles, StWriter};

/// Run the **full featurization pipeline** for one session and
/// representation.
///
/// Shorthand for [`Pipeline::new`] followed by [`Pipeline::run`].
///
/// # Arguments
///
/// * `ctx`            – Session context: onsets, active trials, labels, clock.
/// * `spikes`         – Raw (pre-triage) spike table for the probe.
/// * `triage`         – Triage masks; required when `cfg.triage` is set.
/// * `representation` – Sorted, thresholded or clusterless.
/// * `cfg`            – Pipeline configuration (see [`PipelineConfig`]).
///
/// # Returns
///
/// A [`Featurized`] whose tensor has shape
/// `[n_trials, n_units_or_components, cfg.n_time_bins]`.  Empty trial windows
/// and unmatched regions produce zero-filled rows / a zero-length unit axis,
/// reported in [`Featurized::notices`].
///
/// # Errors
///
/// Any fatal [`PrepError`]: misaligned columns, out-of-range triage or
/// active-trial indices, negative or out-of-axis unit ids, a missing column
/// the representation needs, or `n_time_bins == 0`.
pub fn featurize(
    ctx: &SessionContext,
    spikes: &SpikeSet,
    triage: Option<&TriageMasks>,
    representation: SpikeRepresentation,
    cfg: &PipelineConfig,
) -> error::Result<Featurized> {
    Pipeline::new(cfg.clone(), representation)?.run(ctx, spikes, triage)
}
