//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the spike-to-tensor
//! transformation.  All fields have defaults that match the settings used by
//! the decoding experiments.

use crate::binning::OutOfRangePolicy;
use crate::filter::RegionFilter;

/// Configuration for the full featurization pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use spikebin::{PipelineConfig, RegionFilter};
///
/// let cfg = PipelineConfig {
///     n_time_bins: 15,
///     region:      RegionFilter::parse("ca1"),
///     regional:    true,
///     ..PipelineConfig::default()
/// };
/// assert_eq!(cfg.bin_width(), 0.1);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of equal-width bins the 1.5 s trial window is split into.
    ///
    /// Default: `30` (50 ms bins).
    pub n_time_bins: usize,

    /// Anatomical region restriction.
    ///
    /// [`RegionFilter::All`] passes every spike through; a substring filter
    /// keeps spikes whose channel (clusterless, thresholded) or cluster
    /// (sorted) acronym contains the substring, ignoring case.
    ///
    /// Default: [`RegionFilter::All`].
    pub region: RegionFilter,

    /// Restrict onsets to the session's active-trial subset.
    ///
    /// Ignored when the session carries no active-trial list.
    ///
    /// Default: `true`.
    pub keep_active_trials: bool,

    /// Apply the triage masks (`lowPtpFilter` then `idxKeep`) before any
    /// other filtering.
    ///
    /// Default: `false`.
    pub triage: bool,

    /// Renumber retained sorted/thresholded units densely (`0..k`) instead
    /// of sizing the unit axis by the largest id.
    ///
    /// Default: `false`.
    pub regional: bool,

    /// What to do with trial-relative times outside `[0, 1.5)`.
    ///
    /// Default: [`OutOfRangePolicy::Drop`].
    pub out_of_range: OutOfRangePolicy,

    /// Margin in micrometres around the probe extent beyond which localized
    /// spikes are discarded.  Only applied when the session has a probe
    /// geometry.
    ///
    /// Default: `100.0` µm.
    pub geometry_margin_um: f64,
}

impl Default for PipelineConfig {
    /// 30 bins · all regions · active trials · no triage · no renumbering.
    fn default() -> Self {
        Self {
            n_time_bins: 30,
            region: RegionFilter::All,
            keep_active_trials: true,
            triage: false,
            regional: false,
            out_of_range: OutOfRangePolicy::Drop,
            geometry_margin_um: 100.0,
        }
    }
}

impl PipelineConfig {
    /// Width of one time bin in seconds, `1.5 / n_time_bins`.
    ///
    /// ```
    /// use spikebin::PipelineConfig;
    /// assert_eq!(PipelineConfig::default().bin_width(), 0.05);
    /// ```
    pub fn bin_width(&self) -> f64 {
        crate::epoch::TRIAL_LENGTH_S / self.n_time_bins as f64
    }
}
