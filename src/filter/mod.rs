//! Spike filtering: triage, region and probe-geometry restriction.
//!
//! - [`triage`]: ordered `lowPtpFilter` → `idxKeep` masks.
//! - [`region`]: case-insensitive acronym substring match on channel or
//!   cluster labels.
//! - [`geometry`]: drop spikes localized outside the probe extent.
//!
//! [`SpikeFilter`] chains the three in that order.  Triage must come first:
//! its masks are row-aligned with the raw detections.

pub mod geometry;
pub mod region;
pub mod triage;

pub use geometry::ProbeGeometry;
pub use region::{filter_region, RegionFilter};
pub use triage::{RowSelector, TriageMasks};

use tracing::{debug, info};

use crate::error::Result;
use crate::session::RegionLabels;
use crate::spikes::{SpikeRepresentation, SpikeSet};

/// Row counts through the filter stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub n_input: usize,
    pub n_after_triage: usize,
    pub n_after_region: usize,
    pub n_after_geometry: usize,
    /// Channels or clusters whose label matched the region; `None` for
    /// [`RegionFilter::All`].
    pub region_matches: Option<usize>,
}

/// One configured filtering pass.
#[derive(Debug, Clone, Copy)]
pub struct SpikeFilter<'a> {
    pub triage: Option<&'a TriageMasks>,
    pub region: &'a RegionFilter,
    pub representation: SpikeRepresentation,
    /// Probe geometry and margin (µm).
    pub geometry: Option<(&'a ProbeGeometry, f64)>,
}

impl<'a> SpikeFilter<'a> {
    /// Region-only filter.
    pub fn new(region: &'a RegionFilter, representation: SpikeRepresentation) -> Self {
        Self { triage: None, region, representation, geometry: None }
    }

    pub fn apply(&self, spikes: &SpikeSet, labels: &RegionLabels) -> Result<(SpikeSet, FilterReport)> {
        let mut report = FilterReport { n_input: spikes.len(), ..FilterReport::default() };

        let triaged = match self.triage {
            Some(masks) => masks.apply(spikes)?,
            None => spikes.clone(),
        };
        report.n_after_triage = triaged.len();
        debug!(before = report.n_input, after = report.n_after_triage, "triage");

        let (regional, matches) = filter_region(&triaged, self.region, labels, self.representation)?;
        report.n_after_region = regional.len();
        report.region_matches = matches;
        if let Some(n) = matches {
            let what = if self.representation.filters_by_cluster() { "clusters" } else { "channels" };
            info!("found {n} {what} in region {}", self.region);
        }

        let bounded = match self.geometry {
            Some((geom, margin)) => geom.filter(&regional, margin)?,
            None => regional,
        };
        report.n_after_geometry = bounded.len();
        debug!(before = report.n_after_region, after = report.n_after_geometry, "geometry");

        Ok((bounded, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn region_all_without_triage_is_identity() {
        let set = SpikeSet::new(vec![0.3, 0.1, 0.2], vec![2, 0, 1]).unwrap();
        let all = RegionFilter::All;
        let (out, report) = SpikeFilter::new(&all, SpikeRepresentation::Clusterless)
            .apply(&set, &RegionLabels::default())
            .unwrap();
        assert_eq!(out, set);
        assert_eq!(report.region_matches, None);
        assert_eq!(report.n_after_geometry, 3);
    }

    #[test]
    fn stages_run_in_order() {
        let set = SpikeSet::new(vec![0.0, 1.0, 2.0, 3.0], vec![0, 1, 0, 1])
            .unwrap()
            .with_localizations(crate::spikes::Localizations {
                x: vec![0.0, 0.0, 0.0, 500.0],
                z: vec![0.0; 4],
                amplitude: vec![1.0; 4],
            })
            .unwrap();
        let masks = TriageMasks::new(
            RowSelector::Mask(vec![true, true, false, true]),
            RowSelector::Indices(vec![0, 1, 2]),
        );
        let labels = RegionLabels { channels: vec!["CA1".into(), "PO".into()], clusters: vec![] };
        let region = RegionFilter::parse("po");
        let geom = ProbeGeometry::new(array![[0.0, 0.0], [32.0, 40.0]]).unwrap();
        let filter = SpikeFilter {
            triage: Some(&masks),
            region: &region,
            representation: SpikeRepresentation::Thresholded,
            geometry: Some((&geom, 100.0)),
        };
        let (out, report) = filter.apply(&set, &labels).unwrap();
        assert_eq!(out.times(), &[1.0]);
        assert_eq!(
            report,
            FilterReport {
                n_input: 4,
                n_after_triage: 3,
                n_after_region: 2,
                n_after_geometry: 1,
                region_matches: Some(1),
            }
        );
    }
}
