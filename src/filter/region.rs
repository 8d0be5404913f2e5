//! Anatomical region restriction.
use std::collections::HashSet;
use std::fmt;

use crate::error::{PrepError, Result};
use crate::session::RegionLabels;
use crate::spikes::{SpikeRepresentation, SpikeSet};

/// Region of interest for a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegionFilter {
    /// No restriction.
    #[default]
    All,
    /// Keep spikes whose acronym contains this substring, ignoring case.
    BySubstring(String),
}

impl RegionFilter {
    /// `"all"` (any case) is the pass-through sentinel; anything else is a
    /// substring filter.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            RegionFilter::All
        } else {
            RegionFilter::BySubstring(s.to_string())
        }
    }
}

impl fmt::Display for RegionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionFilter::All => f.write_str("all"),
            RegionFilter::BySubstring(s) => f.write_str(s),
        }
    }
}

/// Restrict `spikes` to the region.  Returns the retained set and, for a
/// substring filter, the number of channels/clusters whose label matched.
///
/// Sorted spikes are matched through their cluster label; thresholded and
/// clusterless spikes through their detection channel.  Time order is kept.
pub fn filter_region(
    spikes: &SpikeSet,
    region: &RegionFilter,
    labels: &RegionLabels,
    representation: SpikeRepresentation,
) -> Result<(SpikeSet, Option<usize>)> {
    let needle = match region {
        RegionFilter::All => return Ok((spikes.clone(), None)),
        RegionFilter::BySubstring(s) => s,
    };

    let (ids, matched) = if representation.filters_by_cluster() {
        let clusters = spikes.clusters().ok_or(PrepError::MissingColumn("clusters"))?;
        (clusters, labels.matching_clusters(needle))
    } else {
        (spikes.channels(), labels.matching_channels(needle))
    };

    let keep: HashSet<i64> = matched.iter().copied().collect();
    let mask: Vec<bool> = ids.iter().map(|id| keep.contains(id)).collect();
    Ok((spikes.select_mask(&mask)?, Some(matched.len())))
}
