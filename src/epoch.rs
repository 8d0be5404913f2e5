//! Event-locked trial windowing.
//!
//! Each trial keeps the spikes in `[onset - 0.5, onset + 1.0]` s, inclusive
//! at both ends, and re-expresses their times relative to the earliest spike
//! it kept.  Trials are windowed independently against the whole spike
//! stream, so overlapping windows share spikes.

/// Seconds before the onset included in a trial.
pub const PRE_ONSET_S: f64 = 0.5;
/// Seconds after the onset included in a trial.
pub const POST_ONSET_S: f64 = 1.0;
/// Total trial length; the binning span.
pub const TRIAL_LENGTH_S: f64 = PRE_ONSET_S + POST_ONSET_S;

/// Absolute time bounds of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialWindow {
    pub start: f64,
    pub end: f64,
}

impl TrialWindow {
    pub fn around(onset: f64) -> Self {
        Self { start: onset - PRE_ONSET_S, end: onset + POST_ONSET_S }
    }

    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Spikes of one trial: row indices into the filtered set and their
/// trial-relative times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialSpikes {
    pub rows: Vec<usize>,
    pub relative_times: Vec<f64>,
}

impl TrialSpikes {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// An empty trial has no defined origin; it yields a zero tensor row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Window one trial.  `times` may be in any order; rows are returned in
/// the order they appear in `times`.
pub fn window_trial(times: &[f64], onset: f64) -> TrialSpikes {
    let window = TrialWindow::around(onset);
    let rows: Vec<usize> = times
        .iter()
        .enumerate()
        .filter_map(|(i, &t)| window.contains(t).then_some(i))
        .collect();
    relative_to_first(times, rows)
}

/// Window one trial of a time-sorted spike stream by binary search.
fn window_trial_sorted(times: &[f64], onset: f64) -> TrialSpikes {
    let window = TrialWindow::around(onset);
    let lo = times.partition_point(|&t| t < window.start);
    let hi = times.partition_point(|&t| t <= window.end);
    relative_to_first(times, (lo..hi.max(lo)).collect())
}

fn relative_to_first(times: &[f64], rows: Vec<usize>) -> TrialSpikes {
    let origin = rows.iter().map(|&r| times[r]).fold(f64::INFINITY, f64::min);
    let relative_times = rows.iter().map(|&r| times[r] - origin).collect();
    TrialSpikes { rows, relative_times }
}

/// Window every trial.  Output is indexed like `onsets`.
pub fn window_trials(times: &[f64], onsets: &[f64]) -> Vec<TrialSpikes> {
    let sorted = times.windows(2).all(|w| w[0] <= w[1]);
    onsets
        .iter()
        .map(|&onset| {
            if sorted {
                window_trial_sorted(times, onset)
            } else {
                window_trial(times, onset)
            }
        })
        .collect()
}
