/// Shared synthetic fixtures for the integration tests.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikebin::{RegionLabels, SessionContext, SpikeSet};

#[allow(unused)]
/// One-hot `[n, n_components]` rows at `labels`.
pub fn one_hot(labels: &[i64], n_components: usize) -> Array2<f64> {
    let mut out = Array2::zeros((labels.len(), n_components));
    for (i, &l) in labels.iter().enumerate() {
        out[[i, l as usize]] = 1.0;
    }
    out
}

#[allow(unused)]
/// A session with `n_trials` onsets every 2 s and time-sorted spikes
/// scattered over the recording.  Channels cycle CA1 / DG / PO; cluster `c`
/// sits on channel `c % n_channels` and inherits its label.  Every spike
/// carries a one-hot component vector equal to its cluster.
pub fn synthetic_session(seed: u64, n_trials: usize, n_spikes: usize) -> (SessionContext, SpikeSet) {
    const N_CHANNELS: i64 = 6;
    const N_CLUSTERS: i64 = 9;
    let acronyms = ["CA1", "DG", "PO"];

    let onsets: Vec<f64> = (0..n_trials).map(|i| 1.0 + 2.0 * i as f64).collect();
    let duration = 2.0 * n_trials as f64 + 1.0;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut times: Vec<f64> = (0..n_spikes).map(|_| rng.gen_range(0.0..duration)).collect();
    times.sort_by(f64::total_cmp);
    let clusters: Vec<i64> = (0..n_spikes).map(|_| rng.gen_range(0..N_CLUSTERS)).collect();
    let channels: Vec<i64> = clusters.iter().map(|c| c % N_CHANNELS).collect();

    let labels = RegionLabels {
        channels: (0..N_CHANNELS).map(|c| acronyms[c as usize % 3].to_string()).collect(),
        clusters: (0..N_CLUSTERS)
            .map(|c| acronyms[(c % N_CHANNELS) as usize % 3].to_string())
            .collect(),
    };
    let mut ctx = SessionContext::new(onsets);
    ctx.labels = labels;

    let probs = one_hot(&clusters, N_CLUSTERS as usize);
    let spikes = SpikeSet::new(times, channels)
        .unwrap()
        .with_clusters(clusters.clone())
        .unwrap()
        .with_components(probs, Some(clusters))
        .unwrap();
    (ctx, spikes)
}
