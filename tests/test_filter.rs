mod common;
use common::synthetic_session;
use ndarray::array;
use spikebin::{
    featurize, Localizations, PipelineConfig, ProbeGeometry, RegionFilter, RowSelector, SessionContext,
    SpikeFilter, SpikeRepresentation, SpikeSet, TriageMasks,
};

fn localized(times: Vec<f64>, x: Vec<f64>) -> SpikeSet {
    let n = times.len();
    SpikeSet::new(times, vec![0; n])
        .unwrap()
        .with_localizations(Localizations { x, z: vec![10.0; n], amplitude: vec![8.0; n] })
        .unwrap()
}

#[test]
fn stages_report_row_counts() {
    let (ctx, spikes) = synthetic_session(1, 4, 300);
    let region = RegionFilter::parse("DG");
    let filter = SpikeFilter::new(&region, SpikeRepresentation::Thresholded);
    let (out, report) = filter.apply(&spikes, &ctx.labels).unwrap();

    assert_eq!(report.n_input, 300);
    assert_eq!(report.n_after_triage, 300);
    assert_eq!(report.n_after_region, out.len());
    assert_eq!(report.n_after_geometry, out.len());
    // DG channels are 1 and 4.
    assert_eq!(report.region_matches, Some(2));
    assert!(out.channels().iter().all(|c| *c == 1 || *c == 4));
}

#[test]
fn region_keeps_time_order() {
    let (ctx, spikes) = synthetic_session(2, 4, 300);
    let region = RegionFilter::parse("po");
    let (out, _) = SpikeFilter::new(&region, SpikeRepresentation::Clusterless)
        .apply(&spikes, &ctx.labels)
        .unwrap();
    assert!(out.times().windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(out.components().unwrap().probs.nrows(), out.len());
}

#[test]
fn geometry_runs_on_relocalized_rows() {
    let geom = ProbeGeometry::new(array![[0.0, 0.0], [32.0, 20.0]]).unwrap();
    let spikes = localized(vec![1.0, 1.1, 1.2], vec![5.0, 6.0, 7.0]);
    let mut masks = TriageMasks::new(RowSelector::Mask(vec![true, true, true]), RowSelector::Indices(vec![0, 2]));
    // Re-localization moves the second survivor off the probe.
    masks.relocalized = Some(Localizations {
        x: vec![5.0, 500.0],
        z: vec![10.0, 10.0],
        amplitude: vec![8.0, 8.0],
    });

    let region = RegionFilter::All;
    let filter = SpikeFilter {
        triage: Some(&masks),
        region: &region,
        representation: SpikeRepresentation::Clusterless,
        geometry: Some((&geom, 100.0)),
    };
    let (out, report) = filter.apply(&spikes, &Default::default()).unwrap();
    assert_eq!(report.n_after_triage, 2);
    assert_eq!(report.n_after_geometry, 1);
    assert_eq!(out.times(), &[1.0]);
}

#[test]
fn session_geometry_feeds_the_pipeline() {
    let mut ctx = SessionContext::new(vec![1.0]);
    ctx.geometry = Some(ProbeGeometry::new(array![[0.0, 0.0], [32.0, 20.0]]).unwrap());
    let spikes = localized(vec![1.0, 1.1, 1.2], vec![5.0, -150.0, 20.0]);
    let cfg = PipelineConfig { n_time_bins: 3, ..PipelineConfig::default() };
    let out = featurize(&ctx, &spikes, None, SpikeRepresentation::Thresholded, &cfg).unwrap();
    assert_eq!(out.report.n_after_geometry, 2);
    assert_eq!(out.window_counts, vec![2]);

    let wide = PipelineConfig { geometry_margin_um: 200.0, ..cfg };
    let out = featurize(&ctx, &spikes, None, SpikeRepresentation::Thresholded, &wide).unwrap();
    assert_eq!(out.window_counts, vec![3]);
}

#[test]
fn bad_idx_keep_is_fatal_in_pipeline() {
    let ctx = SessionContext::new(vec![1.0]);
    let spikes = SpikeSet::new(vec![1.0, 1.1], vec![0, 0]).unwrap();
    let masks = TriageMasks::new(RowSelector::Indices(vec![0]), RowSelector::Indices(vec![1]));
    let cfg = PipelineConfig { triage: true, ..PipelineConfig::default() };
    let err = featurize(&ctx, &spikes, Some(&masks), SpikeRepresentation::Thresholded, &cfg).unwrap_err();
    assert_eq!(
        err,
        spikebin::PrepError::MaskIndexOutOfRange { mask: "idx_keep", index: 1, len: 1 }
    );
}
