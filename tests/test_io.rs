use spikebin::io::{read_activity, write_featurized, Artifacts, SessionFiles, StWriter};
use ndarray::{array, Axis};
use spikebin::{
    Pipeline, PipelineConfig, PrepError, RegionFilter, RegionLabels, SessionSource,
    SpikeRepresentation,
};
use std::path::Path;
use tempfile::TempDir;

const RATE: f64 = 30_000.0;

/// Six detections; row 3 is a low-amplitude spike removed by triage.
fn write_artifacts(path: &Path) {
    let samples = [0.6, 1.2, 4.6, 1.5, 9.8, 9.9].map(|t| t * RATE);
    let channels = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0];
    let spike_index: Vec<f64> = samples.iter().zip(&channels).flat_map(|(&s, &c)| [s, c]).collect();
    let localizations: Vec<f64> = (0..6).flat_map(|_| [10.0, 10.0, 50.0]).collect();
    let spike_train: Vec<f64> = samples.iter().zip([3.0, 1.0, 1.0, 1.0, 3.0, 2.0]).flat_map(|(&s, c)| [s, c]).collect();

    let mut w = StWriter::new();
    w.add("spike_index", &spike_index, &[6, 2]);
    w.add("localizations", &localizations, &[6, 3]);
    w.add("spike_train", &spike_train, &[6, 2]);
    w.add("low_ptp_filter", &[true, true, true, false, true, true], &[6]);
    w.add("idx_keep", &[0i64, 1, 2, 3, 4], &[5]);
    w.add("component_probs", &[0.5; 12], &[6, 2]);
    w.add("component_labels", &[0i64, 1, 1, 1, 0, 0], &[6]);
    w.write(path).unwrap();
}

fn write_session(root: &Path, probe: &str) {
    let dir = root.join(probe);
    std::fs::create_dir_all(&dir).unwrap();
    let mut w = StWriter::new();
    w.add("onset_times", &[1.0, 5.0, 10.0, 20.0], &[4]);
    w.add("active_trials", &[0i64, 1, 2], &[3]);
    w.add("sampling_rate", &[RATE], &[1]);
    w.add("geometry", &[0.0, 0.0, 32.0, 40.0], &[2, 2]);
    w.write(&dir.join("session.safetensors")).unwrap();

    let labels = RegionLabels {
        channels: vec!["CA1".into(), "DG".into()],
        clusters: vec!["DG".into(), "CA1".into(), "CA3".into(), "PO".into()],
    };
    std::fs::write(dir.join("regions.json"), serde_json::to_string(&labels).unwrap()).unwrap();
}

#[test]
fn artifacts_load_every_column() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let path = dir.join("artifacts.safetensors");
    write_artifacts(&path);

    let a = Artifacts::load(&path).unwrap();
    assert_eq!(a.spike_index.dim(), (6, 2));
    assert!(a.spike_train.is_some());
    assert_eq!(a.component_labels.as_deref(), Some(&[0, 1, 1, 1, 0, 0][..]));
    let triage = a.triage.as_ref().unwrap();
    assert_eq!(triage.low_ptp_filter, spikebin::RowSelector::Mask(vec![true, true, true, false, true, true]));
    assert_eq!(triage.idx_keep, spikebin::RowSelector::Indices(vec![0, 1, 2, 3, 4]));

    let spikes = a.spike_set(&spikebin::SampleClock::linear(RATE)).unwrap();
    assert_eq!(spikes.len(), 6);
    approx::assert_abs_diff_eq!(spikes.times()[2], 4.6, epsilon = 1e-12);
    assert_eq!(spikes.clusters().unwrap(), &[3, 1, 1, 1, 3, 2]);
}

#[test]
fn session_directory_resolves_context() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_session(root, "probe00");
    let ctx = SessionFiles::new(root).load_session("probe00").unwrap();

    assert_eq!(ctx.trial_onsets(true).unwrap(), vec![1.0, 5.0, 10.0]);
    assert_eq!(ctx.trial_onsets(false).unwrap().len(), 4);
    assert_eq!(ctx.labels.matching_channels("ca"), vec![0]);
    assert_eq!(ctx.geometry.as_ref().map(|g| g.n_channels()), Some(2));
    approx::assert_abs_diff_eq!(ctx.clock.to_seconds(RATE), 1.0);

    assert!(SessionFiles::new(root).load_session("missing").is_err());
}

#[test]
fn sync_table_session_clock() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let dir = root.join("probe01");
    std::fs::create_dir_all(&dir).unwrap();
    let mut w = StWriter::new();
    w.add("onset_times", &[1.0], &[1]);
    w.add("sync_samples", &[0.0, 30_000.0, 60_000.0], &[3]);
    w.add("sync_times", &[1.0, 2.0, 3.5], &[3]);
    w.write(&dir.join("session.safetensors")).unwrap();

    let ctx = SessionFiles::new(root).load_session("probe01").unwrap();
    assert!(ctx.labels.channels.is_empty());
    approx::assert_abs_diff_eq!(ctx.clock.to_seconds(15_000.0), 1.5);
    approx::assert_abs_diff_eq!(ctx.clock.to_seconds(45_000.0), 2.75);
    // Beyond the last pulse the final segment is extended.
    approx::assert_abs_diff_eq!(ctx.clock.to_seconds(90_000.0), 5.0);
}

#[test]
fn featurize_from_files_and_write_back() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_session(root, "probe00");
    let artifacts_path = root.join("artifacts.safetensors");
    write_artifacts(&artifacts_path);

    let ctx = SessionFiles::new(root).load_session("probe00").unwrap();
    let artifacts = Artifacts::load(&artifacts_path).unwrap();
    let spikes = artifacts.spike_set(&ctx.clock).unwrap();

    let cfg = PipelineConfig { n_time_bins: 3, triage: true, ..PipelineConfig::default() };
    let pipe = Pipeline::new(cfg.clone(), SpikeRepresentation::Thresholded).unwrap();
    let out = pipe.run(&ctx, &spikes, artifacts.triage.as_ref()).unwrap();
    assert_eq!(out.report.n_after_triage, 5);
    assert_eq!(out.window_counts, vec![2, 1, 2]);

    let path = root.join("thresholded.safetensors");
    write_featurized(&out, &path).unwrap();
    assert_eq!(read_activity(&path).unwrap(), out.tensor.to_f64());

    // Sorted, restricted to clusters labelled CA*: ids 1 and 2.
    let ca = PipelineConfig { region: RegionFilter::parse("ca"), regional: true, ..cfg };
    let out = Pipeline::new(ca, SpikeRepresentation::Sorted)
        .unwrap()
        .run(&ctx, &spikes, artifacts.triage.as_ref())
        .unwrap();
    assert_eq!(out.unit_ids, vec![1, 2]);
    assert_eq!(out.tensor.dim(), (3, 2, 3));

    let path = root.join("sorted.safetensors");
    write_featurized(&out, &path).unwrap();
    assert_eq!(read_activity(&path).unwrap(), out.tensor.to_f64());
}

/// Raw safetensors bytes with a hand-written header and one f64 of data.
fn raw_file(path: &Path, header_len: u64, header: &str) {
    let mut bytes = header_len.to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(&1.0f64.to_le_bytes());
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn hostile_headers_are_errors() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.safetensors");

    raw_file(&path, u64::MAX, "{}");
    assert!(read_activity(&path).is_err());

    let header = r#"{"activity":{"dtype":"F64","shape":[1,1,1],"data_offsets":[18446744073709551615,18446744073709551615]}}"#;
    raw_file(&path, header.len() as u64, header);
    assert!(read_activity(&path).is_err());

    let header = r#"{"activity":{"dtype":"F64","shape":[4294967296,4294967296,4294967296],"data_offsets":[0,8]}}"#;
    raw_file(&path, header.len() as u64, header);
    assert!(read_activity(&path).is_err());
}

#[test]
fn fractional_component_labels_fail_to_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("artifacts.safetensors");
    let mut w = StWriter::new();
    w.add("spike_index", &[30_000.0, 0.0], &[1, 2]);
    w.add("localizations", &[1.0, 2.0, 3.0], &[1, 3]);
    w.add("component_probs", &[0.5, 0.5], &[1, 2]);
    w.add("component_labels", &[1.5], &[1]);
    w.write(&path).unwrap();

    let err = Artifacts::load(&path).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PrepError>(),
        Some(&PrepError::NonIntegralId { column: "component_labels", value: 1.5 })
    );
}

#[test]
fn writer_records_metadata_and_logical_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("t.safetensors");

    // A transposed view is written in logical order, not memory order.
    let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let mut w = StWriter::new();
    w.add_array("activity", a.t().insert_axis(Axis(0)));
    w.metadata("layout", "trial,unit,bin");
    w.write(&path).unwrap();

    let back = read_activity(&path).unwrap();
    assert_eq!(back.index_axis(Axis(0), 0), a.t());

    let bytes = std::fs::read(&path).unwrap();
    let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    assert_eq!((8 + n) % 8, 0);
    let header: serde_json::Value = serde_json::from_slice(&bytes[8..8 + n]).unwrap();
    assert_eq!(header["__metadata__"]["layout"], "trial,unit,bin");
    assert_eq!(header["activity"]["shape"], serde_json::json!([1, 3, 2]));
}

#[test]
fn writer_rejects_shape_that_does_not_fit_the_data() {
    let tmp = TempDir::new().unwrap();
    let mut w = StWriter::new();
    w.add("x", &[1u32, 2, 3], &[2, 2]);
    assert!(w.write(&tmp.path().join("x.safetensors")).is_err());
}
