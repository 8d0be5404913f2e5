//! Safetensors I/O for session artifacts and output tensors.
//!
//! Reader: upstream arrays (`spike_index`, `localizations`, sorting, triage
//! and clusterless outputs) and per-probe session files.
//! Writer: the featurized activity tensor with its row/trial metadata.
use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array2, ArrayView, Dimension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::assemble::ActivityTensor;
use crate::filter::{ProbeGeometry, RowSelector, TriageMasks};
use crate::pipeline::Featurized;
use crate::session::{RegionLabels, SampleClock, SessionContext, SessionSource};
use crate::spikes::{ids_from_f64, Localizations, SpikeSet};

// ── Low-level safetensors parser (raw bytes → f64, whatever the stored
//    dtype). ──────────────────────────────────────────────────────────────────

struct Tensor {
    dtype: String,
    shape: Vec<usize>,
    data: Vec<f64>,
}

struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("safetensors file too small: {}", path.display());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let data_start = usize::try_from(u64::from_le_bytes(len))
            .ok()
            .and_then(|n| n.checked_add(8))
            .ok_or_else(|| anyhow!("header length overflows in {}", path.display()))?;
        let header_bytes = bytes
            .get(8..data_start)
            .ok_or_else(|| anyhow!("truncated safetensors header in {}", path.display()))?;
        let header: HashMap<String, serde_json::Value> =
            serde_json::from_slice(header_bytes).context("failed to parse safetensors header")?;
        Ok(Self { bytes, header, data_start })
    }

    fn has(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    fn tensor(&self, name: &str) -> Result<Tensor> {
        let entry = self.header.get(name).with_context(|| format!("missing '{name}' key"))?;
        let dtype = entry["dtype"]
            .as_str()
            .with_context(|| format!("'{name}': missing dtype"))?
            .to_string();
        let shape = entry["shape"]
            .as_array()
            .with_context(|| format!("'{name}': missing shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize))
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("'{name}': bad shape"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("'{name}': missing data_offsets"))?;
        let (s, e) = match (offsets.first().and_then(|v| v.as_u64()), offsets.get(1).and_then(|v| v.as_u64())) {
            (Some(s), Some(e)) => (s as usize, e as usize),
            _ => bail!("'{name}': bad data_offsets"),
        };
        let (start, end) = match (self.data_start.checked_add(s), self.data_start.checked_add(e)) {
            (Some(start), Some(end)) => (start, end),
            _ => bail!("'{name}': data_offsets overflow"),
        };
        let raw = self
            .bytes
            .get(start..end)
            .with_context(|| format!("'{name}': data out of bounds"))?;

        let data: Vec<f64> = match dtype.as_str() {
            "F32" => raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw.chunks_exact(8).map(|b| f64::from_le_bytes(le8(b))).collect(),
            "I32" => raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "I64" => raw.chunks_exact(8).map(|b| i64::from_le_bytes(le8(b)) as f64).collect(),
            "U32" => raw.chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "U8" | "BOOL" => raw.iter().map(|&b| b as f64).collect(),
            other => bail!("'{name}': unsupported dtype {other}"),
        };
        let n_values = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .with_context(|| format!("'{name}': shape {shape:?} overflows"))?;
        if data.len() != n_values {
            bail!("'{name}': {} values for shape {shape:?}", data.len());
        }
        Ok(Tensor { dtype, shape, data })
    }

    fn array2(&self, name: &str) -> Result<Array2<f64>> {
        let t = self.tensor(name)?;
        match t.shape[..] {
            [r, c] => Ok(Array2::from_shape_vec((r, c), t.data)?),
            _ => bail!("'{name}': expected 2-D, got shape {:?}", t.shape),
        }
    }

    fn vector(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.tensor(name)?.data)
    }

    fn opt<T>(&self, name: &str, read: impl Fn(&Self, &str) -> Result<T>) -> Result<Option<T>> {
        if self.has(name) {
            read(self, name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Boolean dtypes become a mask, anything else a list of row indices.
    fn row_selector(&self, name: &str) -> Result<RowSelector> {
        let t = self.tensor(name)?;
        if t.dtype == "BOOL" || t.dtype == "U8" {
            Ok(RowSelector::Mask(t.data.iter().map(|&v| v != 0.0).collect()))
        } else {
            Ok(RowSelector::Indices(to_indices(name, &t.data)?))
        }
    }
}

fn le8(b: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(b);
    out
}

fn to_indices(name: &str, values: &[f64]) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|&v| {
            if v < 0.0 || v.fract() != 0.0 {
                bail!("'{name}': {v} is not a row index");
            }
            Ok(v as usize)
        })
        .collect()
}

// ── Upstream artifacts ────────────────────────────────────────────────────

/// Already-materialized outputs of detection, localization, sorting, triage
/// and the clusterless mixture fit for one probe.
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// `[n, 2]` (sample, channel).
    pub spike_index: Array2<f64>,
    /// `[n, 3]` (x, z, amplitude).
    pub localizations: Array2<f64>,
    /// `[n, 2]` (sample, cluster), when sorted.
    pub spike_train: Option<Array2<f64>>,
    pub triage: Option<TriageMasks>,
    /// `[n, n_components]` membership probabilities.
    pub component_probs: Option<Array2<f64>>,
    /// `[n]` hard component labels.
    pub component_labels: Option<Vec<i64>>,
}

impl Artifacts {
    pub fn load(path: &Path) -> Result<Self> {
        let f = StFile::open(path)?;

        let triage = if f.has("low_ptp_filter") && f.has("idx_keep") {
            let mut masks = TriageMasks::new(f.row_selector("low_ptp_filter")?, f.row_selector("idx_keep")?);
            if let Some(rows) = f.opt("triage_localizations", StFile::array2)? {
                masks.relocalized = Some(Localizations::from_rows(rows.view())?);
            }
            Some(masks)
        } else {
            None
        };

        let out = Artifacts {
            spike_index: f.array2("spike_index")?,
            localizations: f.array2("localizations")?,
            spike_train: f.opt("spike_train", StFile::array2)?,
            triage,
            component_probs: f.opt("component_probs", StFile::array2)?,
            component_labels: f
                .opt("component_labels", StFile::vector)?
                .map(|v| ids_from_f64("component_labels", v))
                .transpose()?,
        };
        info!(
            "loaded {} spikes from {} (sorted: {}, triage: {}, clusterless: {})",
            out.spike_index.nrows(),
            path.display(),
            out.spike_train.is_some(),
            out.triage.is_some(),
            out.component_probs.is_some(),
        );
        Ok(out)
    }

    /// Assemble the row-aligned spike table, converting samples with `clock`.
    pub fn spike_set(&self, clock: &SampleClock) -> Result<SpikeSet> {
        let mut set = SpikeSet::from_spike_index(self.spike_index.view(), self.localizations.view(), clock)?;
        if let Some(train) = &self.spike_train {
            set = set.with_spike_train(train.view())?;
        }
        if let Some(probs) = &self.component_probs {
            set = set.with_components(probs.clone(), self.component_labels.clone())?;
        }
        Ok(set)
    }
}

// ── Session directory ─────────────────────────────────────────────────────

/// File-backed session source: `<root>/<probe_id>/session.safetensors`
/// plus an optional `<root>/<probe_id>/regions.json`.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    pub root: PathBuf,
}

impl SessionFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SessionSource for SessionFiles {
    fn load_session(&self, probe_id: &str) -> Result<SessionContext> {
        let dir = self.root.join(probe_id);
        let f = StFile::open(&dir.join("session.safetensors"))?;

        let onset_times = f.vector("onset_times")?;
        let active_trials = f
            .opt("active_trials", StFile::vector)?
            .map(|v| to_indices("active_trials", &v))
            .transpose()?;

        let clock = if f.has("sync_samples") {
            SampleClock::sync(f.vector("sync_samples")?, f.vector("sync_times")?)?
        } else {
            let rate = f.opt("sampling_rate", StFile::vector)?.and_then(|v| v.first().copied());
            let offset = f.opt("start_time", StFile::vector)?.and_then(|v| v.first().copied());
            SampleClock::Linear { rate: rate.unwrap_or(30_000.0), offset: offset.unwrap_or(0.0) }
        };

        let geometry = f
            .opt("geometry", StFile::array2)?
            .map(ProbeGeometry::new)
            .transpose()?;

        let regions = dir.join("regions.json");
        let labels = if regions.exists() {
            let text = std::fs::read_to_string(&regions)
                .with_context(|| format!("reading {}", regions.display()))?;
            serde_json::from_str(&text).context("failed to parse regions.json")?
        } else {
            RegionLabels::default()
        };

        debug!(probe_id, n_trials = onset_times.len(), "session resolved");
        Ok(SessionContext { onset_times, active_trials, labels, clock, geometry })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Element types the writer can store, with their safetensors dtype tag.
pub trait StElement: Copy {
    const DTYPE: &'static str;
    fn put_le(self, out: &mut Vec<u8>);
}

impl StElement for f64 {
    const DTYPE: &'static str = "F64";
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl StElement for u32 {
    const DTYPE: &'static str = "U32";
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl StElement for i64 {
    const DTYPE: &'static str = "I64";
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl StElement for bool {
    const DTYPE: &'static str = "BOOL";
    fn put_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
}

struct Entry {
    name: String,
    dtype: &'static str,
    shape: Vec<usize>,
    n_values: usize,
    bytes: Vec<u8>,
}

/// Safetensors writer for session fixtures and featurized outputs.
///
/// Tensors are laid out in insertion order; string metadata goes to the
/// `__metadata__` header entry.
///
/// ```rust,no_run
/// use ndarray::array;
/// use spikebin::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add("onset_times", &[1.0, 5.0, 10.0], &[3]);
/// w.add_array("counts", array![[0u32, 2], [1, 0]].view());
/// w.metadata("layout", "trial,unit,bin");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<Entry>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flat row-major buffer with an explicit shape.
    pub fn add<T: StElement>(&mut self, name: &str, data: &[T], shape: &[usize]) {
        let mut bytes = Vec::with_capacity(data.len() * std::mem::size_of::<T>());
        for &v in data {
            v.put_le(&mut bytes);
        }
        self.entries.push(Entry {
            name: name.to_string(),
            dtype: T::DTYPE,
            shape: shape.to_vec(),
            n_values: data.len(),
            bytes,
        });
    }

    /// Add an array in logical (row-major) order, whatever its memory layout.
    pub fn add_array<T: StElement, D: Dimension>(&mut self, name: &str, a: ArrayView<T, D>) {
        let mut bytes = Vec::with_capacity(a.len() * std::mem::size_of::<T>());
        for &v in a.iter() {
            v.put_le(&mut bytes);
        }
        self.entries.push(Entry {
            name: name.to_string(),
            dtype: T::DTYPE,
            shape: a.shape().to_vec(),
            n_values: a.len(),
            bytes,
        });
    }

    pub fn metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let mut header = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset = 0usize;
        for e in &self.entries {
            if e.shape.iter().product::<usize>() != e.n_values {
                bail!("'{}': {} values for shape {:?}", e.name, e.n_values, e.shape);
            }
            header.insert(
                e.name.clone(),
                serde_json::json!({
                    "dtype": e.dtype,
                    "shape": e.shape,
                    "data_offsets": [offset, offset + e.bytes.len()],
                }),
            );
            offset += e.bytes.len();
        }

        // Header padded with spaces so the data section starts 8-byte aligned.
        let mut head = serde_json::to_vec(&header)?;
        head.resize(head.len().next_multiple_of(8), b' ');

        let mut f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(head.len() as u64).to_le_bytes())?;
        f.write_all(&head)?;
        for e in &self.entries {
            f.write_all(&e.bytes)?;
        }
        debug!(path = %path.display(), n_tensors = self.entries.len(), "safetensors written");
        Ok(())
    }
}

/// Write a featurized run: `activity` (U32 counts or F64 weights,
/// `[trial, unit, bin]`), `unit_ids` and `onset_times`, with the axis layout
/// and value kind in the metadata.
pub fn write_featurized(out: &Featurized, path: &Path) -> Result<()> {
    let (n_trials, n_units, n_bins) = out.tensor.dim();
    let mut w = StWriter::new();
    match &out.tensor {
        ActivityTensor::Counts(a) => {
            w.add_array("activity", a.view());
            w.metadata("values", "counts");
        }
        ActivityTensor::Weights(a) => {
            w.add_array("activity", a.view());
            w.metadata("values", "weights");
        }
    }
    w.metadata("layout", "trial,unit,bin");
    w.add("unit_ids", &out.unit_ids, &[out.unit_ids.len()]);
    w.add("onset_times", &out.onset_times, &[out.onset_times.len()]);
    w.write(path)?;
    info!("wrote [{n_trials}, {n_units}, {n_bins}] → {}", path.display());
    Ok(())
}

/// Read back the activity tensor written by [`write_featurized`] as `f64`.
pub fn read_activity(path: &Path) -> Result<ndarray::Array3<f64>> {
    let f = StFile::open(path)?;
    let t = f.tensor("activity")?;
    match t.shape[..] {
        [a, b, c] => Ok(ndarray::Array3::from_shape_vec((a, b, c), t.data)?),
        _ => bail!("'activity': expected 3-D, got shape {:?}", t.shape),
    }
}
