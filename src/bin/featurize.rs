/// featurize: build the `[trial, unit, bin]` activity tensor for one probe,
/// region and spike representation, and write it to safetensors.
///
/// Output keys:
///   activity      [T, U, B]  U32 counts (sorted, thresholded) or F64 weights (clusterless)
///   unit_ids      [U]        I64 original cluster / channel / component id per row
///   onset_times   [T]        F64 onset per trial row
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use spikebin::{
    io::{write_featurized, Artifacts, SessionFiles},
    Notice, OutOfRangePolicy, Pipeline, PipelineConfig, RegionFilter, SessionSource,
    SpikeRepresentation,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Sorted,
    Thresholded,
    Clusterless,
}

impl From<Mode> for SpikeRepresentation {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Sorted => SpikeRepresentation::Sorted,
            Mode::Thresholded => SpikeRepresentation::Thresholded,
            Mode::Clusterless => SpikeRepresentation::Clusterless,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "featurize", about = "Trial-aligned spike tensors for decoding")]
struct Args {
    /// Directory holding `<probe>/session.safetensors` and `<probe>/regions.json`.
    #[arg(long)]
    session_root: PathBuf,

    /// Probe id.
    #[arg(long)]
    probe: String,

    /// Upstream artifacts safetensors (spike_index, localizations, …).
    #[arg(long)]
    artifacts: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Spike representation.
    #[arg(long, value_enum, default_value_t = Mode::Clusterless)]
    mode: Mode,

    /// Region acronym substring, or "all".
    #[arg(long, default_value = "all")]
    region: String,

    /// Number of time bins over the 1.5 s window.
    #[arg(long, default_value_t = 30)]
    n_time_bins: usize,

    /// Renumber units densely within the region.
    #[arg(long)]
    regional: bool,

    /// Apply triage masks from the artifacts file.
    #[arg(long)]
    triage: bool,

    /// Use every trial instead of the active subset.
    #[arg(long)]
    all_trials: bool,

    /// Clamp out-of-window times to the edge bins instead of dropping them.
    #[arg(long)]
    clamp: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("probe {}  region {}  mode {:?}", args.probe, args.region, args.mode);

    let ctx = SessionFiles::new(&args.session_root).load_session(&args.probe)?;
    let regions = ctx.labels.available_regions();
    if !regions.is_empty() {
        info!("available regions: {:?}", regions.keys().collect::<Vec<_>>());
    }

    let artifacts = Artifacts::load(&args.artifacts)?;
    let spikes = artifacts.spike_set(&ctx.clock)?;

    let cfg = PipelineConfig {
        n_time_bins: args.n_time_bins,
        region: RegionFilter::parse(&args.region),
        keep_active_trials: !args.all_trials,
        triage: args.triage,
        regional: args.regional,
        out_of_range: if args.clamp { OutOfRangePolicy::Clamp } else { OutOfRangePolicy::Drop },
        ..PipelineConfig::default()
    };

    let pipeline = Pipeline::new(cfg, args.mode.into())?;
    let out = pipeline.run(&ctx, &spikes, artifacts.triage.as_ref())?;

    for notice in &out.notices {
        if let Notice::RegionNotFound { region } = notice {
            warn!("no channels or clusters labelled '{region}'");
        }
    }

    write_featurized(&out, &args.output)?;
    Ok(())
}
