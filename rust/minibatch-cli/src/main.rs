//! Columnar Minibatch Source command line tool
//!
//! Inspects array stores, walks minibatches over them, and writes a small
//! synthetic store for experimentation.
//!
//! # Usage
//!
//! ```bash
//! # Write a demo store with 20 records
//! mbsource synth demo --records 20
//!
//! # Show its streams
//! mbsource inspect demo
//!
//! # Walk five batches of more than 16 samples each
//! mbsource walk demo --samples 16 --batches 5 --device gpu:0
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minibatch_core::dataset::{ArrayAttributes, ArrayDirectoryWriter, ElementType};
use minibatch_core::source::{
    Device, LengthPolicy, MinibatchRequest, MinibatchSource, PaddedBatchBuilder, PassthroughBuilder,
};
use minibatch_core::{LocalStorage, SourceConfig, StorageBackend};

/// Columnar Minibatch Source
#[derive(Parser, Debug)]
#[command(name = "mbsource")]
#[command(about = "Sample-budgeted minibatches over columnar array stores")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the streams of a store
    Inspect {
        /// Array directory
        store: PathBuf,
    },
    /// Draw minibatches and print what each one covers
    Walk {
        /// Array directory
        store: PathBuf,

        /// Sample budget per batch
        #[arg(short, long, default_value = "16")]
        samples: usize,

        /// Number of batches to draw
        #[arg(short, long, default_value = "4")]
        batches: usize,

        /// Placement for built batches (cpu, gpu, gpu:N)
        #[arg(long)]
        device: Option<Device>,

        /// Truncate inexact variable-length records instead of failing
        #[arg(long)]
        floor: bool,
    },
    /// Write a synthetic store with fixed-length and variable-length sequences
    Synth {
        /// Array directory to create
        store: PathBuf,

        /// Number of records
        #[arg(short, long, default_value = "10")]
        records: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => SourceConfig::from_file(path)?,
        None => {
            // Without a config file, store paths are relative to the working directory
            let mut config = SourceConfig::default();
            config.storage.base_path = PathBuf::from(".");
            config
        }
    }
    .with_env_overrides();

    match args.command {
        Command::Inspect { store } => {
            config.source.store_path = store;
            inspect(&config)
        }
        Command::Walk {
            store,
            samples,
            batches,
            device,
            floor,
        } => {
            config.source.store_path = store;
            if floor {
                config.source.length_policy = LengthPolicy::Floor;
            }
            walk(&config, samples, batches, device)
        }
        Command::Synth { store, records } => synth(&config, store, records),
    }
}

fn inspect(config: &SourceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = MinibatchSource::open(config, PassthroughBuilder)?;

    println!(
        "{}: {} records, {} streams",
        config.source.store_path.display(),
        source.record_count(),
        source.catalog().len()
    );
    for info in source.stream_infos() {
        println!(
            "  [{}] {:<16} {:<4} element {:?}{}",
            info.ordinal,
            info.name,
            info.element_dtype,
            info.element_shape,
            if info.is_sequence { " sequence" } else { "" }
        );
    }
    Ok(())
}

fn walk(
    config: &SourceConfig,
    samples: usize,
    batches: usize,
    device: Option<Device>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = MinibatchSource::open(config, PaddedBatchBuilder)?;
    let request = MinibatchRequest {
        device,
        ..MinibatchRequest::default()
    };

    for batch_index in 0..batches {
        let result = source.next_minibatch_with(samples, request)?;
        let selection = result.selection();
        println!(
            "batch {}: records [{}, {}) count {} samples {}{}",
            batch_index,
            selection.start,
            selection.end,
            selection.records,
            selection.samples,
            if result.sweep_end() { " (sweep end)" } else { "" }
        );

        let mut streams: Vec<_> = result.iter().collect();
        streams.sort_by_key(|(info, _)| info.ordinal);
        for (info, batch) in streams {
            println!(
                "  {:<16} samples {:<4} shape {:?} on {}",
                info.name, batch.sample_count, batch.data.shape, batch.data.device
            );
        }
    }
    Ok(())
}

fn synth(
    config: &SourceConfig,
    store: PathBuf,
    records: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
    let mut writer = ArrayDirectoryWriter::create(storage, &store)?;

    // Three steps of four features per record
    let fixed: Vec<f32> = (0..records * 3 * 4).map(|v| v as f32 * 0.25).collect();
    writer.write_fixed(
        "fixed_len_seq",
        &[records, 3, 4],
        &fixed,
        ArrayAttributes::sequence(vec![4], ElementType::F32),
    )?;

    // One to four steps of three features per record
    let vlen: Vec<Vec<f32>> = (0..records)
        .map(|i| (0..(i % 4 + 1) * 3).map(|v| (i * 100 + v) as f32).collect())
        .collect();
    writer.write_variable(
        "vlen_seq",
        &vlen,
        ArrayAttributes::sequence(vec![3], ElementType::F32),
    )?;

    let labels: Vec<i64> = (0..records as i64).map(|i| i % 2).collect();
    writer.write_fixed("label", &[records, 1], &labels, ArrayAttributes::default())?;

    let root = writer.finish()?;
    tracing::info!(store = %root.display(), records, "wrote synthetic store");
    Ok(())
}
