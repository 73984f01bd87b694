use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing::info;

use common::io::{load_records, write_results, InputFormat};
use standalone::run_local;

#[derive(Parser, Debug)]
#[command(version, about = "Run a map reduce workload in a single process", long_about = None)]
struct Args {
    /// Name of the workload.
    #[arg(short, long)]
    workload: String,

    /// Glob matching the input files.
    #[arg(short, long)]
    input: String,

    /// How input lines become records.
    #[arg(long, value_enum, default_value_t)]
    format: InputFormat,

    /// Number of partitions, as if run on this many workers.
    #[arg(short, long, default_value_t = 1)]
    partitions: u32,

    /// Write results here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sort results by key before writing them.
    #[arg(long)]
    sort: bool,

    /// Auxiliary arguments passed to the workload.
    #[arg(last = true)]
    aux: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let registry = workload::Registry::builtin();
    let workload = registry.get(&args.workload).ok_or_else(|| {
        anyhow!(
            "unknown workload `{}`, expected one of: {}",
            args.workload,
            registry.names().collect::<Vec<_>>().join(", ")
        )
    })?;
    let aux = workload::encode_aux(&args.aux)?;

    let records = load_records(&args.input, args.format)?;
    info!("Loaded {} records from `{}`", records.len(), args.input);

    let results = run_local(&workload, &aux, records, args.partitions)?;
    write_results(&results, args.output.as_deref(), args.sort)?;
    Ok(())
}
