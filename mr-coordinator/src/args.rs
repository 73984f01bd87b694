use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{Parser, Subcommand};

use common::io::InputFormat;
use common::roster::WorkerSpec;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// A roster entry, `id=http://host:port`. Repeat once per worker; the
    /// order given is the roster order.
    #[arg(short, long = "worker", required = true)]
    pub workers: Vec<WorkerSpec>,

    /// Seconds to wait for each map, shuffle, reduce, fetch or reset call.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Seconds to wait for each health probe.
    #[arg(long, default_value_t = 5)]
    pub health_timeout_secs: u64,

    /// Seconds to wait when connecting to a worker.
    #[arg(long, default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Largest message sent or accepted.
    #[arg(long, default_value = "64MiB")]
    pub max_message_size: ByteSize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a job and write its results.
    Run {
        /// Name of the workload every worker runs.
        #[arg(short, long)]
        workload: String,

        /// Glob matching the input files.
        #[arg(short, long)]
        input: String,

        /// How input lines become records.
        #[arg(long, value_enum, default_value_t)]
        format: InputFormat,

        /// Write results here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sort results by key before writing them.
        #[arg(long)]
        sort: bool,

        /// Skip resetting workers before the job starts.
        #[arg(long)]
        no_reset: bool,

        /// Auxiliary arguments passed to the workload.
        #[arg(last = true)]
        aux: Vec<String>,
    },

    /// Report the health of every worker.
    Status,

    /// Reset every worker to idle.
    Reset,
}
