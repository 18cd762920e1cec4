use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "finsight")]
#[command(version)]
#[command(about = "Financial document analysis: HTTP API, queue workers and one-shot analysis")]
pub(crate) struct Cli {
    /// JSON settings file (default: $FINSIGHT_CONFIG, then environment only)
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run the HTTP API. With a memory:// queue, workers run in-process.
    Serve {
        /// Listen address (default: BIND_ADDR or 0.0.0.0:8000)
        #[arg(long)]
        bind: Option<String>,

        /// Worker count for the in-process pool
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Consume analysis tasks from the configured queue.
    Worker {
        /// Number of concurrent workers (default: WORKER_COUNT or CPU count)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Analyze one PDF and print the result to stdout.
    Analyze {
        /// Path to the PDF
        file: PathBuf,

        /// Question for the analysts (default: general investment insights)
        #[arg(long)]
        query: Option<String>,
    },
}
