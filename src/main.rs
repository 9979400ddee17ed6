use std::io::{self, IsTerminal};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, Context};
use bytesize::ByteSize;
use clap::Parser;
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use localwc::error::{EXIT_JOB_FAILED, EXIT_SUCCESS};
use localwc::parameters::DEFAULT_MAX_PARTITION_SIZE;
use localwc::phases::output::DirectorySink;
use localwc::{Error, JobReport, MRController, MRParameters};

#[derive(Parser, Debug)]
#[command(version, about = "Count word frequencies over text files", long_about = None)]
struct Args {
    /// Input files or directories.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output directory. Must not exist yet.
    output: PathBuf,

    /// Upper bound for the size of one map partition, e.g. `134217728`, `64KiB` or `128MiB`.
    #[arg(long, value_parser = parse_size, default_value_t = DEFAULT_MAX_PARTITION_SIZE)]
    max_partition_size: u64,

    /// Number of map threads. Defaults to the available parallelism.
    #[arg(long)]
    mappers: Option<usize>,

    /// Number of reduce threads, which is also the number of output parts.
    #[arg(long, default_value_t = 1)]
    reducers: usize,

    /// More logging; repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn parameters(&self) -> MRParameters {
        let mappers = self.mappers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        MRParameters::new()
            .set_concurrency(mappers, self.reducers)
            .set_max_partition_size(self.max_partition_size)
    }
}

fn parse_size(s: &str) -> Result<u64, String> {
    s.parse::<ByteSize>().map(|b| b.as_u64())
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(default).context("building log filter")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {}", e))
}

fn run(args: &Args) -> anyhow::Result<JobReport> {
    let params = args.parameters();
    params.validate()?;
    let mut sink = DirectorySink::new(&args.output)?;

    let report = MRController::run(params, &args.inputs, &mut sink).with_context(|| {
        format!("counting words into {}", args.output.display())
    })?;
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("{:#}", e);
        return ExitCode::from(EXIT_JOB_FAILED as u8);
    }

    let started = OffsetDateTime::now_utc();
    let status = match run(&args) {
        Ok(report) => {
            let c = &report.counters;
            info!(
                sources = c.sources,
                partitions = c.partitions,
                input_bytes = c.input_bytes,
                input_records = c.input_records,
                map_output_tokens = c.map_output_tokens,
                combine_output_records = c.combine_output_records,
                reduce_output_records = c.reduce_output_records,
                "job counters"
            );
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<Error>()
                .map_or(EXIT_JOB_FAILED, Error::exit_code)
        }
    };

    let elapsed = OffsetDateTime::now_utc() - started;
    info!(
        elapsed_ms = elapsed.whole_milliseconds() as u64,
        status,
        "total job execution time"
    );
    ExitCode::from(status as u8)
}
