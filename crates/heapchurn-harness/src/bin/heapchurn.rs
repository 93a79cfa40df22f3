//! CLI entrypoint for heapchurn.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use heapchurn_core::config::{
    DEFAULT_ITERATIONS, DEFAULT_MAX_ALLOCATIONS, DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE,
    DEFAULT_REPORT_INTERVAL,
};
use heapchurn_core::probe::{DEFAULT_PROBE_HIGH, DEFAULT_PROBE_LOW};
use heapchurn_core::selector::random_seed;
use heapchurn_core::{AllocatorKind, ProbeBounds, RunConfig, probe_largest_block};
use heapchurn_harness::structured_log::{ArtifactIndex, LogEmitter, validate_log_file};
use heapchurn_harness::{HarnessError, RunRequest, compare, execute, parse_seed};

/// Allocator stress and fragmentation workload.
#[derive(Debug, Parser)]
#[command(name = "heapchurn")]
#[command(about = "Randomized allocate/free churn with fragmentation probing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one workload and print its metrics.
    Run {
        #[command(flatten)]
        workload: WorkloadArgs,
        /// Allocator backend (system, mimalloc, jemalloc).
        #[arg(long, default_value = "system")]
        allocator: String,
        /// Output format on stdout (plain, markdown or json).
        #[arg(long, default_value = "plain")]
        format: String,
        /// Structured JSONL log path; an artifact index is written next to it.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Skip the allocator statistics dump.
        #[arg(long)]
        no_stats: bool,
    },
    /// Probe the largest satisfiable block once and exit.
    Probe {
        /// Allocator backend (system, mimalloc, jemalloc).
        #[arg(long, default_value = "system")]
        allocator: String,
        /// Smallest probed size in bytes.
        #[arg(long, default_value_t = DEFAULT_PROBE_LOW)]
        probe_low: usize,
        /// Largest probed size in bytes.
        #[arg(long, default_value_t = DEFAULT_PROBE_HIGH)]
        probe_high: usize,
        /// Output format (plain or json).
        #[arg(long, default_value = "plain")]
        format: String,
    },
    /// Run the same workload against several backends, one child process each.
    Compare {
        #[command(flatten)]
        workload: WorkloadArgs,
        /// Backends to compare (comma-separated). Defaults to every compiled-in backend.
        #[arg(long, value_delimiter = ',')]
        allocators: Vec<String>,
        /// Output format (markdown or json).
        #[arg(long, default_value = "markdown")]
        format: String,
    },
    /// Validate a structured JSONL run log.
    ValidateLog {
        /// Structured JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

#[derive(Debug, Args)]
struct WorkloadArgs {
    /// Number of workload steps.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,
    /// Ceiling on simultaneously tracked allocations.
    #[arg(long, default_value_t = DEFAULT_MAX_ALLOCATIONS)]
    max_allocations: usize,
    /// Smallest allocation size in bytes.
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE)]
    min_size: usize,
    /// Largest allocation size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
    max_size: usize,
    /// Emit metrics every N steps.
    #[arg(long, default_value_t = DEFAULT_REPORT_INTERVAL)]
    report_interval: u64,
    /// Smallest probed size in bytes.
    #[arg(long, default_value_t = DEFAULT_PROBE_LOW)]
    probe_low: usize,
    /// Largest probed size in bytes.
    #[arg(long, default_value_t = DEFAULT_PROBE_HIGH)]
    probe_high: usize,
    /// Seed (decimal or 0x-hex). A fresh seed is drawn if omitted.
    #[arg(long)]
    seed: Option<String>,
}

impl WorkloadArgs {
    fn config(&self) -> RunConfig {
        RunConfig {
            max_allocations: self.max_allocations,
            min_size: self.min_size,
            max_size: self.max_size,
            iterations: self.iterations,
            report_interval: self.report_interval,
            probe: ProbeBounds {
                low: self.probe_low,
                high: self.probe_high,
            },
        }
    }

    fn seed(&self) -> Result<u64, HarnessError> {
        self.seed.as_deref().map_or_else(|| Ok(random_seed()), parse_seed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Plain,
    Markdown,
    Json,
}

fn parse_format(raw: &str) -> Result<Format, HarnessError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "plain" | "text" => Ok(Format::Plain),
        "markdown" | "md" => Ok(Format::Markdown),
        "json" => Ok(Format::Json),
        _ => Err(HarnessError::InvalidFormat(raw.to_string())),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            workload,
            allocator,
            format,
            log,
            no_stats,
        } => {
            let format = parse_format(&format)?;
            let kind = AllocatorKind::from_str_loose(&allocator)?;
            let config = workload.config();
            config.validate()?;
            let seed = workload.seed()?;
            let run_id = format!("{kind}-{seed:016x}");

            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, &run_id)?,
                None => LogEmitter::disabled(&run_id),
            };
            let mut request = RunRequest::new(kind, config).with_seed(seed);
            request.collect_stats = !no_stats;

            if format == Format::Plain {
                eprintln!("Running {kind} workload (seed=0x{seed:X})");
            }
            let report = execute(&request, &mut emitter, |record| {
                if format == Format::Plain {
                    println!("{record}");
                }
            })?;

            match format {
                Format::Plain => print!("{}", report.plain_footer()),
                Format::Markdown => print!("{}", report.to_markdown()),
                Format::Json => println!("{}", report.to_json()?),
            }

            if let Some(path) = &log {
                let index_path = write_artifact_index(path, &run_id)?;
                if format == Format::Plain {
                    eprintln!("Log written to {} (index {})", path.display(), index_path.display());
                }
            }
        }
        Command::Probe {
            allocator,
            probe_low,
            probe_high,
            format,
        } => {
            let format = parse_format(&format)?;
            let kind = AllocatorKind::from_str_loose(&allocator)?;
            let bounds = ProbeBounds {
                low: probe_low,
                high: probe_high,
            };
            bounds.validate()?;
            let mut backend = kind.build()?;
            let outcome = probe_largest_block(&mut *backend, bounds);
            match format {
                Format::Plain | Format::Markdown => println!(
                    "{kind}: largest free block {} bytes ({} attempts, {} succeeded)",
                    outcome.largest_block, outcome.attempts, outcome.successes
                ),
                Format::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
        }
        Command::Compare {
            workload,
            allocators,
            format,
        } => {
            let format = parse_format(&format)?;
            let kinds = if allocators.is_empty() {
                AllocatorKind::available()
            } else {
                allocators
                    .iter()
                    .map(|name| AllocatorKind::from_str_loose(name))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let config = workload.config();
            let seed = workload.seed()?;
            let exe = std::env::current_exe()?;
            let report = compare::compare(&exe, &kinds, &config, seed)?;

            match format {
                Format::Plain | Format::Markdown => print!("{}", report.render_markdown()),
                Format::Json => println!("{}", report.to_json()?),
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(HarnessError::LogValidation {
                    path: log.display().to_string(),
                    violations: errors.len(),
                }
                .into());
            }
            println!("{}: {lines} line(s) valid", log.display());
        }
    }

    Ok(())
}

/// Hash the finished log into `<log>.index.json` and return the index path.
fn write_artifact_index(log_path: &Path, run_id: &str) -> Result<PathBuf, HarnessError> {
    let index_path = log_path.with_extension("index.json");
    let mut index = ArtifactIndex::new(run_id);
    index.add_file(log_path, "structured_log")?;
    std::fs::write(&index_path, index.to_json()?)?;
    Ok(index_path)
}
