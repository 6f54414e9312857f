mod ingest;
mod reports;
mod util;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ingest::RecordFile;
use loyalty_engine::{LoyaltyEngine, LoyaltyPipeline, LoyaltyReport, RunConfig};
use reports::{ReportFormat, ReportWriter};
use util::parse_slot_queries;

/// Exit status when the report was written but the bonus pool could not be split.
const EXIT_UNDISTRIBUTABLE: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "loyalty-report", version)]
#[command(about = "Score player activity, rank the leaderboard and allocate the bonus pool")]
struct Args {
    /// Activity records: a JSON array or a CSV file with a header row
    #[arg(long)]
    records: PathBuf,

    /// Optional JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Slot queries to report (comma-separated DATE:SLOT, e.g. 2023-10-02:S1)
    #[arg(long)]
    slots: Option<String>,

    /// Bonus pool to distribute
    #[arg(long)]
    pool: Option<f64>,

    /// Number of top-ranked players sharing the pool
    #[arg(long)]
    cohort: Option<usize>,

    /// Reporting time zone offset from UTC, in minutes
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory receiving the slot, ranking and bonus CSV tables
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    announce_banner();

    let start_time = Instant::now();
    let config = resolve_config(&args)?;
    let pipeline = LoyaltyPipeline::new(config).context("invalid run configuration")?;
    let output_target = OutputTarget::new(args.output.clone());
    let sink = ReportWriter::new(args.report, output_target, args.export_dir.clone());
    let mut engine = LoyaltyEngine::new(RecordFile::new(&args.records), pipeline, sink);

    let report = engine
        .run()
        .with_context(|| format!("failed to report on {}", args.records.display()))?;
    announce_outcome(&args, &report, start_time);

    if !report.bonus.is_allocated() {
        std::process::exit(EXIT_UNDISTRIBUTABLE);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    eprintln!("{}", "🎯 Loyalty Report".bright_cyan().bold());
    eprintln!("{}", "=================".cyan());
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    if let Some(slots) = &args.slots {
        config.slot_queries = parse_slot_queries(slots).context("invalid --slots value")?;
    }
    if let Some(pool) = args.pool {
        config.bonus.pool = pool;
    }
    if let Some(cohort) = args.cohort {
        config.bonus.cohort_size = cohort;
    }
    if let Some(offset) = args.utc_offset_minutes {
        config.reporting_offset_minutes = offset;
    }
    log::debug!("resolved run configuration: {config:?}");
    Ok(config)
}

fn announce_outcome(args: &Args, report: &LoyaltyReport, start_time: Instant) {
    let players = report.summary.player_count.to_string();
    eprintln!(
        "✅ {} records, {} players processed at {}",
        report.summary.record_count,
        players.green(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(dir) = &args.export_dir {
        eprintln!("📁 CSV tables written to {}", dir.display());
    }
    if let Some(err) = report.bonus.failure() {
        eprintln!("⚠️  {}", err.to_string().yellow());
    }
    eprintln!("🏁 Total time: {:?}", start_time.elapsed());
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    /// Created on first write, so a run that fails early leaves the file alone.
    Pending(PathBuf),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Self {
        path.map_or_else(|| Self::Stdout(BufWriter::new(stdout())), Self::Pending)
    }

    fn writer(&mut self) -> io::Result<&mut dyn Write> {
        if let Self::Pending(path) = self {
            let file = File::create(&*path).map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!("failed to create {}: {err}", path.display()),
                )
            })?;
            *self = Self::File(BufWriter::new(file));
        }
        let writer: &mut dyn Write = match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
            Self::Pending(path) => {
                return Err(io::Error::other(format!(
                    "{} was never opened",
                    path.display()
                )));
            }
        };
        Ok(writer)
    }

    fn flush_inner(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
            Self::Pending(_) => Ok(()),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_inner()
    }
}
