use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use funnel::pipeline::stages::{CTA_CLICK, GUIDE_BIND, GUIDE_PAGE_VIEW, GUIDE_RESULT, LANDING_LAUNCH};
use funnel::{parse_date_bound, render_summary, run_stage, DateRange, PipelineConfig, StageSpec};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "FUNNEL_LOG";

#[derive(Parser)]
#[command(name = "funnel")]
#[command(about = "Filter, validate and dedupe event-log exports into funnel CSVs")]
#[command(version)]
struct Cli {
    /// Debug mode - log processing details to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Landing launches, deduped by invitation code
    #[command(alias = "app_landing_launch")]
    Step1(StageArgs),

    /// CTA clicks, deduped by invitation code
    #[command(alias = "pwa_cta_click")]
    Step2(StageArgs),

    /// Guide page views, deduped by user
    #[command(alias = "guide_page_view")]
    Step3(StageArgs),

    /// Guide bind attempts, merged per user
    #[command(alias = "guide_bind")]
    Step4(StageArgs),

    /// Guide results, deduped by user
    #[command(alias = "guide_result")]
    Step5(StageArgs),
}

impl Command {
    fn stage(&self) -> (&'static StageSpec, &StageArgs) {
        match self {
            Command::Step1(args) => (&LANDING_LAUNCH, args),
            Command::Step2(args) => (&CTA_CLICK, args),
            Command::Step3(args) => (&GUIDE_PAGE_VIEW, args),
            Command::Step4(args) => (&GUIDE_BIND, args),
            Command::Step5(args) => (&GUIDE_RESULT, args),
        }
    }
}

#[derive(Args)]
struct StageArgs {
    /// Input export (JSON array, wrapped array or JSON lines)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output CSV path
    #[arg(long = "out-csv", value_name = "PATH")]
    out_csv: Option<PathBuf>,

    /// Output summary JSON path
    #[arg(long = "out-summary", value_name = "PATH")]
    out_summary: Option<PathBuf>,

    /// Keep records on or after this date (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(long = "date-start", value_name = "DATE")]
    date_start: Option<String>,

    /// Keep records on or before this date (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(long = "date-end", value_name = "DATE")]
    date_end: Option<String>,
}

impl StageArgs {
    fn date_range(&self) -> DateRange {
        DateRange::new(
            date_bound("--date-start", self.date_start.as_deref()),
            date_bound("--date-end", self.date_end.as_deref()),
        )
    }
}

/// An unparseable bound leaves that side of the range open.
fn date_bound(flag: &str, text: Option<&str>) -> Option<chrono::NaiveDate> {
    let text = text?;
    let parsed = parse_date_bound(text);
    if parsed.is_none() && !text.trim().is_empty() {
        warn!(flag, value = text, "ignoring unparseable date bound");
    }
    parsed
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("funnel: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (stage, args) = cli.command.stage();

    let config = PipelineConfig::for_stage(stage)
        .with_input(args.input.clone())
        .with_output_csv(args.out_csv.clone())
        .with_output_summary(args.out_summary.clone())
        .with_range(args.date_range());

    let report = run_stage(stage, &config).with_context(|| format!("{} failed", stage.name))?;

    let text = render_summary(&report.summary)?;
    println!("{}", text);
    Ok(())
}
