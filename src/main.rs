use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tracing::{info, warn};

use cigar_screener::config::Settings;
use cigar_screener::engine::types::{MarketStats, ScreeningCriteria};
use cigar_screener::market_data::adapters::eastmoney::EastmoneyDirectoryClient;
use cigar_screener::market_data::directory::SymbolDirectory;
use cigar_screener::persist::export::{ConsoleTable, CsvExport};
use cigar_screener::persist::{PersistResult, ResultSink};
use cigar_screener::pipeline::{run_guarded, Pipeline, RunReport, RunStatus};
use cigar_screener::telemetry;

/// Rows echoed to the terminal for the diagnostic table.
const DIAGNOSTIC_PREVIEW: usize = 20;

#[derive(Parser)]
#[command(name = "cigar-screener", about = "A-share cigar-butt value screener")]
struct Cli {
    /// Settings file (TOML). Defaults to config/default.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one screen, print the result and save candidates as CSV
    Scan {
        #[command(flatten)]
        params: CriteriaArgs,
        /// Where to write the candidate CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Filter ST/delisting names on the quote itself instead of joining the symbol directory
        #[arg(long)]
        no_directory: bool,
    },
    /// Load (or force refresh) the cached symbol directory
    Directory {
        #[arg(long)]
        refresh: bool,
    },
    /// Interactive session: set thresholds, run, inspect, export
    Interactive {
        #[arg(long)]
        no_directory: bool,
    },
}

#[derive(clap::Args, Default)]
struct CriteriaArgs {
    /// Maximum price-to-book
    #[arg(long)]
    pb_max: Option<f64>,
    /// Maximum price-to-earnings
    #[arg(long)]
    pe_max: Option<f64>,
    /// Minimum market cap, in 亿 (hundred-million yuan)
    #[arg(long)]
    mcap_min: Option<f64>,
}

impl CriteriaArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(v) = self.pb_max {
            settings.criteria.pb_max = v;
        }
        if let Some(v) = self.pe_max {
            settings.criteria.pe_max = v;
        }
        if let Some(v) = self.mcap_min {
            settings.criteria.market_cap_min_yi = v;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    telemetry::init_tracing(&settings.logging.filter);
    telemetry::init_metrics()?;

    match cli.command.unwrap_or(Command::Interactive { no_directory: false }) {
        Command::Scan { params, output, no_directory } => {
            params.apply(&mut settings);
            if let Some(path) = output {
                settings.output.path = path.to_string_lossy().into_owned();
            }
            run_scan(&settings, !no_directory && settings.screening.use_directory).await
        }
        Command::Directory { refresh } => show_directory(&settings, refresh).await,
        Command::Interactive { no_directory } => {
            let use_directory = !no_directory && settings.screening.use_directory;
            run_interactive(settings, use_directory).await
        }
    }
}

async fn run_scan(settings: &Settings, use_directory: bool) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_settings(settings, use_directory)?);
    let criteria: ScreeningCriteria = settings.criteria.into();

    let report = run_guarded(pipeline, criteria).await;
    print_report(&report)?;

    if report.has_candidates() {
        let sink = CsvExport::new(&settings.output.path);
        sink.write(&report.candidates)?;
        println!("✅ Saved {} candidates to {}", report.candidates.len(), sink.path().display());
    }
    Ok(())
}

async fn show_directory(settings: &Settings, refresh: bool) -> anyhow::Result<()> {
    let listing = Arc::new(EastmoneyDirectoryClient::new(&settings.directory)?);
    let directory = SymbolDirectory::new(listing, &settings.directory);

    let entries = if refresh {
        directory.refresh_directory().await?
    } else {
        directory.load_directory().await?
    };

    let mut boards = std::collections::BTreeMap::new();
    for entry in &entries {
        *boards.entry(entry.board()).or_insert(0usize) += 1;
    }

    println!("Symbol directory: {} entries ({})", entries.len(), settings.directory.cache_path);
    for (board, count) in boards {
        println!("  {:<8} {}", board.label(), count);
    }
    Ok(())
}

fn print_report(report: &RunReport) -> PersistResult<()> {
    let c = &report.criteria;
    println!(
        "\nCriteria: PB ≤ {}, PE ≤ {}, market cap > {}亿",
        c.pb_max,
        c.pe_max,
        c.market_cap_min_yi()
    );

    match &report.status {
        RunStatus::Completed => {
            println!("✅ Found {} cigar-butt candidates:", report.candidates.len());
            ConsoleTable { limit: None }.write(&report.candidates)?;
        }
        RunStatus::NoCandidates => {
            println!("❌ No stock passed the screen. Lowest PB in the market:");
            ConsoleTable { limit: Some(DIAGNOSTIC_PREVIEW) }.write(&report.diagnostic)?;
        }
        RunStatus::NoData => println!("❌ Could not fetch any quotes"),
        RunStatus::Failed(message) => println!("❌ Analysis failed: {message}"),
    }

    if let Some(stats) = &report.stats {
        print_stats(stats);
    }
    println!("⏱️ Elapsed: {:.2}s", report.elapsed.as_secs_f64());
    Ok(())
}

fn print_stats(stats: &MarketStats) {
    let pe = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    println!("\n=== Market Stats ===");
    println!("Stocks screened: {}", stats.total);
    println!("Candidates: {}", stats.candidates);
    println!("PB range: {:.3} ~ {:.3}", stats.pb_min, stats.pb_max);
    println!("PE range: {} ~ {}", pe(stats.pe_min), pe(stats.pe_max));
    println!("Mean PB: {:.3}", stats.pb_mean);
    println!("Mean PE: {}", pe(stats.pe_mean));
    println!("====================");
}

/// Interactive session state. `running` stands in for a disabled start
/// button; `last` holds the most recent report until cleared.
struct Session {
    settings: Settings,
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    last: Arc<Mutex<Option<RunReport>>>,
}

impl Session {
    fn criteria(&self) -> ScreeningCriteria {
        self.settings.criteria.into()
    }

    fn start_run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            println!("An analysis is already running, check `status`.");
            return;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let last = Arc::clone(&self.last);
        let criteria = self.criteria();

        tokio::spawn(async move {
            let report = run_guarded(pipeline, criteria).await;
            info!(status = ?report.status, candidates = report.candidates.len(), "Background analysis done");
            *last.lock() = Some(report);
            running.store(false, Ordering::SeqCst);
        });
        println!("Analysis started in the background. Type `status` or `results`.");
    }

    fn set_param(&mut self, name: &str, value: &str) {
        let Ok(v) = value.parse::<f64>() else {
            println!("Invalid number: {value}");
            return;
        };
        match name {
            "pb" => self.settings.criteria.pb_max = v,
            "pe" => self.settings.criteria.pe_max = v,
            "mcap" => self.settings.criteria.market_cap_min_yi = v,
            _ => {
                println!("Unknown parameter `{name}` (use pb, pe or mcap)");
                return;
            }
        }
        self.print_params();
    }

    fn print_params(&self) {
        let c = &self.settings.criteria;
        println!("PB ≤ {}  PE ≤ {}  market cap > {}亿", c.pb_max, c.pe_max, c.market_cap_min_yi);
    }

    fn export(&self, path: Option<&str>) {
        let guard = self.last.lock();
        let Some(report) = guard.as_ref().filter(|r| r.has_candidates()) else {
            println!("Nothing to export.");
            return;
        };
        let sink = CsvExport::new(path.unwrap_or(self.settings.output.path.as_str()));
        match sink.write(&report.candidates) {
            Ok(()) => println!("✅ Saved {} rows to {}", report.candidates.len(), sink.path().display()),
            Err(e) => {
                warn!(error = %e, "Export failed");
                println!("❌ Export failed: {e}");
            }
        }
    }
}

async fn run_interactive(settings: Settings, use_directory: bool) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_settings(&settings, use_directory)?);
    let mut session = Session {
        settings,
        pipeline,
        running: Arc::new(AtomicBool::new(false)),
        last: Arc::new(Mutex::new(None)),
    };
    session.print_params();

    // CLI loop
    loop {
        print!("\nscreener> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        match parts.as_slice() {
            ["help"] | ["h"] => {
                println!("Available commands:");
                println!("  set pb|pe|mcap <value> - Change a threshold (mcap in 亿)");
                println!("  params                 - Show current thresholds");
                println!("  run                    - Start an analysis in the background");
                println!("  status                 - Is an analysis running?");
                println!("  results                - Show the last report");
                println!("  stats                  - Show market stats of the last report");
                println!("  export [path]          - Save candidates as CSV");
                println!("  clear                  - Forget the last report");
                println!("  quit, q                - Exit");
            }
            ["set", name, value] => session.set_param(name, value),
            ["params"] => session.print_params(),
            ["run"] => session.start_run(),
            ["status"] => {
                if session.running.load(Ordering::SeqCst) {
                    println!("Analysis running...");
                } else if let Some(report) = session.last.lock().as_ref() {
                    println!("Idle. Last run: {:?}, {:.2}s", report.status, report.elapsed.as_secs_f64());
                } else {
                    println!("Idle. No analysis yet.");
                }
            }
            ["results"] => match session.last.lock().as_ref() {
                Some(report) => print_report(report)?,
                None => println!("No results yet."),
            },
            ["stats"] => match session.last.lock().as_ref().and_then(|r| r.stats.as_ref()) {
                Some(stats) => print_stats(stats),
                None => println!("No stats available."),
            },
            ["export"] => session.export(None),
            ["export", path] => session.export(Some(*path)),
            ["clear"] => {
                *session.last.lock() = None;
                println!("Results cleared.");
            }
            ["quit"] | ["q"] | ["exit"] => {
                println!("Goodbye!");
                break;
            }
            [] => continue,
            _ => println!("Unknown command. Type 'help' for available commands."),
        }
    }

    Ok(())
}
