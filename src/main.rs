mod diagnostics;
mod fetch;
mod models;
mod normalize;
mod scheduler;
mod source;
mod store;
mod tui;

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use clap::Parser;

use diagnostics::{DiagnosticsLog, Severity};
use fetch::{CycleOutcome, Fetcher};
use scheduler::Poller;
use source::HttpSource;
use store::FeedStore;

const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Watch a live job feed - poll, normalize, and browse postings")]
struct Cli {
    /// Base address of the jobs API (default: $JOBS_API_BASE, then a local address)
    #[arg(long)]
    api_base: Option<String>,

    /// Run one fetch cycle, print the results, and exit
    #[arg(long)]
    once: bool,
}

fn resolve_api_base(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("JOBS_API_BASE").ok())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api_base = resolve_api_base(cli.api_base);

    let store = Arc::new(Mutex::new(FeedStore::new()));
    let diagnostics = Arc::new(Mutex::new(DiagnosticsLog::new()));
    let source = HttpSource::new(&api_base)?;
    let fetcher = Arc::new(Fetcher::new(
        source,
        Arc::clone(&store),
        Arc::clone(&diagnostics),
    ));

    if cli.once {
        return run_once(&fetcher, &store, &diagnostics).await;
    }

    let mut poller = Poller::new();
    poller.start(Arc::clone(&fetcher), Arc::clone(&diagnostics));

    // The TUI owns the terminal on a blocking thread; the runtime keeps
    // driving the poll loop underneath it.
    let runtime = tokio::runtime::Handle::current();
    let ui = tokio::task::spawn_blocking({
        let store = Arc::clone(&store);
        let diagnostics = Arc::clone(&diagnostics);
        let fetcher = Arc::clone(&fetcher);
        move || tui::run(store, diagnostics, fetcher, runtime)
    });
    let result = ui.await?;

    poller.stop();
    result
}

async fn run_once(
    fetcher: &Fetcher<HttpSource>,
    store: &Arc<Mutex<FeedStore>>,
    diagnostics: &Arc<Mutex<DiagnosticsLog>>,
) -> Result<()> {
    let outcome = fetcher.run_cycle().await;

    for entry in diagnostics
        .lock()
        .expect("diagnostics lock poisoned")
        .entries()
    {
        let mark = match entry.severity {
            Severity::Error => "x",
            Severity::Success => "+",
            Severity::Info => ".",
        };
        println!(
            "{mark} [{}] {}",
            entry.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
            entry.message
        );
    }
    println!();

    match outcome {
        CycleOutcome::Completed { .. } => {
            let jobs = store.lock().expect("feed store lock poisoned").sorted_jobs();
            if jobs.is_empty() {
                println!("No jobs available right now.");
            } else {
                println!(
                    "{:<12} {:<30} {:<22} {:>8} {:<20}",
                    "ID", "TITLE", "COMPANY", "POSTED", "SALARY"
                );
                println!("{}", "-".repeat(96));
                for job in &jobs {
                    println!(
                        "{:<12} {:<30} {:<22} {:>7}d {:<20}",
                        truncate(&job.id, 10),
                        truncate(&job.title, 28),
                        truncate(&job.company, 20),
                        job.posted_days_ago,
                        truncate(&job.salary, 18)
                    );
                }
            }
            Ok(())
        }
        CycleOutcome::Failed { message } => bail!("Could not load jobs: {message}"),
        CycleOutcome::Skipped => Ok(()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
