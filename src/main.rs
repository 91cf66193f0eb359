mod browser;
mod enrich;
mod error;
mod filter;
mod output;
mod parser;
mod pipeline;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use browser::Browser;
use parser::PageParser;
use pipeline::{Champion, Pipeline, RunReport, TargetOutcome};
use settings::{Backend, FetchSettings, Settings};

#[derive(Parser)]
#[command(name = "champion_scraper", about = "Customer champion scraper for vendor case-study pages")]
struct Cli {
    /// Settings file (TOML). Defaults to ./champions.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all targets, enrich, filter and write the output file
    Run {
        /// Output file (default: champions.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the unfiltered aggregate here
        #[arg(long)]
        aggregate_output: Option<PathBuf>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// List configured targets in scrape order
    Targets,
    /// Fetch one page and show what would be extracted (no enrichment, nothing written)
    Inspect {
        url: String,
        #[command(flatten)]
        fetch: FetchArgs,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Page fetch backend
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Per-navigation timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long, env = "BROWSERLESS_URL")]
    browserless_url: Option<String>,
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    browserless_token: Option<String>,
}

impl FetchArgs {
    fn apply(self, fetch: &mut FetchSettings) {
        if let Some(b) = self.backend {
            fetch.backend = b;
        }
        if let Some(t) = self.timeout_secs {
            fetch.timeout_secs = t;
        }
        if self.browserless_url.is_some() {
            fetch.browserless_url = self.browserless_url;
        }
        if self.browserless_token.is_some() {
            fetch.browserless_token = self.browserless_token;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Targets => {
            for (i, t) in settings.targets.iter().enumerate() {
                println!("{:>3} | {:<16} | {}", i + 1, truncate(&t.name, 16), t.url);
            }
            Ok(())
        }
        Commands::Inspect { url, fetch } => {
            fetch.apply(&mut settings.fetch);
            let pipeline = build_pipeline(&settings)?;
            let page = pipeline.browser().open(&url).await?;
            let parsed = pipeline.parser().parse(&page);
            println!("{} ({} bytes)\n", page.url(), page.html().len());

            println!("{:>3} | {:<24} | {:<32} | {:<24}", "#", "Name", "Role", "Company");
            println!("{}", "-".repeat(92));
            for (i, r) in parsed.extraction.records.iter().enumerate() {
                println!(
                    "{:>3} | {:<24} | {:<32} | {:<24}",
                    i + 1,
                    truncate(&r.name, 24),
                    truncate(&r.role, 32),
                    truncate(&r.company, 24)
                );
            }
            println!(
                "\n{} records, {} blocks skipped",
                parsed.extraction.records.len(),
                parsed.extraction.skipped
            );
            if !parsed.links.is_empty() {
                println!("\n--- Enrichment links ---");
                for link in &parsed.links {
                    println!("  {}", link);
                }
            }
            Ok(())
        }
        Commands::Run {
            output,
            aggregate_output,
            fetch,
        } => {
            fetch.apply(&mut settings.fetch);
            let output = output.unwrap_or_else(|| settings.output.clone());

            let pb = ProgressBar::new(settings.targets.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            let pipeline = build_pipeline(&settings)?.with_progress(pb);

            let run = pipeline.run(&settings.targets).await;
            print_report(&run.report);

            let kept = settings.filter.apply(&run.champions);
            println!(
                "{} of {} champions passed the filter",
                kept.len(),
                run.champions.len()
            );

            persist(&output, &kept, run.champions.len())?;
            println!("Scraped and filtered champions saved to {}", output.display());

            if let Some(ref path) = aggregate_output {
                persist(path, &run.champions, run.champions.len())?;
                println!("Unfiltered aggregate saved to {}", path.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let browser = Browser::from_settings(&settings.fetch)?;
    let parser = PageParser::new(&settings.selectors, &settings.enrichment)?;
    Ok(Pipeline::new(browser, parser, &settings.enrichment))
}

/// Every write goes through here so a failed one is always reported as lost output.
fn persist(path: &Path, champions: &[Champion], computed: usize) -> anyhow::Result<()> {
    output::write_champions(path, champions).map_err(|e| {
        error!(
            "Output NOT written to {}: {} champions ({} in this file) were computed and discarded",
            path.display(),
            computed,
            champions.len()
        );
        anyhow::Error::new(e).context(format!("Failed to persist champions to {}", path.display()))
    })
}

fn print_report(report: &RunReport) {
    println!(
        "{:<16} | {:>7} | {:>7} | {:>5} | {:>8}",
        "Target", "Records", "Skipped", "Links", "Enr.fail"
    );
    println!("{}", "-".repeat(56));

    for outcome in &report.outcomes {
        match outcome {
            TargetOutcome::Scraped(r) => println!(
                "{:<16} | {:>7} | {:>7} | {:>5} | {:>8}",
                truncate(&r.target, 16),
                r.records,
                r.skipped_blocks,
                r.links,
                r.enrichment_failures
            ),
            TargetOutcome::Failed { target, error } => {
                println!("{:<16} | FAILED: {}", truncate(target, 16), error)
            }
        }
    }

    println!(
        "\n{} targets ({} failed) | {} blocks skipped | peak {} browsing contexts",
        report.outcomes.len(),
        report.failed(),
        report.skipped_blocks(),
        report.peak_contexts
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
