//! Activity command — aggregate and print daily commit activity.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use ghpulse_core::activity::{ActivityEvent, ActivityPipeline, ActivityReport, ActivityRequest};
use ghpulse_core::aggregate::DayBucket;
use ghpulse_core::config::Config;
use ghpulse_core::repos::Repository;

/// Width of the per-day bar, in characters, for the busiest day.
const BAR_WIDTH: usize = 24;

/// Arguments for the `activity` subcommand.
#[derive(Args, Debug, Default)]
pub struct ActivityArgs {
    /// Account to analyze (prompted for when omitted in a terminal)
    pub account: Option<String>,

    /// Days before today to include [default: activity.window_days]
    #[arg(short, long, value_name = "N")]
    pub days: Option<u64>,

    /// Token for the upstream API [default: github.token]
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repositories processed at once [default: activity.concurrency]
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// API root, e.g. for GitHub Enterprise [default: github.api_url]
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,
}

impl ActivityArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(days) = self.days {
            config.activity.window_days = days;
        }
        if let Some(workers) = self.concurrency {
            config.activity.concurrency = workers;
        }
        if let Some(ref url) = self.api_url {
            config.github.api_url.clone_from(url);
        }
        if let Some(ref token) = self.token {
            config.github.token = Some(token.clone());
        }
        config
    }
}

/// Compute and print activity for an account.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `quiet` - Global `--quiet` flag; suppresses the progress bar
/// * `config` - Loaded configuration
#[instrument(name = "cmd_activity", skip_all, fields(json_output = global_json))]
pub fn cmd_activity(
    args: ActivityArgs,
    global_json: bool,
    quiet: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let account = resolve_account(args.account.as_deref(), global_json)?;
    let config = args.apply(config);
    debug!(
        %account,
        days = config.activity.window_days,
        concurrency = config.activity.concurrency,
        api_url = %config.github.api_url,
        "executing activity command"
    );

    let pipeline = ActivityPipeline::from_config(&config)?;
    let request = ActivityRequest::new(account.clone(), config.activity.window_days);

    let progress = if global_json || quiet || !std::io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        progress_bar()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(async {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = tokio::spawn(track_progress(rx, progress.clone()));
        let result = pipeline.run(&request, Some(tx)).await;
        let _ = tracker.await;
        result
    });
    progress.finish_and_clear();

    let report = result.with_context(|| format!("could not compute activity for '{account}'"))?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn resolve_account(given: Option<&str>, global_json: bool) -> anyhow::Result<String> {
    if let Some(account) = given.map(str::trim).filter(|a| !a.is_empty()) {
        return Ok(account.to_string());
    }

    if global_json || !std::io::stdin().is_terminal() {
        anyhow::bail!("no account given; pass one as `ghpulse activity <ACCOUNT>`");
    }

    let account = inquire::Text::new("GitHub username:")
        .with_help_message("Whose repositories should be analyzed?")
        .prompt()
        .context("account prompt cancelled")?;
    let account = account.trim();
    if account.is_empty() {
        anyhow::bail!("no account given");
    }
    Ok(account.to_string())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
    );
    bar.set_message("Listing repositories...");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn track_progress(mut rx: mpsc::UnboundedReceiver<ActivityEvent>, bar: ProgressBar) {
    while let Some(event) = rx.recv().await {
        match event {
            ActivityEvent::RepositoriesListed { count } => {
                bar.set_length(count as u64);
                bar.set_message("Aggregating commits");
            }
            ActivityEvent::RepositoryFinished { repository, commits } => {
                bar.inc(1);
                debug!(%repository, commits, "repository finished");
            }
            ActivityEvent::Diagnostic(diagnostic) => {
                debug!(%diagnostic, "diagnostic received");
            }
        }
    }
}

fn print_report(report: &ActivityReport) {
    println!(
        "{} {} {}",
        "Activity for".bold(),
        report.account.cyan().bold(),
        format!("({} → {})", report.window.start(), report.window.end()).dimmed()
    );
    println!();

    let peak = report.days.iter().map(|d| d.count).max().unwrap_or(0);
    for day in &report.days {
        print_day(day, peak);
    }

    println!();
    println!("{}", "Summary".bold().underline());
    println!(
        "  {}: {} across {} active day(s)",
        "Commits".dimmed(),
        report.total_commits().to_string().bold(),
        report.active_days()
    );
    println!(
        "  {}: {} {}",
        "Lines".dimmed(),
        format!("+{}", report.total_additions()).green(),
        format!("-{}", report.total_deletions()).red()
    );
    println!("  {}: {}", "Repositories".dimmed(), report.repositories.len());

    if !report.repositories.is_empty() {
        println!();
        println!("{}", "Repositories".bold().underline());
        for repository in &report.repositories {
            print_repository(repository);
        }
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!(
            "{} {}",
            "Partial data".yellow().bold(),
            format!("({} issue(s))", report.diagnostics.len()).dimmed()
        );
        for diagnostic in &report.diagnostics {
            println!("  {} {}", "!".yellow(), diagnostic);
        }
    }
}

fn print_day(day: &DayBucket, peak: u64) {
    if day.count == 0 {
        println!("  {}", format!("{}  {:>4}", day.date, 0).dimmed());
        return;
    }

    let busiest = day
        .busiest_repository()
        .map(|(name, n)| format!("{name} ×{n}"))
        .unwrap_or_default();
    println!(
        "  {}  {:>4}  {}  {:>8} {:>8}  {}",
        day.date,
        day.count.bold(),
        bar(day.count, peak, BAR_WIDTH).cyan(),
        format!("+{}", day.additions).green(),
        format!("-{}", day.deletions).red(),
        busiest.dimmed()
    );
}

fn print_repository(repository: &Repository) {
    println!(
        "  {}  {}",
        repository.name.bold(),
        repository_facts(repository).dimmed()
    );
    let description = repository.description.as_deref().map(str::trim);
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        println!("    {description}");
    }
    if !repository.html_url.is_empty() {
        println!("    {}", repository.html_url.cyan());
    }
}

/// Language, stars, forks and last update, joined for a one-line summary.
fn repository_facts(repository: &Repository) -> String {
    let mut facts = Vec::new();
    if let Some(ref language) = repository.language {
        facts.push(language.clone());
    }
    facts.push(format!("★ {}", repository.stargazers_count));
    facts.push(format!("{} fork(s)", repository.forks_count));
    if let Some(updated) = repository.updated_at {
        facts.push(format!("updated {}", updated.date_naive()));
    }
    facts.join(" · ")
}

/// Bar of `width` cells scaled so that `peak` fills it; never empty for
/// a non-zero count.
fn bar(count: u64, peak: u64, width: usize) -> String {
    if count == 0 || peak == 0 {
        return " ".repeat(width);
    }
    let cells = ((count * width as u64).div_ceil(peak) as usize).clamp(1, width);
    format!("{}{}", "█".repeat(cells), " ".repeat(width - cells))
}
