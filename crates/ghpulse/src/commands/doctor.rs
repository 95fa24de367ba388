//! Doctor command — diagnose configuration, credentials, and environment.

use std::io::IsTerminal;

use camino::Utf8Path;
use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use ghpulse_core::config::{self, Config};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ok,
    Warn,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: Status,
    detail: String,
}

impl Check {
    fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: Status::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: Status::Warn,
            detail: detail.into(),
        }
    }
}

#[derive(Serialize)]
struct DoctorReport {
    checks: Vec<Check>,
    directories: DirectoryPaths,
    environment: Vec<EnvVar>,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    /// Value, or `"(set)"` for secrets.
    value: Option<String>,
}

const SECRET_VARS: &[&str] = &["GITHUB_TOKEN"];

const PLAIN_VARS: &[&str] = &[
    "GHPULSE_LOG_PATH",
    "GHPULSE_LOG_DIR",
    "RUST_LOG",
    "XDG_CONFIG_HOME",
    "XDG_CACHE_HOME",
];

impl DoctorReport {
    fn gather(cwd: &Utf8Path, config: &Config, env: impl Fn(&str) -> Option<String>) -> Self {
        let environment = SECRET_VARS
            .iter()
            .map(|&name| EnvVar {
                name,
                value: env(name).filter(|v| !v.trim().is_empty()).map(|_| "(set)".into()),
            })
            .chain(PLAIN_VARS.iter().map(|&name| EnvVar {
                name,
                value: env(name),
            }))
            .collect();

        Self {
            checks: checks(cwd, config, env("GITHUB_TOKEN").is_some_and(|t| !t.trim().is_empty())),
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            environment,
        }
    }

    fn has_config_file(&self) -> bool {
        self.checks
            .iter()
            .any(|c| c.name == "config file" && c.status == Status::Ok)
    }
}

fn checks(cwd: &Utf8Path, config: &Config, token_in_env: bool) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match config::find_project_config(cwd) {
        Some(path) => Check::ok("config file", path.to_string()),
        None => Check::warn("config file", "none found; using defaults"),
    });

    checks.push(if token_in_env {
        Check::ok("token", "GITHUB_TOKEN is set")
    } else if config.github.token().is_some() {
        Check::ok("token", "configured in github.token")
    } else {
        Check::warn(
            "token",
            "not configured; anonymous requests are limited to 60 per hour",
        )
    });

    checks.push(
        match url_scheme(&config.github.api_url) {
            Some("https") => Check::ok("api url", config.github.api_url.clone()),
            Some("http") => Check::warn(
                "api url",
                format!("{} is not using TLS", config.github.api_url),
            ),
            _ => Check::warn(
                "api url",
                format!("{} does not look like an http(s) URL", config.github.api_url),
            ),
        },
    );

    checks.push(match config.activity.concurrency {
        0 => Check::warn("concurrency", "0 is treated as 1"),
        n => Check::ok("concurrency", format!("{n} repositories at once")),
    });

    checks.push(match config.activity.window_days {
        0 => Check::warn("window", "0 days covers today only"),
        n => Check::ok("window", format!("{n} days before today")),
    });

    checks
}

fn url_scheme(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output = global_json))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!("executing doctor command");

    let report = DoctorReport::gather(cwd, config, |name| std::env::var(name).ok());

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Checks".bold().underline());
    for check in &report.checks {
        let mark = match check.status {
            Status::Ok => "✓".green().to_string(),
            Status::Warn => "○".yellow().to_string(),
        };
        println!("  {mark} {}: {}", check.name.dimmed(), check.detail);
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    let set: Vec<_> = report
        .environment
        .iter()
        .filter_map(|v| v.value.as_deref().map(|value| (v.name, value)))
        .collect();
    if set.is_empty() {
        println!("  {} No token, logging, or XDG overrides set", "○".dimmed());
    }
    for (name, value) in set {
        println!("  {}: {}", name.dimmed(), value.cyan());
    }

    if !report.has_config_file() {
        offer_config_creation()?;
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to write the default configuration to the user config directory.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yaml");

    if config_path.exists() || !std::io::stdin().is_terminal() {
        return Ok(());
    }

    println!();
    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt()
        .unwrap_or(false);

    if create {
        std::fs::create_dir_all(&config_dir)?;
        let yaml = serde_saphyr::to_string(&Config::default())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn find<'a>(report: &'a DoctorReport, name: &str) -> &'a Check {
        report.checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn missing_token_is_a_warning() {
        let report = DoctorReport::gather(Utf8Path::new("/nonexistent"), &Config::default(), no_env);
        assert_eq!(find(&report, "token").status, Status::Warn);
        assert_eq!(find(&report, "config file").status, Status::Warn);
        assert_eq!(find(&report, "api url").status, Status::Ok);
    }

    #[test]
    fn token_value_is_never_reported() {
        let report = DoctorReport::gather(Utf8Path::new("/nonexistent"), &Config::default(), |name| {
            (name == "GITHUB_TOKEN").then(|| "ghp_secret".to_string())
        });

        assert_eq!(find(&report, "token").status, Status::Ok);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("ghp_secret"));
        assert!(json.contains("(set)"));
    }

    #[test]
    fn configured_token_counts() {
        let mut config = Config::default();
        config.github.token = Some("ghp_file".into());
        let report = DoctorReport::gather(Utf8Path::new("/nonexistent"), &config, no_env);
        assert_eq!(find(&report, "token").status, Status::Ok);
        assert!(!serde_json::to_string(&report).unwrap().contains("ghp_file"));
    }

    #[test]
    fn plain_http_and_zero_concurrency_warn() {
        let mut config = Config::default();
        config.github.api_url = "http://localhost:8080".into();
        config.activity.concurrency = 0;
        let report = DoctorReport::gather(Utf8Path::new("/nonexistent"), &config, no_env);
        assert_eq!(find(&report, "api url").status, Status::Warn);
        assert_eq!(find(&report, "concurrency").status, Status::Warn);
    }

    #[test]
    fn project_config_is_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        std::fs::write(dir.join(".ghpulse.toml"), "").unwrap();

        let report = DoctorReport::gather(dir, &Config::default(), no_env);
        assert!(report.has_config_file());
    }

    #[test]
    fn cmd_doctor_json_succeeds() {
        let cwd = camino::Utf8PathBuf::from("/tmp");
        assert!(cmd_doctor(DoctorArgs::default(), true, &Config::default(), &cwd).is_ok());
    }
}
