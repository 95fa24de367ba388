//! Structured JSONL logging.
//!
//! Nothing here writes to stdout, which carries the activity report (and
//! `--json` output). Logs go to a file, or to stderr if no file is writable.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::Field;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "GHPULSE_LOG_PATH";
const ENV_LOG_DIR: &str = "GHPULSE_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// HTTP stack crates that are only interesting at `-vv`.
const QUIET_AT_DEBUG: &[&str] = &["hyper_util", "hyper", "h2", "reqwest", "rustls"];

/// Where logs should go, before any filesystem checks.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name; also the log file stem.
    pub service: String,
    /// Exact log file path (`GHPULSE_LOG_PATH`).
    pub log_path: Option<PathBuf>,
    /// Log directory (`GHPULSE_LOG_DIR`, else `log_dir` from config).
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Read the environment, falling back to the configured directory.
    pub fn from_env_with_overrides(config_log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_path: std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
            log_dir: std::env::var_os(ENV_LOG_DIR)
                .map(PathBuf::from)
                .or(config_log_dir),
        }
    }

    fn file_name(&self) -> String {
        format!("{}{LOG_FILE_SUFFIX}", self.service)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

/// Keeps the background log writer alive; flushes on drop.
pub struct ObservabilityGuard {
    _log_guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Currently infallible: an unwritable log location degrades to stderr.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match resolve_log_target(cfg).map(|t| file_writer(&t)) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("warning: {err:#}; logging to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer { writer })
        .init();

    tracing::debug!(service = %cfg.service, "logging initialized");

    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Filter from CLI flags and environment.
///
/// `-q` wins over `-v`, which wins over `RUST_LOG`, which wins over the
/// configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new(debug_directives()),
        _ => EnvFilter::new("trace"),
    }
}

fn debug_directives() -> String {
    std::iter::once("debug".to_string())
        .chain(QUIET_AT_DEBUG.iter().map(|krate| format!("{krate}=info")))
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// JSON Log Layer
// ============================================================================

struct JsonLogLayer<W> {
    writer: W,
}

#[derive(Clone, Debug)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(timestamp()));
        line.insert("level".into(), meta.level().as_str().to_lowercase().into());
        line.insert("target".into(), meta.target().into());

        if let Some(scope) = ctx.event_scope(event) {
            let mut names = Vec::new();
            for span in scope.from_root() {
                names.push(Value::from(span.name()));
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    line.extend(fields.0.clone());
                }
            }
            line.insert("spans".into(), Value::Array(names));
        }

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        line.extend(fields.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(line)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

impl tracing::field::Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON representation.
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, n);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Log Target Resolution
// ============================================================================

fn file_writer(target: &LogTarget) -> (NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    tracing_appender::non_blocking(appender)
}

/// `GHPULSE_LOG_PATH`, then the configured directory, then the per-user
/// data directory, then the working directory.
fn resolve_log_target(cfg: &ObservabilityConfig) -> Result<LogTarget> {
    if let Some(ref path) = cfg.log_path {
        return target_from_path(path);
    }

    let file_name = cfg.file_name();
    if let Some(ref dir) = cfg.log_dir {
        return writable(dir.clone(), file_name);
    }

    let candidates = ghpulse_core::config::user_data_local_dir()
        .map(|dir| dir.join("logs").into_std_path_buf())
        .into_iter()
        .chain(std::env::current_dir().ok());

    for dir in candidates {
        if let Ok(target) = writable(dir, file_name.clone()) {
            return Ok(target);
        }
    }

    bail!("no writable log directory found")
}

fn target_from_path(path: &Path) -> Result<LogTarget> {
    let Some(file_name) = path.file_name() else {
        bail!("{ENV_LOG_PATH} must include a file name");
    };
    let Some(file_name) = file_name.to_str() else {
        bail!("{ENV_LOG_PATH} must be valid UTF-8");
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    writable(dir, file_name.to_string())
}

fn writable(dir: PathBuf, file_name: String) -> Result<LogTarget> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let path = dir.join(&file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    Ok(LogTarget { dir, file_name })
}
