//! Configuration for the wdb session engine.
//!
//! Every section is optional in the TOML file; missing keys fall back to the
//! defaults below. [`init_tracing`] installs the process-wide `tracing`
//! subscriber described by [`LoggingConfig`].

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use url::Url;

/// Environment variable pointing at an explicit config file.
pub const WDB_CONFIG_ENV_VAR: &str = "WDB_CONFIG";

const DEFAULT_ISSUES_URL: &str = "https://github.com/Kozea/wdb/issues/new";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WdbConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr (in addition to the in-memory buffer).
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path. If the file cannot be opened, file
    /// logging is disabled while other sinks remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Number of log lines kept in memory for bug reports.
    #[serde(default = "LoggingConfig::default_buffer_lines")]
    pub buffer_lines: usize,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    fn default_buffer_lines() -> usize {
        500
    }

    /// Maps the level names accepted in config files onto `EnvFilter`
    /// levels. Anything else is passed through as a directive string.
    pub(crate) fn normalize_level_directives(input: &str) -> String {
        match input.trim().to_ascii_lowercase().as_str() {
            "" => Self::default_level(),
            "warning" => "warn".to_owned(),
            "critical" => "error".to_owned(),
            lower @ ("trace" | "debug" | "info" | "warn" | "error") => lower.to_owned(),
            _ => input.trim().to_owned(),
        }
    }

    /// The effective `EnvFilter`. `RUST_LOG` directives, when set, are
    /// appended to the configured level; an unparsable combination falls back
    /// to the configured level alone, then to `info`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        use tracing_subscriber::EnvFilter;

        let configured = Self::normalize_level_directives(&self.level);
        let from_env = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty());
        from_env
            .and_then(|env| EnvFilter::try_new(format!("{configured},{}", env.trim())).ok())
            .or_else(|| EnvFilter::try_new(&configured).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
            buffer_lines: Self::default_buffer_lines(),
        }
    }
}

/// Where source files named by breakpoints are looked up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Extra directories tried, in order, when a file does not resolve as given.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// "New issue" page linked from internal error diagnostics.
    #[serde(default = "ReportConfig::default_issues_url")]
    pub issues_url: Url,
}

impl ReportConfig {
    fn default_issues_url() -> Url {
        Url::parse(DEFAULT_ISSUES_URL).expect("default issues url should parse")
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            issues_url: Self::default_issues_url(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` carries a source snippet; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// Redacts quoted substrings so config values never end up in logs.
fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();
    static SINGLE_QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();

    let re = QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    let out = re.replace_all(message, r#""<redacted>""#).into_owned();

    let re_single = SINGLE_QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#"'(?:\\.|[^'\\])*'"#)
            .expect("single-quoted-string regex should compile")
    });
    re_single.replace_all(&out, "'<redacted>'").into_owned()
}

impl WdbConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Finds the config file for `dir`: `$WDB_CONFIG` first (relative paths are
/// resolved against `dir`), then `wdb.toml`, then `.wdb.toml`.
pub fn discover_config_path(dir: &Path) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(WDB_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            dir.join(candidate)
        };
        return Some(path);
    }

    ["wdb.toml", ".wdb.toml"]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Ring buffer of formatted log lines for bug reports.
///
/// `&LogBuffer` is itself a writer: every write is split into lines, so the
/// buffer can be handed to a `fmt` layer as `Arc<LogBuffer>`.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn push_line(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn last_lines(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}

impl Write for &LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .for_each(|line| self.push_line(line.to_owned()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

static TRACING_INIT: Once = Once::new();
static LOG_BUFFER: OnceLock<Arc<LogBuffer>> = OnceLock::new();

/// Installs the process-wide `tracing` subscriber described by `logging`.
///
/// Only the first call installs anything; later calls return the same buffer.
/// Lines always go to the returned buffer, plus stderr and the log file when
/// configured. A log file that cannot be opened is reported once and skipped.
pub fn init_tracing(logging: &LoggingConfig) -> Arc<LogBuffer> {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(LogBuffer::new(logging.buffer_lines)))
        .clone();

    TRACING_INIT.call_once(|| {
        let file = logging.file.as_ref().map(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Arc::new)
        });

        let mut writer = BoxMakeWriter::new(buffer.clone());
        if logging.stderr {
            writer = BoxMakeWriter::new(writer.and(std::io::stderr));
        }
        if let Some(Ok(file)) = &file {
            writer = BoxMakeWriter::new(writer.and(file.clone()));
        }

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if logging.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        };
        let installed = tracing_subscriber::registry()
            .with(logging.env_filter())
            .with(layer)
            .try_init()
            .is_ok();

        if let (true, Some(Err(err)), Some(path)) = (installed, &file, &logging.file) {
            tracing::warn!(
                target: "wdb.config",
                path = %path.display(),
                error = %err,
                "failed to open log file; file logging disabled"
            );
        }
    });

    buffer
}
