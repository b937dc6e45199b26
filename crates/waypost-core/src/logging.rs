//! Logging for waypost.
//!
//! Two pieces live here:
//!
//! - [`setup_logging`] installs a [`tracing`] subscriber configured from
//!   [`Settings`]. The routing crates emit their diagnostics through `tracing`.
//! - [`FileLogWriter`] is the append-only, date-rotated log sink that
//!   applications hand batches of [`LogEntry`] values to. Each entry lands in
//!   `<dir>/YYYY/MM/DD.log` for the calendar day of its timestamp.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WaypostError, WaypostResult};
use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level`. In debug mode a pretty,
/// human-readable format is used; otherwise structured JSON.
/// Installing twice is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Severity of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A single log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// Formats the entry as one log line: `time --- LEVEL: message`.
    pub fn format_line(&self) -> String {
        format!(
            "{} --- {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// An append-only sink for log entries.
pub trait LogWriter: Send + Sync {
    /// Appends the given entries.
    fn write(&self, entries: &[LogEntry]) -> WaypostResult<()>;
}

/// Writes log entries to `<dir>/YYYY/MM/DD.log`, one line per entry.
///
/// The `YYYY/MM` sub-directories can be turned off, the per-day file name can
/// be replaced by a fixed one, and a header line can be written at the top of
/// every new file.
#[derive(Debug, Clone)]
pub struct FileLogWriter {
    dir: PathBuf,
    sub_directories: bool,
    filename: Option<String>,
    header: Option<String>,
}

impl FileLogWriter {
    /// Creates a writer rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dir` is not an existing directory.
    pub fn new(dir: impl Into<PathBuf>) -> WaypostResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(WaypostError::ConfigurationError(format!(
                "Log directory '{}' must exist and be a directory",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            sub_directories: true,
            filename: None,
            header: None,
        })
    }

    /// Enables or disables the `YYYY/MM/` directory structure.
    #[must_use]
    pub fn with_sub_directories(mut self, enabled: bool) -> Self {
        self.sub_directories = enabled;
        self
    }

    /// Writes every entry to `filename` instead of `DD.log`.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Writes `header` as the first line of each newly created file.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Returns the root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file entries for `date` are written to.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        let dir = if self.sub_directories {
            self.dir
                .join(date.format("%Y").to_string())
                .join(date.format("%m").to_string())
        } else {
            self.dir.clone()
        };
        match &self.filename {
            Some(name) => dir.join(name),
            None => dir.join(format!("{}.log", date.format("%d"))),
        }
    }

    fn open(&self, path: &Path) -> WaypostResult<fs::File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if is_new {
            if let Some(header) = &self.header {
                writeln!(file, "{header}")?;
            }
        }
        Ok(file)
    }
}

impl LogWriter for FileLogWriter {
    fn write(&self, entries: &[LogEntry]) -> WaypostResult<()> {
        // Consecutive entries for the same file share one open handle.
        let mut current: Option<(PathBuf, fs::File)> = None;

        for entry in entries {
            let path = self.path_for(entry.timestamp.date_naive());
            if current.as_ref().map(|(open_path, _)| open_path) != Some(&path) {
                let file = self.open(&path)?;
                current = Some((path, file));
            }
            if let Some((_, file)) = current.as_mut() {
                writeln!(file, "{}", entry.format_line())?;
            }
        }

        Ok(())
    }
}
