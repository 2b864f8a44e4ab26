//! What the cfgsync subscriber writes, and where

use std::path::PathBuf;

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Human-readable lines
    Pretty,
    /// No console output
    Off,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleFormat,
    /// Colors on pretty console output
    pub ansi: bool,
    /// Rotated JSONL files, in addition to the console
    pub file: Option<FileConfig>,
    /// Source file and line on JSONL records
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Jsonl,
            ansi: false,
            file: None,
            include_location: true,
        }
    }
}

impl LogConfig {
    /// Level for a `-v` count: info, then debug, then trace
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string();
        self
    }

    /// Human-readable, colored console output
    pub fn pretty(mut self) -> Self {
        self.console = ConsoleFormat::Pretty;
        self.ansi = true;
        self
    }

    /// Also write JSONL files into `dir`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>, rotation: RotationStrategy) -> Self {
        self.file = Some(FileConfig::new(dir, rotation));
        self
    }
}

/// Log file location and retention
#[derive(Debug, Clone, PartialEq)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; rotated files get a date suffix
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files kept before the oldest is removed
    pub max_files: Option<usize>,
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>, rotation: RotationStrategy) -> Self {
        Self {
            directory: directory.into(),
            prefix: "cfgsync".to_string(),
            rotation,
            max_files: match rotation {
                RotationStrategy::Never => None,
                _ => Some(14),
            },
        }
    }
}

/// When a new log file is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// Single file, truncated on start
    Never,
}
