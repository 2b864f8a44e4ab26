use std::path::PathBuf;

use cfgsync_logging::{LogConfig, RotationStrategy};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "cfgsync",
    about = "Synchronize vault customizations through a local document store"
)]
pub struct Cli {
    /// Vault root directory
    #[arg(long, default_value = ".")]
    pub vault: PathBuf,

    /// Document store log file
    #[arg(long, default_value = ".cfgsync/documents.jsonl")]
    pub db: PathBuf,

    /// Settings file (defaults to `.cfgsync/settings.json` inside the vault)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Device and vault name; saved to the settings file when given
    #[arg(long)]
    pub term: Option<String>,

    /// Answer "yes" to restart prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Human-readable log output instead of JSONL
    #[arg(long)]
    pub pretty: bool,

    /// Also write JSONL logs into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// When to start a new log file in `--log-dir`
    #[arg(long, value_enum, default_value_t = LogRotation::Daily)]
    pub log_rotation: LogRotation,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store every local customization and delete orphans of this device
    Scan,
    /// List every customization known to the store
    List,
    /// Write a stored customization to this vault
    Apply {
        /// Document key, e.g. `ix:desk/CONFIG/app.json.md`
        key: String,
    },
    /// Delete a customization from the store
    Delete { key: String },
    /// Merge two replicas of a customization into this vault
    Merge {
        /// Replica written to this vault
        left: String,
        right: String,
        #[arg(long, value_enum, default_value_t = MergePolicy::Decline)]
        policy: MergePolicy,
    },
    /// Watch the configuration folder and store changes as they happen
    Watch,
    /// Scan on a fixed interval until interrupted
    Sweep {
        /// Interval in seconds; defaults to the settings value
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Rewrite the document log, dropping superseded entries
    Compact,
}

/// How `merge` resolves two replicas without an interactive editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergePolicy {
    /// Make no decision; both replicas stay as they are
    Decline,
    /// Keep the left replica
    Left,
    /// Take the right replica
    Right,
    /// Take whichever replica was modified last
    Newer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// One file, truncated on every run
    Never,
}

impl From<LogRotation> for RotationStrategy {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => RotationStrategy::Daily,
            LogRotation::Hourly => RotationStrategy::Hourly,
            LogRotation::Never => RotationStrategy::Never,
        }
    }
}

impl Cli {
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| self.vault.join(".cfgsync").join("settings.json"))
    }

    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::default().with_verbosity(self.verbose);
        if self.pretty {
            config = config.pretty();
        }
        if let Some(dir) = &self.log_dir {
            config = config.with_log_dir(dir, self.log_rotation.into());
        }
        config
    }
}
