mod cli;
mod host;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cfgsync_core::{ArtifactSummary, SyncSettings};
use cfgsync_engine::ConfigSync;
use cfgsync_logging::{CfgSyncSubscriberBuilder, DeviceContextGuard};
use cfgsync_storage::{JsonFileDocumentStore, JsonSettingsFile, LocalStorage};
use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Command, MergePolicy};
use crate::host::{ConsoleHost, PolicyAdjudicator};
use crate::watch::ConfigFolderWatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = CfgSyncSubscriberBuilder::new()
        .with_config(cli.log_config())
        .init();

    let settings_file = JsonSettingsFile::new(cli.settings_path());
    let mut settings = settings_file
        .load()
        .await
        .with_context(|| format!("reading {}", settings_file.path().display()))?;
    let term_changed = apply_overrides(&mut settings, &cli);
    let _device = DeviceContextGuard::new(settings.device_and_vault_name.clone());

    let store = Arc::new(
        JsonFileDocumentStore::open(&cli.db)
            .await
            .with_context(|| format!("opening {}", cli.db.display()))?,
    );
    let host = Arc::new(ConsoleHost::new(&cli.vault, settings.config_dir.clone(), cli.yes));
    let policy = merge_policy(&cli.command);
    let config_dir = settings.config_dir.clone();
    let default_sweep = settings.periodic_sweep_interval_secs;

    let sync = ConfigSync::builder()
        .settings(settings)
        .document_store(store.clone())
        .storage(Arc::new(LocalStorage::new(&cli.vault)))
        .host(host.clone())
        .adjudicator(Arc::new(PolicyAdjudicator::new(policy)))
        .settings_store(Arc::new(settings_file))
        .build()?;

    if term_changed && !sync.save_settings().await {
        warn!("Device name not saved");
    }

    match cli.command {
        Command::Scan => {
            let report = sync
                .scan_all_config_files(true)
                .await
                .ok_or_else(|| anyhow!("scan failed"))?;
            println!(
                "stored {}, unchanged {}, deleted {}, failed {}",
                report.stored, report.unchanged, report.deleted, report.failed
            );
        }

        Command::List => {
            sync.indexer().rebuild_now(true).await?;
            let mut list: Vec<ArtifactSummary> = sync.artifact_list().iter().cloned().collect();
            list.sort_by(|a, b| a.document_path.cmp(&b.document_path));
            for summary in &list {
                println!("{}", describe(summary));
            }
            println!("{} customizations", list.len());
        }

        Command::Apply { key } => {
            let summary = find(&sync, &key).await?;
            if !sync.apply_data(&summary).await {
                bail!("could not apply {key}");
            }
            println!("Applied {}", summary.label());
        }

        Command::Delete { key } => {
            let summary = find(&sync, &key).await?;
            if !sync.delete_data(&summary).await {
                bail!("could not delete {key}");
            }
            println!("Deleted {key}");
        }

        Command::Merge { left, right, .. } => {
            let a = find(&sync, &left).await?;
            let b = find(&sync, &right).await?;
            if sync.compare_using_display_data(&a, &b).await {
                println!("Merged {} into this vault", a.label());
            } else {
                println!("Nothing merged");
            }
        }

        Command::Watch => {
            sync.update_settings(|s| s.watch_internal_file_changes = true);
            sync.on_initialize_database(true).await;
            sync.realize_setting_sync_mode().await;

            let mut watcher = ConfigFolderWatcher::start(&cli.vault, &config_dir)?;
            println!("Watching for changes, press Ctrl-C to stop");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = watcher.next() => {
                        let Some(path) = changed else { break };
                        let outcome = sync.watch_vault_raw_events(&path).await;
                        tracing::debug!(path = %path, ?outcome, "Raw file event");
                    }
                }
            }
        }

        Command::Sweep { interval } => {
            let secs = interval.unwrap_or(default_sweep);
            if secs == 0 {
                bail!("sweep interval must be positive");
            }
            sync.enable_periodic_sweep(Duration::from_secs(secs));
            info!(interval_secs = secs, "Sweeping, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            sync.disable_periodic_sweep();
        }

        Command::Compact => {
            store.compact().await?;
            println!("Compacted {} documents", store.len());
        }
    }

    sync.wait_idle().await;
    store.flush().await?;
    if host.restart_requested() {
        info!("Restart requested by an applied setting");
    }
    Ok(())
}

/// Apply command-line overrides; `true` when the term changed
fn apply_overrides(settings: &mut SyncSettings, cli: &Cli) -> bool {
    settings.use_plugin_sync = true;
    match &cli.term {
        Some(term) if *term != settings.device_and_vault_name => {
            settings.device_and_vault_name = term.clone();
            true
        }
        _ => false,
    }
}

/// Policy of the `merge` adjudicator; every other command declines
fn merge_policy(command: &Command) -> MergePolicy {
    match command {
        Command::Merge { policy, .. } => *policy,
        _ => MergePolicy::Decline,
    }
}

/// Look up a customization by key in a freshly built list
async fn find(sync: &ConfigSync, key: &str) -> Result<ArtifactSummary> {
    sync.indexer().rebuild_now(false).await?;
    sync.indexer()
        .get(key)
        .ok_or_else(|| anyhow!("no customization stored under {key}"))
}

fn describe(summary: &ArtifactSummary) -> String {
    let modified = chrono::DateTime::from_timestamp_millis(summary.mtime as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let version = summary
        .version
        .as_deref()
        .map(|v| format!(" v{v}"))
        .unwrap_or_default();
    format!(
        "{}  {}{}  {} file(s)  {}",
        summary.document_path,
        summary.label(),
        version,
        summary.files.len(),
        modified
    )
}
