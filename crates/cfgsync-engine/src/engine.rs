//! The `ConfigSync` facade
//!
//! Owns every engine component and exposes the caller surface: the
//! observable artifact list, user actions (apply, delete, compare, scan),
//! the raw-event hook, and lifecycle hooks of the host application. Every
//! action logs its failure and degrades to `false` rather than erroring.

use std::sync::Arc;
use std::time::Duration;

use cfgsync_core::{
    Adjudicator, ArtifactSummary, DocumentStore, HostApp, SYNC_PREFIX, SettingsStore,
    StorageAdapter, SyncSettings,
};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artifact_store::ArtifactStore;
use crate::config::EngineConfig;
use crate::context::{EngineContext, UPDATE_NOTICE_TASK};
use crate::error::{EngineError, EngineResult};
use crate::indexer::ListIndexer;
use crate::merge::MergeResolver;
use crate::scanner::{ReconciliationScanner, ScanReport};
use crate::schedule::{SerializedScopes, TaskScheduler};
use crate::sweep::PeriodicSweep;
use crate::watcher::{ChangeWatcher, WatchOutcome};

/// Customization sync engine
pub struct ConfigSync {
    ctx: Arc<EngineContext>,
    indexer: Arc<ListIndexer>,
    artifacts: Arc<ArtifactStore>,
    scanner: Arc<ReconciliationScanner>,
    watcher: ChangeWatcher,
    merger: MergeResolver,
    sweep: PeriodicSweep,
}

impl ConfigSync {
    /// Start building an engine
    pub fn builder() -> ConfigSyncBuilder {
        ConfigSyncBuilder::new()
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Snapshot of the current settings
    pub fn settings(&self) -> SyncSettings {
        self.ctx.settings()
    }

    /// Change settings in place; callers follow up with
    /// [`realize_setting_sync_mode`](Self::realize_setting_sync_mode) when
    /// the sync mode changed
    pub fn update_settings(&self, update: impl FnOnce(&mut SyncSettings)) {
        update(&mut self.ctx.settings.write());
    }

    /// Persist the current settings
    pub async fn save_settings(&self) -> bool {
        let settings = self.ctx.settings();
        match self.ctx.settings_store.save(&settings).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Could not save settings");
                false
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    // ---------------------------------------------------------------------
    // Observables
    // ---------------------------------------------------------------------

    /// Current artifact list
    pub fn artifact_list(&self) -> Arc<Vec<ArtifactSummary>> {
        self.indexer.current()
    }

    pub fn subscribe_list(&self) -> watch::Receiver<Arc<Vec<ArtifactSummary>>> {
        self.indexer.subscribe()
    }

    pub fn is_enumerating(&self) -> bool {
        self.indexer.is_enumerating()
    }

    pub fn subscribe_enumerating(&self) -> watch::Receiver<bool> {
        self.indexer.subscribe_enumerating()
    }

    /// Direct access to the list indexer
    pub fn indexer(&self) -> &Arc<ListIndexer> {
        &self.indexer
    }

    /// Direct access to the artifact store
    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    // ---------------------------------------------------------------------
    // User actions
    // ---------------------------------------------------------------------

    /// Log a failure; configuration problems are also shown to the user
    fn report(&self, action: &str, error: &EngineError) {
        if error.is_configuration_required() {
            warn!("We have to configure the device name");
            self.ctx.host.notify("We have to configure the device name");
        } else {
            warn!(action, error = %error, "Customization sync action failed");
        }
    }

    /// Clear the list and rebuild it from scratch
    pub fn reload_plugin_list(&self, show_message: bool) -> Option<JoinHandle<()>> {
        self.indexer.reload(show_message)
    }

    /// Request a rebuild, or a refresh of a single key
    pub fn update_plugin_list(
        &self,
        show_message: bool,
        updated_key: Option<&str>,
    ) -> Option<JoinHandle<()>> {
        match updated_key {
            Some(key) => self.indexer.request_refresh(key),
            None => self.indexer.request_rebuild(show_message),
        }
    }

    /// Write a stored artifact back to this device
    pub async fn apply_data(&self, summary: &ArtifactSummary) -> bool {
        match self.artifacts.apply_key(&summary.document_path, None).await {
            Ok(()) => true,
            Err(e) => {
                warn!(artifact = summary.label(), "Applying customization failed");
                self.report("apply", &e);
                false
            }
        }
    }

    /// Delete an artifact from the store
    pub async fn delete_data(&self, summary: &ArtifactSummary) -> bool {
        match self
            .artifacts
            .delete_config_on_database(&summary.document_path)
            .await
        {
            Ok(_) => {
                info!(key = %summary.document_path, "Delete");
                true
            }
            Err(e) => {
                self.report("delete", &e);
                false
            }
        }
    }

    /// Merge two replicas of an artifact through the adjudicator
    pub async fn compare_using_display_data(
        &self,
        a: &ArtifactSummary,
        b: &ArtifactSummary,
    ) -> bool {
        match self.merger.compare(a, b).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Could not apply merged file");
                self.report("merge", &e);
                false
            }
        }
    }

    /// Reconcile every local customization file with the store
    pub async fn scan_all_config_files(&self, show_message: bool) -> Option<ScanReport> {
        match self.scanner.scan_all(show_message).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.report("scan", &e);
                None
            }
        }
    }

    /// Store the artifact a single path belongs to
    pub async fn store_customization_files(&self, path: &str) -> bool {
        match self.artifacts.store_customization_files(path, None).await {
            Ok(outcome) => {
                debug!(path, ?outcome, "Customization stored");
                true
            }
            Err(e) => {
                self.report("store", &e);
                false
            }
        }
    }

    /// Feed a raw file-change event
    pub async fn watch_vault_raw_events(&self, path: &str) -> WatchOutcome {
        self.watcher.on_raw_file_event(path).await
    }

    // ---------------------------------------------------------------------
    // Periodic sweep and lifecycle
    // ---------------------------------------------------------------------

    pub fn enable_periodic_sweep(&self, interval: Duration) {
        self.sweep.enable(interval);
    }

    pub fn disable_periodic_sweep(&self) {
        self.sweep.disable();
    }

    pub fn is_periodic_sweep_running(&self) -> bool {
        self.sweep.is_running()
    }

    /// Interval the sweep should run at under the current settings
    fn sweep_interval(&self) -> Duration {
        let settings = self.ctx.settings.read();
        if settings.auto_sweep_plugins_periodic && !settings.watch_internal_file_changes {
            Duration::from_secs(settings.periodic_sweep_interval_secs)
        } else {
            Duration::ZERO
        }
    }

    /// Bring scanning and the periodic sweep in line with the settings
    pub async fn realize_setting_sync_mode(&self) {
        self.sweep.disable();
        let settings = self.ctx.settings();
        if settings.suspended || !settings.use_plugin_sync {
            return;
        }
        if settings.auto_sweep_plugins {
            self.scan_all_config_files(false).await;
        }
        self.sweep.enable(self.sweep_interval());
    }

    /// The local database was (re)initialized
    pub async fn on_initialize_database(&self, show_message: bool) {
        if !self.ctx.sync_enabled() {
            return;
        }
        info!("Scanning customizations...");
        match self.scanner.scan_all(show_message).await {
            Ok(_) => info!("Scanning customizations : done"),
            Err(e) => {
                warn!("Scanning customizations : failed");
                self.report("scan", &e);
            }
        }
    }

    /// Replication is about to start
    pub async fn before_replicate(&self, show_message: bool) {
        let settings = self.ctx.settings();
        if settings.auto_sweep_plugins && settings.use_plugin_sync {
            self.scan_all_config_files(show_message).await;
        }
    }

    /// The host application came back to the foreground
    pub async fn on_resume(&self) {
        let settings = self.ctx.settings();
        if settings.suspended {
            return;
        }
        if settings.auto_sweep_plugins && settings.use_plugin_sync {
            self.scan_all_config_files(false).await;
        }
        self.sweep.enable(self.sweep_interval());
    }

    /// Wait until every debounced follow-up (list refreshes, notices,
    /// restart prompts) has run
    pub async fn wait_idle(&self) {
        self.ctx.scheduler.idle().await;
    }

    /// A document arrived through replication; `true` when it is ours
    pub fn on_replicated_document(&self, path: &str) -> bool {
        if !path.starts_with(SYNC_PREFIX) {
            return false;
        }
        let settings = self.ctx.settings();
        if !settings.use_plugin_sync {
            return true;
        }
        self.indexer.request_refresh(path);

        if settings.notify_plugin_or_setting_updated {
            let host = Arc::clone(&self.ctx.host);
            self.ctx.scheduler.schedule(
                UPDATE_NOTICE_TASK,
                self.ctx.config.update_notice_delay,
                move || async move {
                    host.notify("Some configuration has arrived; open the customization sync dialog to review it");
                },
            );
        }
        true
    }
}

/// Builder assembling a [`ConfigSync`] from its collaborators
#[derive(Default)]
pub struct ConfigSyncBuilder {
    settings: SyncSettings,
    config: EngineConfig,
    store: Option<Arc<dyn DocumentStore>>,
    storage: Option<Arc<dyn StorageAdapter>>,
    host: Option<Arc<dyn HostApp>>,
    adjudicator: Option<Arc<dyn Adjudicator>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
}

impl ConfigSyncBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn host(mut self, host: Arc<dyn HostApp>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn adjudicator(mut self, adjudicator: Arc<dyn Adjudicator>) -> Self {
        self.adjudicator = Some(adjudicator);
        self
    }

    pub fn settings_store(mut self, settings_store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(settings_store);
        self
    }

    /// Assemble the engine; fails when a collaborator is missing
    pub fn build(self) -> EngineResult<ConfigSync> {
        let ctx = Arc::new(EngineContext {
            store: self
                .store
                .ok_or(EngineError::MissingCollaborator("document store"))?,
            storage: self
                .storage
                .ok_or(EngineError::MissingCollaborator("storage adapter"))?,
            host: self.host.ok_or(EngineError::MissingCollaborator("host"))?,
            settings_store: self
                .settings_store
                .ok_or(EngineError::MissingCollaborator("settings store"))?,
            settings: RwLock::new(self.settings),
            config: self.config,
            scheduler: TaskScheduler::new(),
            scopes: SerializedScopes::new(),
        });
        let adjudicator = self
            .adjudicator
            .ok_or(EngineError::MissingCollaborator("adjudicator"))?;

        let indexer = ListIndexer::new(Arc::clone(&ctx));
        let artifacts = ArtifactStore::new(Arc::clone(&ctx), Arc::clone(&indexer));
        let scanner =
            ReconciliationScanner::new(Arc::clone(&ctx), Arc::clone(&artifacts), Arc::clone(&indexer));
        let watcher = ChangeWatcher::new(Arc::clone(&ctx), Arc::clone(&artifacts));
        let merger = MergeResolver::new(
            Arc::clone(&ctx),
            Arc::clone(&artifacts),
            Arc::clone(&indexer),
            adjudicator,
        );
        let sweep = PeriodicSweep::new(Arc::clone(&scanner));

        Ok(ConfigSync {
            ctx,
            indexer,
            artifacts,
            scanner,
            watcher,
            merger,
            sweep,
        })
    }
}
