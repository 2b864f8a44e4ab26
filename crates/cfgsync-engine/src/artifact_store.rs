//! Moving artifacts between physical storage and the replicated store
//!
//! Writes and deletes of one logical key run under the same named scope,
//! so at most one mutation per key is in flight; different keys interleave.

use std::sync::Arc;

use cfgsync_core::{
    ArtifactBundle, ArtifactFile, Category, DocumentEntry, FileKind, KeyDeriver, LogicalKey,
    codec, parse_manifest,
};
use tracing::{debug, info, trace, warn};

use crate::context::{EngineContext, RESTART_PROMPT_TASK, artifact_scope};
use crate::error::{EngineError, EngineResult};
use crate::indexer::ListIndexer;

/// Result of storing the files of one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A new or changed document was written
    Stored,
    /// The stored document already had the same modification time
    Unchanged,
    /// No file of the artifact is left; its document was deleted
    Deleted,
}

fn now_millis() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

/// Reads, stores, applies and deletes artifacts
pub struct ArtifactStore {
    ctx: Arc<EngineContext>,
    indexer: Arc<ListIndexer>,
}

impl ArtifactStore {
    pub(crate) fn new(ctx: Arc<EngineContext>, indexer: Arc<ListIndexer>) -> Arc<Self> {
        Arc::new(Self { ctx, indexer })
    }

    /// Read one physical file; `None` when it is missing or unreadable
    pub async fn read_from_storage(&self, deriver: &KeyDeriver, path: &str) -> Option<ArtifactFile> {
        let stat = match self.ctx.storage.stat(path).await {
            Ok(Some(stat)) if stat.kind == FileKind::File => stat,
            Ok(_) => return None,
            Err(e) => {
                debug!(path, error = %e, "Could not stat customization file");
                return None;
            }
        };
        let bytes = match self.ctx.storage.read_binary(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path, error = %e, "The file could not be encoded");
                return None;
            }
        };

        let mut file = ArtifactFile {
            filename: deriver.filename_in_config(path),
            data: Some(codec::encode_chunks(&bytes)),
            mtime: stat.mtime,
            size: stat.size,
            version: None,
            display_name: None,
        };
        if KeyDeriver::is_manifest(path) {
            match parse_manifest(&bytes) {
                Ok(info) => {
                    file.version = info.version;
                    file.display_name = info.name;
                }
                Err(e) => {
                    info!(path, error = %e, "File looks like a manifest, but the version could not be read");
                }
            }
        }
        Some(file)
    }

    /// Store every file of the artifact `path` belongs to
    ///
    /// `term` overrides the configured term. The document is only written
    /// when its modification time differs from the stored one.
    pub async fn store_customization_files(
        &self,
        path: &str,
        term: Option<&str>,
    ) -> EngineResult<StoreOutcome> {
        let term = match term.filter(|t| !t.is_empty()) {
            Some(term) => term.to_string(),
            None => self.ctx.term()?,
        };
        let deriver = self.ctx.deriver();
        let category = deriver.classify(path);
        if !category.is_tracked() {
            return Err(EngineError::Untracked(path.to_string()));
        }
        let key = deriver.derive_key_as(category, path, &term);

        let outcome = {
            let _scope = self.ctx.scopes.lock(artifact_scope(&key)).await;
            self.store_locked(&deriver, category, path, term, &key).await?
        };
        if outcome != StoreOutcome::Unchanged {
            self.indexer.request_refresh(&key);
        }
        Ok(outcome)
    }

    async fn store_locked(
        &self,
        deriver: &KeyDeriver,
        category: Category,
        path: &str,
        term: String,
        key: &str,
    ) -> EngineResult<StoreOutcome> {
        let mut bundle = ArtifactBundle::new(category, deriver.artifact_name(category, path), term);
        for sibling in deriver.sibling_files_as(category, path) {
            match self.read_from_storage(deriver, &sibling).await {
                Some(file) => bundle.push_file(file),
                None => trace!(path = %sibling, "Skipped missing sibling"),
            }
        }

        if bundle.files.is_empty() {
            debug!(path, "Nothing left: deleting");
            return Ok(if self.delete_locked(key).await? {
                StoreOutcome::Deleted
            } else {
                StoreOutcome::Unchanged
            });
        }

        let existing = self.ctx.store.get_meta(key).await?.filter(|meta| !meta.deleted);
        if let Some(meta) = &existing
            && meta.mtime == bundle.mtime
        {
            trace!(key, "Customization not changed");
            return Ok(StoreOutcome::Unchanged);
        }

        bundle.document_path = Some(key.to_string());
        let body = codec::serialize(&bundle);
        let entry = DocumentEntry {
            path: key.to_string(),
            size: body.len() as u64,
            data: body,
            mtime: bundle.mtime,
            ctime: existing.map(|meta| meta.ctime).unwrap_or(bundle.mtime),
            deleted: false,
            conflicts: Vec::new(),
        };
        self.ctx.store.put(entry).await?;
        info!(key, files = bundle.files.len(), "STORAGE --> DB: customization stored");
        Ok(StoreOutcome::Stored)
    }

    /// Soft-delete a key; `false` when it was already absent or deleted
    pub async fn delete_config_on_database(&self, key: &str) -> EngineResult<bool> {
        let deleted = {
            let _scope = self.ctx.scopes.lock(artifact_scope(key)).await;
            self.delete_locked(key).await?
        };
        self.indexer.request_refresh(key);
        Ok(deleted)
    }

    async fn delete_locked(&self, key: &str) -> EngineResult<bool> {
        let Some(meta) = self.ctx.store.get_meta(key).await? else {
            debug!(key, "STORAGE -x> DB: already deleted (not found on database)");
            return Ok(false);
        };
        if meta.deleted {
            debug!(key, "STORAGE -x> DB: already deleted");
            return Ok(false);
        }
        self.ctx
            .store
            .put(DocumentEntry {
                path: key.to_string(),
                data: String::new(),
                mtime: now_millis(),
                ctime: meta.ctime,
                size: 0,
                deleted: true,
                conflicts: Vec::new(),
            })
            .await?;
        info!(key, "STORAGE -x> DB: customization deleted");
        Ok(true)
    }

    /// Load the stored bundle of a live key
    pub async fn load_bundle(&self, key: &str) -> EngineResult<Option<ArtifactBundle>> {
        let Some(entry) = self.ctx.store.get(key, false).await? else {
            return Ok(None);
        };
        let mut bundle = codec::try_deserialize(&entry.data)?;
        bundle.document_path = Some(key.to_string());
        Ok(Some(bundle))
    }

    /// Write a stored artifact back to physical storage
    ///
    /// The bundle only identifies the document; its stored version is what
    /// gets written. `override_content` replaces the primary file's content.
    pub async fn apply_data(
        &self,
        bundle: &ArtifactBundle,
        override_content: Option<&str>,
    ) -> EngineResult<()> {
        let key = bundle
            .document_path
            .as_deref()
            .ok_or(EngineError::MissingDocumentPath)?;
        self.apply_key(key, override_content).await
    }

    /// Write the artifact stored under `key` back to physical storage
    pub async fn apply_key(&self, key: &str, override_content: Option<&str>) -> EngineResult<()> {
        let bundle = self
            .load_bundle(key)
            .await?
            .ok_or_else(|| EngineError::not_found(key))?;
        let primary = bundle
            .primary_file()
            .map(|file| file.filename.clone())
            .ok_or_else(|| EngineError::EmptyArtifact(key.to_string()))?;
        let deriver = self.ctx.deriver();
        let label = bundle.label().to_string();
        info!(artifact = %label, "Applying customization");

        for (idx, file) in bundle.files.iter().enumerate() {
            let path = deriver.physical_path(&file.filename);
            let content = if idx == 0 { override_content } else { None };
            match self.write_file(&path, file, content).await {
                Ok(()) => debug!(path = %path, artifact = %label, "Applied file"),
                Err(e) => warn!(path = %path, artifact = %label, error = %e, "Applying file failed"),
            }
        }

        let primary_path = deriver.physical_path(&primary);
        if let Err(e) = self.store_customization_files(&primary_path, None).await {
            warn!(path = %primary_path, error = %e, "Could not store applied customization");
        }
        self.indexer.request_refresh(key);

        info!(artifact = %label, "Customization has been applied");
        self.ctx
            .host
            .notify(&format!("Config {label} has been applied"));
        self.after_apply(&deriver, &bundle).await;
        Ok(())
    }

    async fn write_file(
        &self,
        path: &str,
        file: &ArtifactFile,
        override_content: Option<&str>,
    ) -> EngineResult<()> {
        let dir = parent_of(path);
        if !dir.is_empty() {
            self.ctx.storage.ensure_dir(dir).await?;
        }
        match override_content {
            Some(text) => self.ctx.storage.write_text(path, text).await?,
            None => {
                let bytes = codec::decode_chunks(file.chunks())?;
                self.ctx.storage.write_binary(path, &bytes).await?
            }
        }
        Ok(())
    }

    /// Host-side effects of an apply: extension reload or restart prompt
    async fn after_apply(&self, deriver: &KeyDeriver, bundle: &ArtifactBundle) {
        match bundle.category {
            Category::PluginMain | Category::PluginData => {
                self.reload_extension(deriver, &bundle.name).await;
            }
            // Legacy names are `<plugin folder>/<file>`
            Category::PluginEtc => {
                let folder = bundle.name.split('/').next().unwrap_or(&bundle.name);
                self.reload_extension(deriver, folder).await;
            }
            Category::Config => self.schedule_restart_prompt(),
            Category::Theme | Category::Snippet | Category::Untracked => {}
        }
    }

    async fn reload_extension(&self, deriver: &KeyDeriver, name: &str) {
        let dir = deriver.plugin_dir(name);
        let host = &self.ctx.host;
        let Some(extension) = host
            .installed_extensions()
            .await
            .into_iter()
            .find(|ext| ext.enabled && ext.dir == dir)
        else {
            trace!(dir = %dir, "No enabled extension to reload");
            return;
        };

        info!(extension = %extension.name, "Unloading plugin");
        if let Err(e) = host.unload_extension(&extension.id).await {
            warn!(extension = %extension.id, error = %e, "Could not unload plugin");
            return;
        }
        match host.load_extension(&extension.id).await {
            Ok(()) => {
                info!(extension = %extension.name, "Plugin reloaded");
                host.notify(&format!("Plugin reloaded: {}", extension.name));
            }
            Err(e) => warn!(extension = %extension.id, error = %e, "Could not load plugin"),
        }
    }

    fn schedule_restart_prompt(&self) {
        let host = Arc::clone(&self.ctx.host);
        let command = self.ctx.config.restart_command.clone();
        self.ctx.scheduler.schedule(
            RESTART_PROMPT_TASK,
            self.ctx.config.restart_prompt_delay,
            move || async move {
                if host
                    .ask_yes_no("Do you want to restart and reload the application now?")
                    .await
                    && let Err(e) = host.execute_command(&command).await
                {
                    warn!(command = %command, error = %e, "Restart command failed");
                }
            },
        );
    }

    /// Key the artifact of `path` is stored under for the configured term
    pub fn key_for_path(&self, path: &str) -> EngineResult<Option<LogicalKey>> {
        let term = self.ctx.term()?;
        Ok(self.ctx.deriver().derive_key(path, &term))
    }
}
