//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cfgsync_core::{
    Adjudicator, ArtifactBundle, ArtifactFile, Category, DocumentEntry, DocumentMeta,
    DocumentStore, HostApp, HostError, InstalledExtension, MergeSide, RangeQuery, SettingsError,
    SettingsStore, StoreError, SyncSettings, codec, key_for,
};
use cfgsync_engine::{ConfigSync, EngineConfig};
use cfgsync_storage::{InMemoryDocumentStore, MemoryStorage};
use parking_lot::Mutex;

pub const CLOCK_ORIGIN: u64 = 1_700_000_000_000;

// ============================================================================
// Recording fakes
// ============================================================================

/// Host that records every call
#[derive(Default)]
pub struct RecordingHost {
    pub extensions: Mutex<Vec<InstalledExtension>>,
    pub unloaded: Mutex<Vec<String>>,
    pub loaded: Mutex<Vec<String>>,
    pub commands: Mutex<Vec<String>>,
    pub notices: Mutex<Vec<String>>,
    pub questions: AtomicUsize,
    pub answer_yes: AtomicBool,
}

impl RecordingHost {
    pub fn with_extension(self, id: &str, dir: &str, enabled: bool) -> Self {
        self.extensions.lock().push(InstalledExtension {
            id: id.to_string(),
            name: id.to_uppercase(),
            dir: dir.to_string(),
            enabled,
        });
        self
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl HostApp for RecordingHost {
    async fn installed_extensions(&self) -> Vec<InstalledExtension> {
        self.extensions.lock().clone()
    }

    async fn unload_extension(&self, id: &str) -> Result<(), HostError> {
        self.unloaded.lock().push(id.to_string());
        Ok(())
    }

    async fn load_extension(&self, id: &str) -> Result<(), HostError> {
        self.loaded.lock().push(id.to_string());
        Ok(())
    }

    async fn execute_command(&self, command_id: &str) -> Result<(), HostError> {
        self.commands.lock().push(command_id.to_string());
        Ok(())
    }

    async fn ask_yes_no(&self, _message: &str) -> bool {
        self.questions.fetch_add(1, Ordering::SeqCst);
        self.answer_yes.load(Ordering::SeqCst)
    }

    fn notify(&self, message: &str) {
        self.notices.lock().push(message.to_string());
    }
}

/// Adjudicator returning a scripted answer and recording what it saw
#[derive(Default)]
pub struct ScriptedAdjudicator {
    pub answer: Mutex<Option<String>>,
    pub seen: Mutex<Vec<(String, MergeSide, MergeSide)>>,
}

impl ScriptedAdjudicator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Mutex::new(Some(answer.to_string())),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Adjudicator for ScriptedAdjudicator {
    async fn resolve(
        &self,
        display_path: &str,
        left: &MergeSide,
        right: &MergeSide,
    ) -> Option<String> {
        self.seen
            .lock()
            .push((display_path.to_string(), left.clone(), right.clone()));
        self.answer.lock().clone()
    }
}

/// Settings store keeping every saved snapshot
#[derive(Default)]
pub struct RecordingSettingsStore {
    pub saved: Mutex<Vec<SyncSettings>>,
}

#[async_trait]
impl SettingsStore for RecordingSettingsStore {
    async fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError> {
        self.saved.lock().push(settings.clone());
        Ok(())
    }
}

/// Document store counting concurrent `get` calls and overlapping `put`s per key
pub struct CountingStore {
    pub inner: InMemoryDocumentStore,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub gets: AtomicUsize,
    puts_in_flight: Mutex<HashMap<String, usize>>,
    pub max_puts_per_key: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            puts_in_flight: Mutex::new(HashMap::new()),
            max_puts_per_key: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn get(
        &self,
        path: &str,
        with_conflicts: bool,
    ) -> Result<Option<DocumentEntry>, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.gets.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let result = self.inner.get(path, with_conflicts).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_meta(&self, path: &str) -> Result<Option<DocumentMeta>, StoreError> {
        self.inner.get_meta(path).await
    }

    async fn put(&self, entry: DocumentEntry) -> Result<(), StoreError> {
        let key = entry.path.clone();
        let now = {
            let mut in_flight = self.puts_in_flight.lock();
            let count = in_flight.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.max_puts_per_key.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = self.inner.put(entry).await;
        if let Some(count) = self.puts_in_flight.lock().get_mut(&key) {
            *count -= 1;
        }
        result
    }

    async fn find_entries(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        self.inner.find_entries(query).await
    }

    async fn all_docs_raw(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        self.inner.all_docs_raw(query).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub sync: ConfigSync,
    pub store: Arc<InMemoryDocumentStore>,
    pub storage: Arc<MemoryStorage>,
    pub host: Arc<RecordingHost>,
    pub adjudicator: Arc<ScriptedAdjudicator>,
    pub settings_store: Arc<RecordingSettingsStore>,
}

impl Harness {
    pub fn new(settings: SyncSettings) -> Self {
        Self::with_parts(settings, RecordingHost::default(), ScriptedAdjudicator::default())
    }

    pub fn for_term(term: &str) -> Self {
        Self::new(SyncSettings::for_term(term))
    }

    pub fn with_config(settings: SyncSettings, config: EngineConfig) -> Self {
        Self::build(
            settings,
            config,
            RecordingHost::default(),
            ScriptedAdjudicator::default(),
        )
    }

    pub fn with_parts(
        settings: SyncSettings,
        host: RecordingHost,
        adjudicator: ScriptedAdjudicator,
    ) -> Self {
        Self::build(settings, EngineConfig::testing(), host, adjudicator)
    }

    fn build(
        settings: SyncSettings,
        config: EngineConfig,
        host: RecordingHost,
        adjudicator: ScriptedAdjudicator,
    ) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let storage = Arc::new(MemoryStorage::with_clock(CLOCK_ORIGIN));
        let host = Arc::new(host);
        let adjudicator = Arc::new(adjudicator);
        let settings_store = Arc::new(RecordingSettingsStore::default());

        let sync = ConfigSync::builder()
            .settings(settings)
            .config(config)
            .document_store(store.clone())
            .storage(storage.clone())
            .host(host.clone())
            .adjudicator(adjudicator.clone())
            .settings_store(settings_store.clone())
            .build()
            .expect("all collaborators provided");

        Self {
            sync,
            store,
            storage,
            host,
            adjudicator,
            settings_store,
        }
    }
}

/// Put a single-file bundle written by another device straight into the store
pub async fn put_foreign_bundle(
    store: &dyn DocumentStore,
    category: Category,
    name: &str,
    term: &str,
    filename: &str,
    content: &[u8],
    mtime: f64,
) -> String {
    let key = key_for(category, name, term);
    let mut bundle = ArtifactBundle::new(category, name, term);
    bundle.push_file(ArtifactFile {
        filename: filename.to_string(),
        data: Some(codec::encode_chunks(content)),
        mtime,
        size: content.len() as u64,
        ..Default::default()
    });
    let body = codec::serialize(&bundle);
    store
        .put(DocumentEntry::new(key.clone(), body, mtime))
        .await
        .expect("put foreign bundle");
    key
}
