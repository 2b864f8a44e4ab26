//! End-to-end tests of the customization sync engine
//!
//! Every test drives a `ConfigSync` wired to in-memory collaborators.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cfgsync_core::{
    Category, DocumentStore, ExtendedSyncSetting, StorageAdapter, SyncMode, SyncSettings, codec,
};
use cfgsync_engine::{ConfigSync, EngineConfig, EngineError, StoreOutcome, WatchOutcome};
use cfgsync_storage::MemoryStorage;
use common::*;

// ============================================================================
// Storing
// ============================================================================

#[tokio::test]
async fn test_store_config_file_and_index_it() {
    let h = Harness::for_term("laptop");
    h.storage.insert(".obsidian/appearance.json", r#"{"theme":"obsidian"}"#);

    assert!(h.sync.store_customization_files(".obsidian/appearance.json").await);

    let key = "ix:laptop/CONFIG/appearance.json.md";
    assert!(h.store.get(key, false).await.unwrap().is_some());

    h.sync.indexer().rebuild_now(false).await.unwrap();
    let list = h.sync.artifact_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].document_path, key);
    assert_eq!(list[0].category, Category::Config);
    assert_eq!(list[0].display_name, None);
    assert!(!h.sync.is_enumerating());
}

#[tokio::test]
async fn test_plugin_folder_becomes_one_bundle() {
    let h = Harness::for_term("laptop");
    h.storage.insert(
        ".obsidian/plugins/foo/manifest.json",
        r#"{"id":"foo","name":"Foo","version":"1.2"}"#,
    );
    h.storage.insert(".obsidian/plugins/foo/main.js", "module.exports = {}");
    h.storage.insert(".obsidian/plugins/foo/styles.css", ".foo {}");

    let outcome = h
        .sync
        .artifacts()
        .store_customization_files(".obsidian/plugins/foo/styles.css", None)
        .await
        .unwrap();
    assert_eq!(outcome, StoreOutcome::Stored);

    let bundle = h
        .sync
        .artifacts()
        .load_bundle("ix:laptop/PLUGIN_MAIN/foo.md")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bundle.category, Category::PluginMain);
    assert_eq!(bundle.name, "foo");
    assert_eq!(bundle.display_name.as_deref(), Some("Foo"));
    assert_eq!(bundle.version.as_deref(), Some("1.2"));
    assert_eq!(bundle.files.len(), 3);
    assert_eq!(bundle.files[0].filename, "plugins/foo/manifest.json");
}

#[tokio::test]
async fn test_store_twice_writes_once() {
    let h = Harness::for_term("laptop");
    h.storage.insert(".obsidian/snippets/wide.css", ".wide {}");

    let artifacts = h.sync.artifacts();
    let first = artifacts
        .store_customization_files(".obsidian/snippets/wide.css", None)
        .await
        .unwrap();
    let second = artifacts
        .store_customization_files(".obsidian/snippets/wide.css", None)
        .await
        .unwrap();

    assert_eq!(first, StoreOutcome::Stored);
    assert_eq!(second, StoreOutcome::Unchanged);
    assert_eq!(h.store.put_count(), 1);
}

#[tokio::test]
async fn test_update_preserves_ctime() {
    let h = Harness::for_term("laptop");
    let path = ".obsidian/app.json";
    let key = "ix:laptop/CONFIG/app.json.md";
    h.storage.insert(path, "{}");
    h.sync.artifacts().store_customization_files(path, None).await.unwrap();
    let created = h.store.get(key, false).await.unwrap().unwrap();

    h.storage.insert(path, r#"{"a":1}"#);
    let outcome = h.sync.artifacts().store_customization_files(path, None).await.unwrap();
    assert_eq!(outcome, StoreOutcome::Stored);

    let updated = h.store.get(key, false).await.unwrap().unwrap();
    assert_eq!(updated.ctime, created.ctime);
    assert!(updated.mtime > created.mtime);
}

#[tokio::test]
async fn test_missing_term_aborts_without_writes() {
    let settings = SyncSettings {
        use_plugin_sync: true,
        ..Default::default()
    };
    let h = Harness::new(settings);
    h.storage.insert(".obsidian/app.json", "{}");

    let result = h
        .sync
        .artifacts()
        .store_customization_files(".obsidian/app.json", None)
        .await;
    assert!(matches!(result, Err(EngineError::TermNotConfigured)));

    assert!(h.sync.scan_all_config_files(true).await.is_none());
    assert_eq!(h.store.put_count(), 0);
    assert!(
        h.host
            .notices()
            .iter()
            .any(|n| n.contains("configure the device name"))
    );
}

#[tokio::test]
async fn test_untracked_path_is_rejected() {
    let h = Harness::for_term("laptop");
    h.storage.insert(".obsidian/plugins/foo/cache.bin", "x");
    let result = h
        .sync
        .artifacts()
        .store_customization_files(".obsidian/plugins/foo/cache.bin", None)
        .await;
    assert!(matches!(result, Err(EngineError::Untracked(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_of_one_key_do_not_interleave() {
    let store = Arc::new(CountingStore::new());
    let storage = Arc::new(MemoryStorage::with_clock(CLOCK_ORIGIN));
    let sync = Arc::new(
        ConfigSync::builder()
            .settings(SyncSettings::for_term("laptop"))
            .config(EngineConfig::testing())
            .document_store(store.clone())
            .storage(storage.clone())
            .host(Arc::new(RecordingHost::default()))
            .adjudicator(Arc::new(ScriptedAdjudicator::default()))
            .settings_store(Arc::new(RecordingSettingsStore::default()))
            .build()
            .unwrap(),
    );
    let path = ".obsidian/app.json";
    let key = "ix:laptop/CONFIG/app.json.md";

    for round in 0..3 {
        storage.insert(path, format!(r#"{{"round":{round}}}"#));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        sync.store_customization_files(path).await
                    } else {
                        sync.watch_vault_raw_events(path).await.settled().await;
                        true
                    }
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        // One write per change: the others see it and skip
        assert_eq!(store.inner.put_count(), round + 1);
    }

    assert_eq!(store.max_puts_per_key.load(Ordering::SeqCst), 1);
    let stat = storage.stat(path).await.unwrap().unwrap();
    let stored = store.inner.get(key, false).await.unwrap().unwrap();
    assert_eq!(stored.mtime, stat.mtime);
}

// ============================================================================
// Deleting
// ============================================================================

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = Harness::for_term("laptop");
    let artifacts = h.sync.artifacts();
    let key = "ix:laptop/CONFIG/app.json.md";

    assert!(!artifacts.delete_config_on_database(key).await.unwrap());
    assert_eq!(h.store.put_count(), 0);

    h.storage.insert(".obsidian/app.json", "{}");
    artifacts
        .store_customization_files(".obsidian/app.json", None)
        .await
        .unwrap();
    assert!(artifacts.delete_config_on_database(key).await.unwrap());
    assert!(!artifacts.delete_config_on_database(key).await.unwrap());
    assert_eq!(h.store.put_count(), 2);

    let meta = h.store.get_meta(key).await.unwrap().unwrap();
    assert!(meta.deleted);
    assert_eq!(meta.size, 0);
}

#[tokio::test]
async fn test_store_with_no_files_left_deletes() {
    let h = Harness::for_term("laptop");
    let path = ".obsidian/themes/Minimal/theme.css";
    h.storage.insert(path, "body {}");
    h.storage.insert(".obsidian/themes/Minimal/manifest.json", r#"{"name":"Minimal"}"#);
    let artifacts = h.sync.artifacts();
    assert_eq!(
        artifacts.store_customization_files(path, None).await.unwrap(),
        StoreOutcome::Stored
    );

    h.storage.remove(path);
    h.storage.remove(".obsidian/themes/Minimal/manifest.json");
    assert_eq!(
        artifacts.store_customization_files(path, None).await.unwrap(),
        StoreOutcome::Deleted
    );
    assert!(h.store.get("ix:laptop/THEME/Minimal.md", false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stored_again_after_soft_delete() {
    let h = Harness::for_term("laptop");
    let path = ".obsidian/app.json";
    let key = "ix:laptop/CONFIG/app.json.md";
    h.storage.insert(path, "{}");
    let artifacts = h.sync.artifacts();
    artifacts.store_customization_files(path, None).await.unwrap();
    artifacts.delete_config_on_database(key).await.unwrap();

    // Same file, same mtime: a deleted document is never "unchanged"
    assert_eq!(
        artifacts.store_customization_files(path, None).await.unwrap(),
        StoreOutcome::Stored
    );
    assert!(h.store.get(key, false).await.unwrap().is_some());
}

// ============================================================================
// Scanning
// ============================================================================

#[tokio::test]
async fn test_scan_converges_after_file_removal() {
    let h = Harness::for_term("laptop");
    h.storage.insert(".obsidian/app.json", "{}");
    h.storage.insert(".obsidian/appearance.json", "{}");
    h.storage.insert(".obsidian/plugins/foo/main.js", "js");
    h.storage.insert(".obsidian/plugins/foo/manifest.json", r#"{"name":"Foo"}"#);
    h.storage.insert(".obsidian/plugins/foo/node_modules/x/main.js", "too deep");
    h.storage.insert(".obsidian/workspace", "not a target");

    let report = h.sync.scan_all_config_files(false).await.unwrap();
    assert_eq!(report.stored, 3);
    assert_eq!(report.failed, 0);

    h.sync.indexer().rebuild_now(false).await.unwrap();
    assert_eq!(h.sync.artifact_list().len(), 3);

    h.storage.remove(".obsidian/appearance.json");
    let report = h.sync.scan_all_config_files(false).await.unwrap();
    assert_eq!(report.stored, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.deleted, 1);

    let meta = h
        .store
        .get_meta("ix:laptop/CONFIG/appearance.json.md")
        .await
        .unwrap()
        .unwrap();
    assert!(meta.deleted);

    h.sync.indexer().rebuild_now(false).await.unwrap();
    let keys: Vec<_> = h
        .sync
        .artifact_list()
        .iter()
        .map(|s| s.document_path.clone())
        .collect();
    assert_eq!(keys.len(), 2);
    assert!(!keys.contains(&"ix:laptop/CONFIG/appearance.json.md".to_string()));
}

#[tokio::test]
async fn test_scan_leaves_other_terms_alone() {
    let h = Harness::for_term("laptop");
    let foreign = put_foreign_bundle(
        h.store.as_ref(),
        Category::Config,
        "app.json",
        "desk",
        "app.json",
        b"{}",
        5.0,
    )
    .await;

    let report = h.sync.scan_all_config_files(false).await.unwrap();
    assert_eq!(report.deleted, 0);
    assert!(h.store.get(&foreign, false).await.unwrap().is_some());
}

// ============================================================================
// Indexing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuild_respects_load_concurrency() {
    let store = Arc::new(CountingStore::new());
    for i in 0..500 {
        put_foreign_bundle(
            &store.inner,
            Category::Snippet,
            &format!("s{i:03}.css"),
            "desk",
            &format!("snippets/s{i:03}.css"),
            b".x {}",
            1_000.0 + i as f64,
        )
        .await;
    }

    let sync = ConfigSync::builder()
        .settings(SyncSettings::for_term("laptop"))
        .config(EngineConfig::testing())
        .document_store(store.clone())
        .storage(Arc::new(MemoryStorage::with_clock(CLOCK_ORIGIN)))
        .host(Arc::new(RecordingHost::default()))
        .adjudicator(Arc::new(ScriptedAdjudicator::default()))
        .settings_store(Arc::new(RecordingSettingsStore::default()))
        .build()
        .unwrap();

    sync.indexer().rebuild_now(false).await.unwrap();

    let max = store.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 20, "max in flight was {max}");
    assert!(max > 1);

    let list = sync.artifact_list();
    assert_eq!(list.len(), 500);
    let mut keys: Vec<_> = list.iter().map(|s| s.document_path.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 500);

    // Nothing changed: the second rebuild loads nothing
    let gets = store.gets.load(Ordering::SeqCst);
    sync.indexer().rebuild_now(false).await.unwrap();
    assert_eq!(store.gets.load(Ordering::SeqCst), gets);
}

#[tokio::test]
async fn test_refresh_prunes_deleted_key() {
    let h = Harness::for_term("laptop");
    h.storage.insert(".obsidian/app.json", "{}");
    let key = "ix:laptop/CONFIG/app.json.md";
    h.sync
        .artifacts()
        .store_customization_files(".obsidian/app.json", None)
        .await
        .unwrap();
    h.sync.indexer().refresh_now(key).await.unwrap();
    assert!(h.sync.indexer().get(key).is_some());

    h.sync.artifacts().delete_config_on_database(key).await.unwrap();
    h.sync.indexer().refresh_now(key).await.unwrap();
    assert!(h.sync.indexer().get(key).is_none());
}

#[tokio::test]
async fn test_refresh_ignores_neighbouring_keys() {
    let h = Harness::for_term("laptop");
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json.bak", "desk", "app.json.bak", b"1", 1.0).await;

    // The range of `app.json` would also cover `app.json.bak`
    let key = "ix:desk/CONFIG/app.json";
    h.sync.indexer().refresh_now(key).await.unwrap();
    assert!(h.sync.artifact_list().is_empty());
}

#[tokio::test]
async fn test_disabled_sync_clears_list() {
    let h = Harness::for_term("laptop");
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;
    h.sync.indexer().rebuild_now(false).await.unwrap();
    assert_eq!(h.sync.artifact_list().len(), 1);

    h.sync.update_settings(|s| s.use_plugin_sync = false);
    assert!(h.sync.update_plugin_list(false, None).is_none());
    assert!(h.sync.artifact_list().is_empty());
}

#[tokio::test]
async fn test_rebuild_records_sync_mode_entries_once() {
    let h = Harness::for_term("laptop");
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;

    h.sync.indexer().rebuild_now(false).await.unwrap();
    {
        let saved = h.settings_store.saved.lock();
        assert_eq!(saved.len(), 1);
        let entry = &saved[0].plugin_sync_extended_setting["CONFIG/app.json"];
        assert_eq!(entry.mode, SyncMode::Selective);
        assert_eq!(entry.files, vec!["app.json".to_string()]);
    }

    h.sync.indexer().rebuild_now(false).await.unwrap();
    assert_eq!(h.settings_store.saved.lock().len(), 1);
}

#[tokio::test]
async fn test_list_observers_see_published_snapshots() {
    let h = Harness::for_term("laptop");
    let mut rx = h.sync.subscribe_list();
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;

    h.sync.indexer().rebuild_now(false).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 1);
}

// ============================================================================
// Applying and merging
// ============================================================================

#[tokio::test]
async fn test_merge_applies_resolved_content() {
    let h = Harness::with_parts(
        SyncSettings::for_term("laptop"),
        RecordingHost::default(),
        ScriptedAdjudicator::answering(r#"{"merged":true}"#),
    );
    let path = ".obsidian/appearance.json";
    h.storage.insert(path, r#"{"local":true}"#);
    h.sync.store_customization_files(path).await;
    put_foreign_bundle(
        h.store.as_ref(),
        Category::Config,
        "appearance.json",
        "desk",
        "appearance.json",
        br#"{"remote":true}"#,
        10.0,
    )
    .await;
    h.sync.indexer().rebuild_now(false).await.unwrap();

    let local_key = "ix:laptop/CONFIG/appearance.json.md";
    let a = h.sync.indexer().get(local_key).unwrap();
    let b = h.sync.indexer().get("ix:desk/CONFIG/appearance.json.md").unwrap();

    assert!(h.sync.compare_using_display_data(&a, &b).await);
    assert_eq!(h.storage.text(path).as_deref(), Some(r#"{"merged":true}"#));

    {
        let seen = h.adjudicator.seen.lock();
        assert_eq!(seen.len(), 1);
        let (display, left, right) = &seen[0];
        assert_eq!(display, "appearance.json");
        assert_eq!(left.content, r#"{"local":true}"#);
        assert_eq!(right.content, r#"{"remote":true}"#);
    }

    h.sync.indexer().refresh_now(local_key).await.unwrap();
    let refreshed = h.sync.indexer().get(local_key).unwrap();
    assert!(refreshed.mtime > a.mtime);
}

#[tokio::test]
async fn test_merge_without_decision_changes_nothing() {
    let h = Harness::for_term("laptop");
    let path = ".obsidian/app.json";
    h.storage.insert(path, "local");
    h.sync.store_customization_files(path).await;
    let remote = put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"remote", 1.0).await;
    h.sync.indexer().rebuild_now(false).await.unwrap();

    let a = h.sync.indexer().get("ix:laptop/CONFIG/app.json.md").unwrap();
    let b = h.sync.indexer().get(&remote).unwrap();
    let puts = h.store.put_count();

    assert!(!h.sync.compare_using_display_data(&a, &b).await);
    assert_eq!(h.storage.text(path).as_deref(), Some("local"));
    assert_eq!(h.store.put_count(), puts);
}

#[tokio::test]
async fn test_apply_plugin_data_reloads_extension() {
    let host = RecordingHost::default().with_extension("foo", ".obsidian/plugins/foo", true);
    let h = Harness::with_parts(SyncSettings::for_term("laptop"), host, ScriptedAdjudicator::default());
    put_foreign_bundle(
        h.store.as_ref(),
        Category::PluginData,
        "foo",
        "desk",
        "plugins/foo/data.json",
        br#"{"k":"v"}"#,
        1.0,
    )
    .await;
    h.sync.indexer().rebuild_now(false).await.unwrap();
    let summary = h.sync.indexer().get("ix:desk/PLUGIN_DATA/foo.md").unwrap();

    assert!(h.sync.apply_data(&summary).await);
    assert_eq!(
        h.storage.text(".obsidian/plugins/foo/data.json").as_deref(),
        Some(r#"{"k":"v"}"#)
    );
    assert_eq!(*h.host.unloaded.lock(), vec!["foo".to_string()]);
    assert_eq!(*h.host.loaded.lock(), vec!["foo".to_string()]);

    // Applying stores the file for this device too
    assert!(h.store.get("ix:laptop/PLUGIN_DATA/foo.md", false).await.unwrap().is_some());
}

#[tokio::test]
async fn test_apply_config_prompts_restart() {
    let host = RecordingHost::default();
    host.answer_yes.store(true, Ordering::SeqCst);
    let h = Harness::with_parts(SyncSettings::for_term("laptop"), host, ScriptedAdjudicator::default());
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;
    h.sync.indexer().rebuild_now(false).await.unwrap();
    let summary = h.sync.indexer().get("ix:desk/CONFIG/app.json.md").unwrap();

    assert!(h.sync.apply_data(&summary).await);
    assert!(h.sync.apply_data(&summary).await);
    h.sync.wait_idle().await;

    // Two applies inside the window ask once
    assert_eq!(h.host.questions.load(Ordering::SeqCst), 1);
    assert_eq!(*h.host.commands.lock(), vec!["app:reload".to_string()]);
}

#[tokio::test]
async fn test_apply_legacy_plugin_etc_document() {
    let host = RecordingHost::default().with_extension("calendar", ".obsidian/plugins/calendar", true);
    let h = Harness::with_parts(SyncSettings::for_term("laptop"), host, ScriptedAdjudicator::default());
    let key = put_foreign_bundle(
        h.store.as_ref(),
        Category::PluginEtc,
        "calendar/cache.bin",
        "desk",
        "plugins/calendar/cache.bin",
        &[0, 1, 2, 255],
        1.0,
    )
    .await;
    assert_eq!(key, "ix:desk/PLUGIN_ETC/calendar/cache.bin.md");
    h.sync.indexer().rebuild_now(false).await.unwrap();
    let summary = h.sync.indexer().get(&key).unwrap();
    assert_eq!(summary.category, Category::PluginEtc);

    assert!(h.sync.apply_data(&summary).await);
    assert_eq!(
        h.storage.contents(".obsidian/plugins/calendar/cache.bin"),
        Some(vec![0, 1, 2, 255])
    );
    assert_eq!(*h.host.unloaded.lock(), vec!["calendar".to_string()]);
    assert_eq!(*h.host.loaded.lock(), vec!["calendar".to_string()]);

    // The legacy category is never produced for this device
    assert!(h.store.get("ix:laptop/PLUGIN_ETC/calendar/cache.bin.md", false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_apply_missing_document_fails() {
    let h = Harness::for_term("laptop");
    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;
    h.sync.indexer().rebuild_now(false).await.unwrap();
    let mut summary = h.sync.indexer().get("ix:desk/CONFIG/app.json.md").unwrap();
    summary.document_path = "ix:desk/CONFIG/gone.json.md".to_string();

    assert!(!h.sync.apply_data(&summary).await);

    let bundle = codec::deserialize("", Default::default());
    let result = h.sync.artifacts().apply_data(&bundle, None).await;
    assert!(matches!(result, Err(EngineError::MissingDocumentPath)));
}

// ============================================================================
// Raw events
// ============================================================================

#[tokio::test]
async fn test_raw_events_are_filtered_and_debounced() {
    let h = Harness::for_term("laptop");
    let path = ".obsidian/app.json";
    h.storage.insert(path, "{}");

    assert!(!h.sync.watch_vault_raw_events("notes/today.md").await.is_handled());
    assert!(!h.sync.watch_vault_raw_events(".obsidian/plugins").await.is_handled());

    let first = h.sync.watch_vault_raw_events(path).await;
    assert!(first.is_handled());
    first.settled().await;
    assert!(h.store.get("ix:laptop/CONFIG/app.json.md", false).await.unwrap().is_some());

    let again = h.sync.watch_vault_raw_events(path).await;
    assert!(matches!(again, WatchOutcome::Suppressed));

    // A later write is a new event
    h.storage.insert(path, r#"{"a":1}"#);
    assert!(matches!(
        h.sync.watch_vault_raw_events(path).await,
        WatchOutcome::Forwarded(_)
    ));
}

#[tokio::test]
async fn test_recent_events_ring_evicts_oldest() {
    let h = Harness::with_config(
        SyncSettings::for_term("laptop"),
        EngineConfig::testing().with_recent_events_capacity(2),
    );
    let (a, b, c) = (".obsidian/a.json", ".obsidian/b.json", ".obsidian/c.json");
    for path in [a, b, c] {
        h.storage.insert(path, "{}");
    }

    for path in [a, b] {
        let outcome = h.sync.watch_vault_raw_events(path).await;
        assert!(matches!(outcome, WatchOutcome::Forwarded(_)));
        outcome.settled().await;
    }
    // Still inside the ring
    assert!(matches!(h.sync.watch_vault_raw_events(a).await, WatchOutcome::Suppressed));

    // `c` pushes `a` out; the ring now holds c, b
    h.sync.watch_vault_raw_events(c).await.settled().await;
    assert!(matches!(h.sync.watch_vault_raw_events(b).await, WatchOutcome::Suppressed));
    let again = h.sync.watch_vault_raw_events(a).await;
    assert!(matches!(again, WatchOutcome::Forwarded(_)));
    again.settled().await;
}

#[tokio::test]
async fn test_raw_events_for_excluded_files() {
    let mut settings = SyncSettings::for_term("laptop");
    settings.plugin_sync_extended_setting.insert(
        "PLUGIN_DATA/foo".to_string(),
        ExtendedSyncSetting {
            key: "PLUGIN_DATA/foo".to_string(),
            mode: SyncMode::Automatic,
            files: vec!["plugins/Foo/data.json".to_string()],
        },
    );
    let h = Harness::new(settings);
    h.storage.insert(".obsidian/plugins/foo/data.json", "{}");

    let outcome = h.sync.watch_vault_raw_events(".obsidian/plugins/foo/data.json").await;
    assert!(matches!(outcome, WatchOutcome::Excluded));
    assert!(!outcome.is_handled());
}

#[tokio::test]
async fn test_raw_events_ignored_when_disabled() {
    let h = Harness::new(SyncSettings::default());
    h.storage.insert(".obsidian/app.json", "{}");
    let outcome = h.sync.watch_vault_raw_events(".obsidian/app.json").await;
    assert!(matches!(outcome, WatchOutcome::Ignored));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_replicated_documents_are_claimed_and_announced() {
    let h = Harness::for_term("laptop");
    assert!(!h.sync.on_replicated_document("notes/today.md"));

    put_foreign_bundle(h.store.as_ref(), Category::Config, "app.json", "desk", "app.json", b"{}", 1.0).await;
    assert!(h.sync.on_replicated_document("ix:desk/CONFIG/app.json.md"));
    assert!(h.sync.on_replicated_document("ix:desk/CONFIG/app.json.md"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let arrivals = h
        .host
        .notices()
        .iter()
        .filter(|n| n.contains("has arrived"))
        .count();
    assert_eq!(arrivals, 1);
    assert!(h.sync.indexer().get("ix:desk/CONFIG/app.json.md").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_sweep_scans_on_interval() {
    let h = Harness::for_term("laptop");
    h.sync.enable_periodic_sweep(Duration::from_secs(60));
    assert!(h.sync.is_periodic_sweep_running());

    h.storage.insert(".obsidian/app.json", "{}");
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.store.put_count(), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(h.store.get("ix:laptop/CONFIG/app.json.md", false).await.unwrap().is_some());

    h.sync.disable_periodic_sweep();
    assert!(!h.sync.is_periodic_sweep_running());
}

#[tokio::test]
async fn test_realize_setting_sync_mode() {
    let mut settings = SyncSettings::for_term("laptop");
    settings.auto_sweep_plugins = true;
    settings.auto_sweep_plugins_periodic = true;
    let h = Harness::new(settings);
    h.storage.insert(".obsidian/app.json", "{}");

    h.sync.realize_setting_sync_mode().await;
    assert_eq!(h.store.put_count(), 1);
    assert!(h.sync.is_periodic_sweep_running());

    h.sync.update_settings(|s| s.watch_internal_file_changes = true);
    h.sync.realize_setting_sync_mode().await;
    assert!(!h.sync.is_periodic_sweep_running());

    h.sync.update_settings(|s| s.suspended = true);
    h.sync.on_resume().await;
    assert!(!h.sync.is_periodic_sweep_running());
}

#[tokio::test]
async fn test_builder_requires_collaborators() {
    let result = ConfigSync::builder()
        .settings(SyncSettings::for_term("laptop"))
        .build();
    assert!(matches!(result, Err(EngineError::MissingCollaborator(_))));
}
