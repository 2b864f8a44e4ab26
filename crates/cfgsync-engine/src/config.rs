//! Engine tuning.
//!
//! Time windows, concurrency limits and bounds used by the engine, with
//! defaults matching the host application's expectations and builder-style
//! setters for tests and embedders.

use std::time::Duration;

/// Host command executed after the user agrees to restart
pub const RESTART_COMMAND: &str = "app:reload";

/// Tuning knobs of the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Coalescing window for list rebuild and refresh requests.
    pub list_debounce: Duration,
    /// Maximum number of concurrent document loads during a rebuild.
    pub load_concurrency: usize,
    /// Capacity of the recent raw-event ring.
    pub recent_events_capacity: usize,
    /// Folder depth scanned below the configuration root.
    pub scan_depth: usize,
    /// Coalescing window for the restart prompt after applying settings.
    pub restart_prompt_delay: Duration,
    /// Coalescing window for the "customizations arrived" notice.
    pub update_notice_delay: Duration,
    /// Host command executed on restart.
    pub restart_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            list_debounce: Duration::from_millis(200),
            load_concurrency: 20,
            recent_events_capacity: 100,
            scan_depth: 2,
            restart_prompt_delay: Duration::from_millis(250),
            update_notice_delay: Duration::from_millis(1000),
            restart_command: RESTART_COMMAND.to_string(),
        }
    }
}

impl EngineConfig {
    /// Short windows for tests.
    pub fn testing() -> Self {
        Self {
            list_debounce: Duration::from_millis(10),
            restart_prompt_delay: Duration::from_millis(10),
            update_notice_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Set the list coalescing window.
    pub fn with_list_debounce(mut self, window: Duration) -> Self {
        self.list_debounce = window;
        self
    }

    /// Set the load concurrency (at least 1).
    pub fn with_load_concurrency(mut self, limit: usize) -> Self {
        self.load_concurrency = limit.max(1);
        self
    }

    /// Set the recent-event ring capacity.
    pub fn with_recent_events_capacity(mut self, capacity: usize) -> Self {
        self.recent_events_capacity = capacity;
        self
    }

    /// Set the scan depth.
    pub fn with_scan_depth(mut self, depth: usize) -> Self {
        self.scan_depth = depth;
        self
    }

    /// Set the restart prompt window.
    pub fn with_restart_prompt_delay(mut self, window: Duration) -> Self {
        self.restart_prompt_delay = window;
        self
    }

    /// Set the arrival notice window.
    pub fn with_update_notice_delay(mut self, window: Duration) -> Self {
        self.update_notice_delay = window;
        self
    }

    /// Set the host restart command.
    pub fn with_restart_command(mut self, command: impl Into<String>) -> Self {
        self.restart_command = command.into();
        self
    }
}
