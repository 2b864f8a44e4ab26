//! Device context injection
//!
//! Thread-local storage for the device/vault term, so every span created
//! within a scope carries the identity of the device it ran on.

use std::cell::RefCell;

use uuid::Uuid;

/// Device context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct DeviceContextData {
    /// Device and vault name (the key namespace term)
    pub term: String,
    /// Unique instance ID for this process
    pub instance_id: Uuid,
}

thread_local! {
    static DEVICE_CONTEXT: RefCell<Option<DeviceContextData>> = const { RefCell::new(None) };
}

/// RAII guard for device context
///
/// Sets the device context for the current thread and restores the
/// previous one when dropped.
///
/// ```
/// use cfgsync_logging::DeviceContextGuard;
///
/// let _guard = DeviceContextGuard::new("laptop");
/// assert_eq!(DeviceContextGuard::current_term().as_deref(), Some("laptop"));
/// ```
pub struct DeviceContextGuard {
    previous: Option<DeviceContextData>,
}

impl DeviceContextGuard {
    pub fn new(term: impl Into<String>) -> Self {
        Self::with_instance_id(term, Uuid::new_v4())
    }

    /// Create a guard with a specific instance ID
    pub fn with_instance_id(term: impl Into<String>, instance_id: Uuid) -> Self {
        let previous = Self::current();
        let data = DeviceContextData {
            term: term.into(),
            instance_id,
        };
        DEVICE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(data));
        Self { previous }
    }

    pub fn current() -> Option<DeviceContextData> {
        DEVICE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_term() -> Option<String> {
        Self::current().map(|ctx| ctx.term)
    }

    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for DeviceContextGuard {
    fn drop(&mut self) {
        DEVICE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a device context set
#[macro_export]
macro_rules! with_device_context {
    ($term:expr, $body:block) => {{
        let _guard = $crate::context::DeviceContextGuard::new($term);
        $body
    }};
}
