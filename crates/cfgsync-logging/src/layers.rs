//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{DeviceContextData, DeviceContextGuard};

/// Layer attaching the active device context to every new span
///
/// The data is stored as a span extension ([`DeviceContextExtension`]),
/// where formatters and other layers can read it back.
#[derive(Debug, Default)]
pub struct DeviceContextLayer;

impl DeviceContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct DeviceContextExtension {
    pub data: DeviceContextData,
}

impl<S> Layer<S> for DeviceContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(device) = DeviceContextGuard::current()
        {
            span.extensions_mut()
                .insert(DeviceContextExtension { data: device });
        }
    }
}
