//! Reporting of operations that completed locally instead of remotely.
//!
//! Fallbacks never change a call's result. They are logged through `tracing`
//! and, when a sink is configured, handed to it as a [`FallbackEvent`].

use std::sync::Arc;

use crate::error::FallbackReason;

/// Which facade or media operation fell back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Subscribe,
    Save,
    Remove,
    UpdatePartial,
    Upload,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Save => "save",
            Self::Remove => "remove",
            Self::UpdatePartial => "update_partial",
            Self::Upload => "upload_binary",
        }
    }
}

/// One completed-locally operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEvent {
    pub operation: Operation,
    /// Collection name, or the blob path for uploads.
    pub resource: String,
    pub reason: FallbackReason,
}

/// Callback type for fallback events.
pub type FallbackCallback = dyn Fn(&FallbackEvent) + Send + Sync;

#[derive(Clone, Default)]
pub(crate) struct FallbackReporter {
    sink: Option<Arc<FallbackCallback>>,
}

impl FallbackReporter {
    pub(crate) fn new(sink: Option<Arc<FallbackCallback>>) -> Self {
        Self { sink }
    }

    pub(crate) fn report(&self, operation: Operation, resource: &str, reason: FallbackReason) {
        match &reason {
            FallbackReason::RemoteFailed(e) => tracing::warn!(
                operation = operation.as_str(),
                resource = %resource,
                error = %e,
                "remote operation failed, completing locally"
            ),
            FallbackReason::RemoteUnavailable => tracing::debug!(
                operation = operation.as_str(),
                resource = %resource,
                "remote unavailable, using local store"
            ),
        }

        if let Some(sink) = &self.sink {
            let event = FallbackEvent {
                operation,
                resource: resource.to_string(),
                reason,
            };
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink(&event)));
        }
    }
}
