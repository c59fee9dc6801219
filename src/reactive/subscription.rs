//! Subscription handles returned by `CollectionStore::subscribe` / `watch`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::types::Document;

use super::change_bus::{ChangeBus, ListenerId, SnapshotListener};

struct LocalAttachment {
    bus: Arc<ChangeBus>,
    collection: String,
    listener: ListenerId,
}

#[derive(Default)]
struct SubscriptionState {
    cancelled: bool,
    local: Option<LocalAttachment>,
    remote_task: Option<AbortHandle>,
}

/// Cancellation handle for a live subscription.
///
/// Clones share one subscription. [`cancel`](Self::cancel) is idempotent.
/// Dropping the handle does not cancel; use [`SnapshotStream`] for
/// drop-to-cancel behavior.
#[derive(Clone, Default)]
pub struct Subscription {
    state: Arc<Mutex<SubscriptionState>>,
}

impl Subscription {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Detach from the local bus and stop any remote watch.
    ///
    /// A delivery already running when this is called may still complete.
    pub fn cancel(&self) {
        let (local, task) = {
            let mut st = self.state.lock();
            if st.cancelled {
                return;
            }
            st.cancelled = true;
            (st.local.take(), st.remote_task.take())
        };
        if let Some(att) = local {
            att.bus.off(&att.collection, att.listener);
        }
        if let Some(task) = task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Register `listener` on the local bus unless already cancelled.
    ///
    /// Returns `None` (registering nothing) if the subscription was cancelled.
    pub(crate) fn attach_local(
        &self,
        bus: &Arc<ChangeBus>,
        collection: &str,
        listener: Arc<SnapshotListener>,
    ) -> Option<ListenerId> {
        let mut st = self.state.lock();
        if st.cancelled {
            return None;
        }
        let id = bus.on(collection, listener);
        st.local = Some(LocalAttachment {
            bus: Arc::clone(bus),
            collection: collection.to_string(),
            listener: id,
        });
        Some(id)
    }

    /// Remember the remote watch task so `cancel` can abort it.
    pub(crate) fn set_remote_task(&self, task: AbortHandle) {
        let mut st = self.state.lock();
        if st.cancelled {
            task.abort();
        } else {
            st.remote_task = Some(task);
        }
    }

    /// The remote watch ended; it no longer needs aborting.
    pub(crate) fn clear_remote_task(&self) {
        self.state.lock().remote_task = None;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Subscription")
            .field("cancelled", &st.cancelled)
            .field("local", &st.local.is_some())
            .field("remote", &st.remote_task.is_some())
            .finish()
    }
}

// ============================================================================
// SnapshotStream
// ============================================================================

/// A subscription consumed as an async stream of snapshots.
///
/// Dropping the stream cancels the underlying subscription.
pub struct SnapshotStream {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
    subscription: Subscription,
}

impl SnapshotStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<Document>>, subscription: Subscription) -> Self {
        Self { rx, subscription }
    }

    /// Wait for the next snapshot. `None` once cancelled and drained.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }

    /// A snapshot that has already been delivered, without waiting.
    pub fn try_next_snapshot(&mut self) -> Option<Vec<Document>> {
        self.rx.try_recv().ok()
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for SnapshotStream {
    type Item = Vec<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
