//! CollectionStore<H> — the facade every feature module talks to.
//!
//! Four verbs (`subscribe`, `save`, `remove`, `update_partial`) that behave
//! the same whether the remote document store is reachable or not:
//!
//! 1. Ask the [`ModeSelector`] (every call, never cached).
//! 2. If remote is usable, try it. A remote error is logged, reported to the
//!    fallback sink, and the operation continues locally. No retry.
//! 3. Otherwise go straight to the [`LocalStore`], whose writes publish on the
//!    local change bus so subscribers see them as if the remote had pushed.
//!
//! Once a write has fallen back, the local and remote copies may differ; no
//! reconciliation happens when the remote comes back.
//!
//! # Threading model
//!
//! Remote-mode subscriptions run one tokio task each, spawned on the caller's
//! runtime. Everything else runs on the calling task. Local snapshots are
//! delivered under the change bus's re-entrant delivery lock, so callbacks may
//! call back into the store; no other lock is held while a callback runs.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    config::StoreConfig,
    error::{FallbackReason, RemoteError, Result},
    fallback::{FallbackCallback, FallbackReporter, Operation},
    mode::ModeSelector,
    reactive::{SnapshotListener, SnapshotStream, Subscription},
    remote::RemoteStore,
    storage::{HostStorage, LocalStore},
    types::{Document, Fields},
};

// ============================================================================
// Options
// ============================================================================

/// Configuration for [`CollectionStore`].
pub struct CollectionStoreOptions<H: HostStorage> {
    /// Shared local store. Several facades may use the same one.
    pub local: Arc<LocalStore<H>>,
    /// Remote document store; `None` means local-only.
    pub remote: Option<Arc<dyn RemoteStore>>,
    /// Decides per call whether `remote` is usable (default: always, when set).
    pub mode: Option<Arc<dyn ModeSelector>>,
    /// Id prefix and other store settings.
    pub config: StoreConfig,
    /// Called for each operation that completed locally instead of remotely.
    pub on_fallback: Option<Arc<FallbackCallback>>,
}

// ============================================================================
// CollectionStore
// ============================================================================

pub struct CollectionStore<H: HostStorage> {
    local: Arc<LocalStore<H>>,
    remote: Option<Arc<dyn RemoteStore>>,
    mode: Option<Arc<dyn ModeSelector>>,
    id_prefix: String,
    reporter: FallbackReporter,
}

impl<H: HostStorage + 'static> CollectionStore<H> {
    pub fn new(options: CollectionStoreOptions<H>) -> Self {
        Self {
            local: options.local,
            remote: options.remote,
            mode: options.mode,
            id_prefix: options.config.id_prefix().to_string(),
            reporter: FallbackReporter::new(options.on_fallback),
        }
    }

    /// A facade with no remote store at all.
    pub fn local_only(local: Arc<LocalStore<H>>) -> Self {
        Self::new(CollectionStoreOptions {
            local,
            remote: None,
            mode: None,
            config: StoreConfig::default(),
            on_fallback: None,
        })
    }

    pub fn local(&self) -> &Arc<LocalStore<H>> {
        &self.local
    }

    /// The local copy of `collection`, without consulting the remote.
    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.local.read_collection(collection)
    }

    /// The remote store, if one is configured and the selector allows it now.
    fn usable_remote(&self) -> std::result::Result<&Arc<dyn RemoteStore>, FallbackReason> {
        let remote = self
            .remote
            .as_ref()
            .ok_or(FallbackReason::RemoteUnavailable)?;
        match &self.mode {
            Some(mode) if !mode.remote_usable() => Err(FallbackReason::RemoteUnavailable),
            _ => Ok(remote),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Deliver the full contents of `collection` to `on_change` now and after
    /// every change, until the returned handle is cancelled.
    ///
    /// In local mode the first snapshot is delivered before this returns. In
    /// remote mode it arrives once the remote watch connects; if the watch
    /// cannot connect, or later drops, the subscription moves to the local
    /// store and delivers the local snapshot.
    pub fn subscribe<F>(&self, collection: &str, on_change: F) -> Subscription
    where
        F: Fn(&[Document]) + Send + Sync + 'static,
    {
        let listener: Arc<SnapshotListener> = Arc::new(on_change);
        let subscription = Subscription::new();

        let remote = match self.usable_remote() {
            Ok(remote) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => Some((Arc::clone(remote), runtime)),
                Err(_) => {
                    tracing::debug!(collection, "no async runtime for remote watch");
                    self.reporter.report(
                        Operation::Subscribe,
                        collection,
                        FallbackReason::RemoteUnavailable,
                    );
                    None
                }
            },
            Err(reason) => {
                self.reporter.report(Operation::Subscribe, collection, reason);
                None
            }
        };

        match remote {
            Some((remote, runtime)) => {
                let task = runtime.spawn(run_remote_watch(
                    remote,
                    Arc::clone(&self.local),
                    collection.to_string(),
                    listener,
                    subscription.clone(),
                    self.reporter.clone(),
                ));
                subscription.set_remote_task(task.abort_handle());
            }
            None => attach_local(&self.local, collection, listener, &subscription),
        }

        subscription
    }

    /// [`subscribe`](Self::subscribe) as a stream of snapshots. Dropping the
    /// stream cancels the subscription.
    pub fn watch(&self, collection: &str) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(collection, move |docs| {
            let _ = tx.send(docs.to_vec());
        });
        SnapshotStream::new(rx, subscription)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Upsert `doc` into `collection`, assigning an id if it has none.
    ///
    /// Remote: merge-write. Local: shallow merge over the stored document with
    /// the same id, or append. Returns `doc` with its id either way.
    pub async fn save(&self, collection: &str, mut doc: Document) -> Result<Document> {
        doc.ensure_id(&self.id_prefix);

        let attempt = match self.usable_remote() {
            Ok(remote) => remote
                .merge_set(collection, &doc)
                .await
                .map_err(FallbackReason::RemoteFailed),
            Err(reason) => Err(reason),
        };

        if let Err(reason) = attempt {
            self.reporter.report(Operation::Save, collection, reason);
            self.local.upsert(collection, doc.clone())?;
        }
        Ok(doc)
    }

    /// Delete `id` from `collection`. A missing document is not an error.
    pub async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let attempt = match self.usable_remote() {
            Ok(remote) => remote
                .delete(collection, id)
                .await
                .map_err(FallbackReason::RemoteFailed),
            Err(reason) => Err(reason),
        };

        if let Err(reason) = attempt {
            self.reporter.report(Operation::Remove, collection, reason);
            self.local.remove_document(collection, id)?;
        }
        Ok(())
    }

    /// Merge `fields` into the existing document `id`. Never creates: if the
    /// document is absent from the store that ends up handling the call,
    /// nothing happens.
    pub async fn update_partial(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let attempt = match self.usable_remote() {
            Ok(remote) => remote
                .patch(collection, id, &fields)
                .await
                .map_err(FallbackReason::RemoteFailed),
            Err(reason) => Err(reason),
        };

        if let Err(reason) = attempt {
            self.reporter.report(Operation::UpdatePartial, collection, reason);
            self.local.patch(collection, id, &fields)?;
        }
        Ok(())
    }
}

// ============================================================================
// Subscription plumbing
// ============================================================================

fn deliver(collection: &str, listener: &SnapshotListener, snapshot: &[Document]) {
    let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(snapshot)));
    if delivered.is_err() {
        tracing::error!(collection, "subscription callback panicked");
    }
}

/// Register on the local bus and deliver the current local snapshot.
fn attach_local<H: HostStorage>(
    local: &LocalStore<H>,
    collection: &str,
    listener: Arc<SnapshotListener>,
    subscription: &Subscription,
) {
    if let Some(id) = subscription.attach_local(local.bus(), collection, listener) {
        local
            .bus()
            .deliver_current(collection, id, || local.read_collection(collection));
    }
}

/// Forward remote snapshots until the watch fails or ends, then resubscribe
/// to the local store.
async fn run_remote_watch<H: HostStorage>(
    remote: Arc<dyn RemoteStore>,
    local: Arc<LocalStore<H>>,
    collection: String,
    listener: Arc<SnapshotListener>,
    subscription: Subscription,
    reporter: FallbackReporter,
) {
    let error = match remote.watch(&collection).await {
        Ok(mut watch) => loop {
            match watch.next().await {
                Some(Ok(snapshot)) => {
                    if subscription.is_cancelled() {
                        return;
                    }
                    deliver(&collection, listener.as_ref(), &snapshot);
                }
                Some(Err(e)) => break e,
                None => break RemoteError::Disconnected,
            }
        },
        Err(e) => e,
    };

    subscription.clear_remote_task();
    if subscription.is_cancelled() {
        return;
    }
    reporter.report(
        Operation::Subscribe,
        &collection,
        FallbackReason::RemoteFailed(error),
    );
    tracing::debug!(collection = %collection, "subscription moved to local store");
    attach_local(&local, &collection, listener, &subscription);
}
