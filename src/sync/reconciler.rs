use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::io::source::{FileSource, SourceError};
use crate::io::store::SnapshotStore;
use crate::model::document::Document;
use crate::parse::parse_document;
use crate::sync::snapshot::SnapshotCell;

/// Capacity of the document broadcast; slow subscribers skip to the newest
const UPDATE_CAPACITY: usize = 16;

/// Why the bound source could not produce a new snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFault {
    /// The file changed but does not hold a valid document
    InvalidContent(String),
    /// The file could not be read (or the read timed out)
    AccessLost(String),
}

impl SyncFault {
    /// Human-readable message for display
    pub fn message(&self) -> &'static str {
        match self {
            SyncFault::InvalidContent(_) => {
                "File changed but content is invalid. Keeping last good snapshot."
            }
            SyncFault::AccessLost(_) => "Lost access to file. Retrying.",
        }
    }

    /// Underlying cause
    pub fn detail(&self) -> &str {
        match self {
            SyncFault::InvalidContent(d) | SyncFault::AccessLost(d) => d,
        }
    }
}

impl fmt::Display for SyncFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing bound
    Idle,
    Watching,
    /// Sticky until a valid snapshot arrives or the source is rebound
    Error(SyncFault),
}

/// Snapshot of the reconciler's state, published on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Display name of the bound source
    pub source: Option<String>,
    /// Modification time of the current snapshot's content
    pub last_modified: Option<i64>,
}

impl SyncStatus {
    fn idle() -> Self {
        SyncStatus {
            state: SyncState::Idle,
            source: None,
            last_modified: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, SyncState::Error(_))
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match &self.state {
            SyncState::Error(fault) => Some(fault.message()),
            _ => None,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No source bound
    Idle,
    /// Another tick for this binding is still running
    Skipped,
    /// Modification time not newer than the last accepted one
    Unchanged,
    Replaced,
    /// Content changed but did not parse; snapshot kept
    Rejected,
    /// Read failed or timed out; snapshot kept
    Faulted,
    /// The binding changed while the read was outstanding; result discarded
    Stale,
}

struct Binding {
    source: Arc<dyn FileSource>,
    generation: u64,
    last_modified: Option<i64>,
    in_flight: bool,
}

#[derive(Default)]
struct Inner {
    binding: Option<Binding>,
    /// Bumped on every bind, unbind and snapshot switch
    generation: u64,
    fault: Option<SyncFault>,
}

/// Clears a binding's in-flight flag when a tick is dropped mid-read
struct InFlight<'a> {
    reconciler: &'a Reconciler,
    generation: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut guard = self.reconciler.lock();
        if let Some(binding) = guard
            .binding
            .as_mut()
            .filter(|b| b.generation == self.generation)
        {
            tracing::debug!(generation = self.generation, "tick cancelled during read");
            binding.in_flight = false;
        }
    }
}

/// Keeps the snapshot cell in step with a bound file source.
///
/// The reconciler holds no timer of its own; [`LiveSync`](super::LiveSync)
/// drives [`tick`](Reconciler::tick) on an interval. A tick captures the
/// binding generation before reading and applies its result only if that
/// generation is still current, so a rebind or unbind during a slow read
/// can never be overwritten by the old source.
pub struct Reconciler {
    snapshot: Arc<SnapshotCell>,
    inner: Mutex<Inner>,
    read_timeout: Duration,
    store: Option<Arc<dyn SnapshotStore>>,
    updates: broadcast::Sender<Arc<Document>>,
    status: watch::Sender<SyncStatus>,
}

impl Reconciler {
    pub fn new(snapshot: Arc<SnapshotCell>, read_timeout: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let (status, _) = watch::channel(SyncStatus::idle());
        Reconciler {
            snapshot,
            inner: Mutex::new(Inner::default()),
            read_timeout,
            store: None,
            updates,
            status,
        }
    }

    /// Save every accepted snapshot to `store`
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn snapshot(&self) -> Option<Arc<Document>> {
        self.snapshot.get()
    }

    /// Receive every newly installed document
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Document>> {
        self.updates.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Bind a new source. The next tick takes its content as the baseline;
    /// the current snapshot stays visible until then.
    pub fn bind(&self, source: Arc<dyn FileSource>) -> u64 {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.generation += 1;
        tracing::info!(
            source = source.identity(),
            generation = inner.generation,
            "bound source"
        );
        inner.binding = Some(Binding {
            source,
            generation: inner.generation,
            last_modified: None,
            in_flight: false,
        });
        inner.fault = None;
        self.publish(inner);
        inner.generation
    }

    /// Drop the binding. Any tick still reading will find itself stale.
    pub fn unbind(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.generation += 1;
        if let Some(old) = inner.binding.take() {
            tracing::info!(source = old.source.identity(), "unbound source");
        }
        inner.fault = None;
        self.publish(inner);
    }

    /// Install a document that has no backing file, unbinding any source
    pub fn open_snapshot(&self, doc: Document) -> Arc<Document> {
        let doc = Arc::new(doc);
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.generation += 1;
            inner.binding = None;
            inner.fault = None;
            self.snapshot.replace(Arc::clone(&doc));
            self.publish(inner);
        }
        tracing::info!(file_name = ?doc.file_name, "opened snapshot without source");
        let _ = self.updates.send(Arc::clone(&doc));
        doc
    }

    /// Read the bound source once and reconcile the snapshot with it
    pub async fn tick(&self) -> TickOutcome {
        let (generation, source) = {
            let mut guard = self.lock();
            let Some(binding) = guard.binding.as_mut() else {
                return TickOutcome::Idle;
            };
            if binding.in_flight {
                tracing::trace!(generation = binding.generation, "tick skipped, read in flight");
                return TickOutcome::Skipped;
            }
            binding.in_flight = true;
            (binding.generation, Arc::clone(&binding.source))
        };
        let mut in_flight = InFlight {
            reconciler: self,
            generation,
            armed: true,
        };

        let read = match tokio::time::timeout(self.read_timeout, source.read()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                identity: source.identity().to_string(),
                timeout: self.read_timeout,
            }),
        };

        // the flag is cleared below, under the same lock as the apply
        in_flight.armed = false;
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(binding) = inner
            .binding
            .as_mut()
            .filter(|b| b.generation == generation)
        else {
            tracing::debug!(generation, "discarding result of stale tick");
            return TickOutcome::Stale;
        };
        binding.in_flight = false;

        let read = match read {
            Ok(read) => read,
            Err(e) => {
                self.record_fault(inner, SyncFault::AccessLost(e.to_string()));
                return TickOutcome::Faulted;
            }
        };

        if binding
            .last_modified
            .is_some_and(|seen| read.modified_at <= seen)
        {
            tracing::debug!(source = source.identity(), "source unchanged");
            return TickOutcome::Unchanged;
        }

        let doc = match parse_document(&read.content) {
            Ok(doc) => Arc::new(doc),
            Err(e) => {
                // timestamp stays put so the next tick retries this content
                self.record_fault(inner, SyncFault::InvalidContent(e.to_string()));
                return TickOutcome::Rejected;
            }
        };

        binding.last_modified = Some(read.modified_at);
        self.snapshot.replace(Arc::clone(&doc));
        inner.fault = None;
        self.publish(inner);
        drop(guard);

        tracing::info!(
            source = source.identity(),
            modified_at = read.modified_at,
            tasks = doc.master().tasks.len(),
            "snapshot replaced"
        );
        let _ = self.updates.send(Arc::clone(&doc));
        self.save_snapshot(source.identity(), doc);
        TickOutcome::Replaced
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_fault(&self, inner: &mut Inner, fault: SyncFault) {
        if inner.fault.as_ref() != Some(&fault) {
            tracing::warn!(detail = fault.detail(), "{}", fault.message());
        }
        inner.fault = Some(fault);
        self.publish(inner);
    }

    fn publish(&self, inner: &Inner) {
        let next = match &inner.binding {
            None => SyncStatus::idle(),
            Some(binding) => SyncStatus {
                state: match &inner.fault {
                    Some(fault) => SyncState::Error(fault.clone()),
                    None => SyncState::Watching,
                },
                source: Some(binding.source.name().to_string()),
                last_modified: binding.last_modified,
            },
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn save_snapshot(&self, identity: &str, doc: Arc<Document>) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let identity = identity.to_string();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save(&identity, &doc) {
                tracing::warn!(identity = %identity, error = %e, "could not save snapshot");
            }
        });
    }
}
