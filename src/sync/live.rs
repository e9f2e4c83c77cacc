use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::io::source::FileSource;
use crate::model::document::Document;
use crate::sync::reconciler::Reconciler;

/// Owns the polling task for the reconciler's bound source.
///
/// At most one polling task exists at a time. Rebinding, unbinding and
/// dropping all abort the running task together with any tick it spawned.
/// Dropping while polling also unbinds the reconciler, so its status never
/// claims a source nobody is watching.
pub struct LiveSync {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl LiveSync {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        LiveSync {
            reconciler,
            interval,
            task: None,
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Bind `source` and start polling it. Must be called inside a tokio
    /// runtime.
    pub fn bind(&mut self, source: Arc<dyn FileSource>) {
        self.stop();
        self.reconciler.bind(source);
        self.task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.reconciler),
            self.interval,
        )));
    }

    pub fn unbind(&mut self) {
        self.stop();
        self.reconciler.unbind();
    }

    /// Stop polling and show `doc` instead (project switch, landing flow)
    pub fn open_snapshot(&mut self, doc: Document) -> Arc<Document> {
        self.stop();
        self.reconciler.open_snapshot(doc)
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.unbind();
        }
    }
}

/// Fire a tick every `period`. Each tick runs as its own task so a slow
/// read never delays the schedule; the reconciler's in-flight flag turns
/// overlapping ticks into no-ops.
async fn poll_loop(reconciler: Arc<Reconciler>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // dropped with this future, which aborts every outstanding tick
    let mut ticks = JoinSet::new();

    loop {
        interval.tick().await;
        while let Some(done) = ticks.try_join_next() {
            match done {
                Ok(outcome) => tracing::trace!(?outcome, "tick finished"),
                Err(e) if e.is_panic() => tracing::warn!(error = %e, "tick panicked"),
                Err(_) => {}
            }
        }
        let reconciler = Arc::clone(&reconciler);
        ticks.spawn(async move { reconciler.tick().await });
    }
}
