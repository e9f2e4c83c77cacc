//! Live synchronization of the in-memory snapshot with a task file.

pub mod live;
pub mod reconciler;
pub mod snapshot;

pub use live::LiveSync;
pub use reconciler::{Reconciler, SyncFault, SyncState, SyncStatus, TickOutcome};
pub use snapshot::SnapshotCell;
