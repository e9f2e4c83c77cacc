pub mod config_io;
pub mod lock;
pub mod project_io;
pub mod source;
pub mod store;

pub use source::{FileSource, LocalFileSource, SourceError, SourceRead};
pub use store::{JsonSnapshotStore, SnapshotStore, StoreError};
