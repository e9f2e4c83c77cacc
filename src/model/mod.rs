pub mod task;
pub mod document;
pub mod config;

pub use task::*;
pub use document::*;
pub use config::*;
