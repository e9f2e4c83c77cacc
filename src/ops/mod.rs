pub mod check;
pub mod filter;
pub mod graph;
pub mod stats;
