//! Report query construction.

pub mod builder;

pub use builder::{build_queries, DateOffsets, FunnelQueries, Selection, SelectionError};
