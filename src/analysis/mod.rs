//! Analysis of funnel query results.
//!
//! `aggregator` folds the per-slot results into the composite view state;
//! `overview` derives the headline figures and chart series.

pub mod aggregator;
pub mod overview;

pub use aggregator::*;
