//! Spread alerts: SQLite-backed definitions plus an edge-triggered
//! evaluator run against every published scan snapshot.

pub mod evaluator;
pub mod store;

pub use evaluator::AlertEvaluator;
pub use store::{AlertStore, NewAlert};
