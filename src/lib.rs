//! Execution core for a distributed analytical query engine
//!
//! This library implements the local half of a query engine that compiles
//! analytical queries into remote index operations against a columnar
//! document store:
//! - Hierarchical group numbering for nested GROUP BY (GroupKeySet chains)
//! - Aggregate metric and filter expression trees with dual batch and
//!   streaming evaluation
//! - Regroup action translation, validation, and plan optimization
//! - A thin execution driver over the remote session boundary
//!
//! The core performs no I/O of its own: it is pure computation over dense
//! stats arrays or sorted term streams fetched by the driver.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actions;
pub mod docquery;
pub mod error;
pub mod filters;
pub mod groupkeys;
pub mod metrics;
pub mod schema;
pub mod session;
pub mod types;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use actions::Action;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use filters::AggregateFilter;
pub use groupkeys::{GroupKey, GroupKeySet, GroupKeySetRef};
pub use metrics::AggregateMetric;
pub use session::{RegroupRule, RemoteSession, Session};
pub use types::{QualifiedPush, Term};
