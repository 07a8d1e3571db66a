//! Referendum indexer: mirrors OpenGov referenda into a local store.
//!
//! A cycle for one network:
//! - connects to the first reachable endpoint
//! - plans the work set from the store's high-water mark, its unfinalized
//!   rows, the ids enumerated on chain and `ReferendumCount`
//! - fetches, decodes and reconciles every planned id through a bounded
//!   worker pool
//!
//! Finalized rows are never written again, so repeated cycles converge and
//! an unchanged chain produces no writes.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod planner;
pub mod reconcile;
pub mod scheduler;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{IndexerConfig, NetworkConfig};
pub use engine::{CycleReport, NetworkTarget, Reconciler};
pub use error::IndexerError;
pub use logging::{init_logging, LogFormat};
pub use metrics::IndexerMetrics;
pub use planner::{plan_work, PlanInput, WorkItem, WorkPlan, WorkReason};
pub use reconcile::{reconcile, Fetched, Outcome};
pub use scheduler::{schedules, Indexer, NetworkSchedule};
pub use shutdown::ShutdownController;
