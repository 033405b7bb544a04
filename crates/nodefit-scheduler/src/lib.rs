//! Nodefit Scheduler - CPU-fit pod placement
//!
//! This crate provides:
//! - Committed CPU accounting per node
//! - Fit evaluation with FailedScheduling events
//! - Node selection (lowest price, first fit)
//! - Pod binding with Scheduled events
//! - Watch ingestion and periodic reconciliation feeding one serialized coordinator

pub mod accounting;
pub mod binder;
pub mod coordinator;
pub mod error;
pub mod fit;
pub mod reconcile;
pub mod recorder;
pub mod scheduler;
pub mod select;
pub mod types;
pub mod watch;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use binder::Binder;
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Result, SchedulerError};
pub use fit::{evaluate_fit, FitEvaluator};
pub use reconcile::{ReconcileConfig, Reconciler};
pub use recorder::EventRecorder;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use select::{FirstFit, LowestPrice, NodeSelector, PriceTable};
pub use types::{FilterResult, FitReport, Origin, ResourceUsage, ScheduleOutcome, SkipReason};
pub use watch::{WatchConfig, WatchIngestor};
