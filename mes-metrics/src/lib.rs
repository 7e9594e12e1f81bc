//! mes-metrics library - multi-source production metrics aggregation
//!
//! Answers "for this step, time window, product and work order, what is the
//! yield, throughput and defect breakdown?" over production events that are
//! spread across several tables, two serial-number correlation paths and
//! several origin databases.
//!
//! Pipeline: [`registry`] → [`db`] (both correlation paths) → [`merge`] →
//! [`aggregate`] → [`summary`] / [`pareto`].

pub mod aggregate;
pub mod db;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod merge;
pub mod model;
pub mod pareto;
pub mod registry;
pub mod summary;

pub use engine::{MetricsEngine, MetricsQuery, ParetoQuery};
pub use error::{MetricsError, QueryScope};
pub use model::{is_success, AttemptRow, ResultCode};
pub use pareto::{ErrorCodeStats, ParetoChart};
pub use registry::StepInfo;
pub use summary::{MetricsSummary, Reading, StationMetrics, WorkOrderMetrics};
