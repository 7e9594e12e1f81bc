//! Error types for the metrics engine

use mes_common::time::DateRange;
use mes_common::Origin;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which query failed: step, origin, window and product/work-order/station filters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryScope {
    pub step_type: String,
    pub origin: Option<Origin>,
    pub range: DateRange,
    pub products: Vec<String>,
    pub work_order: Option<String>,
    pub stations: Vec<i64>,
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}", self.step_type)?;
        if let Some(origin) = self.origin {
            write!(f, " @ {}", origin)?;
        }
        write!(f, ", range {}", self.range)?;
        if !self.products.is_empty() {
            write!(f, ", product {}", self.products.join("|"))?;
        }
        if let Some(work_order) = &self.work_order {
            write!(f, ", work order {}", work_order)?;
        }
        if !self.stations.is_empty() {
            let stations: Vec<String> = self.stations.iter().map(i64::to_string).collect();
            write!(f, ", station {}", stations.join("|"))?;
        }
        Ok(())
    }
}

/// Metrics engine error
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A read or enrichment call failed; nothing was aggregated for the scope
    #[error("Aggregation failed for {scope}: {source}")]
    Aggregation {
        scope: Box<QueryScope>,
        #[source]
        source: mes_common::Error,
    },

    /// Setup failure outside any query scope
    #[error(transparent)]
    Common(#[from] mes_common::Error),
}

impl MetricsError {
    pub(crate) fn aggregation(scope: &QueryScope, source: mes_common::Error) -> Self {
        MetricsError::Aggregation {
            scope: Box::new(scope.clone()),
            source,
        }
    }

    /// Scope of a failed aggregation
    pub fn scope(&self) -> Option<&QueryScope> {
        match self {
            MetricsError::Aggregation { scope, .. } => Some(scope),
            MetricsError::Common(_) => None,
        }
    }
}
