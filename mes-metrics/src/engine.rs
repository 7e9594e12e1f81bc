//! Production metrics engine
//!
//! Entry points for yield summaries, defect Pareto charts, raw error-code
//! breakdowns and product listings. Every call is a pure function of its
//! inputs and the database contents at call time.

use crate::aggregate::aggregate;
use crate::db::{fetch_attempts, product_options, AttemptFilter, CorrelationPath, ProductOption};
use crate::enrichment::ReasonEnricher;
use crate::error::{MetricsError, QueryScope};
use crate::merge::merge;
use crate::model::AttemptRow;
use crate::pareto::{build_pareto, error_code_stats, ErrorCodeStats, ParetoChart};
use crate::registry::{StepInfo, StepRegistry};
use crate::summary::{
    summarize, summarize_groups, MetricsSummary, StationMetrics, WorkOrderMetrics,
};
use futures::future::try_join_all;
use mes_common::db::OriginRouter;
use mes_common::time::DateRange;
use mes_common::Origin;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Scope of a metrics summary
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    pub step_type: String,
    pub origin: Option<Origin>,
    #[serde(default)]
    pub range: DateRange,
    /// Material code
    pub product: Option<String>,
    pub work_order: Option<String>,
    /// Station numbers; empty means every station
    #[serde(default)]
    pub stations: Vec<i64>,
}

/// Scope of a Pareto breakdown
#[derive(Debug, Clone, Deserialize)]
pub struct ParetoQuery {
    pub step_type: String,
    pub origin: Origin,
    #[serde(default)]
    pub range: DateRange,
    /// Material codes; empty means no product filter
    #[serde(default)]
    pub products: Vec<String>,
    pub work_order: Option<String>,
    #[serde(default)]
    pub stations: Vec<i64>,
}

impl MetricsQuery {
    fn scope(&self) -> QueryScope {
        QueryScope {
            step_type: self.step_type.clone(),
            origin: self.origin,
            range: self.range.clone(),
            products: self.product.iter().cloned().collect(),
            work_order: self.work_order.clone(),
            stations: self.stations.clone(),
        }
    }
}

impl ParetoQuery {
    fn scope(&self) -> QueryScope {
        QueryScope {
            step_type: self.step_type.clone(),
            origin: Some(self.origin),
            range: self.range.clone(),
            products: self.products.clone(),
            work_order: self.work_order.clone(),
            stations: self.stations.clone(),
        }
    }
}

/// Aggregation engine over the origin databases
#[derive(Clone)]
pub struct MetricsEngine {
    router: Arc<OriginRouter>,
    registry: &'static StepRegistry,
    enricher: ReasonEnricher,
}

impl MetricsEngine {
    pub fn new(router: Arc<OriginRouter>, enricher: ReasonEnricher) -> Self {
        Self {
            router,
            registry: StepRegistry::builtin(),
            enricher,
        }
    }

    pub fn router(&self) -> &OriginRouter {
        &self.router
    }

    /// Step types this engine can aggregate
    pub fn steps(&self) -> Vec<StepInfo> {
        self.registry.catalog()
    }

    /// Yield, throughput and duration summary for a step
    pub async fn get_metrics(&self, query: &MetricsQuery) -> Result<MetricsSummary, MetricsError> {
        let scope = query.scope();
        let rows = self
            .collect_rows(&scope)
            .await
            .map_err(|e| MetricsError::aggregation(&scope, e))?;

        let units = aggregate(rows);
        let summary = summarize(&units);
        info!(step = %query.step_type, units = units.len(), "Computed step metrics");
        Ok(summary)
    }

    /// Per-work-order summaries, ordered by work order code
    pub async fn get_work_order_breakdown(
        &self,
        query: &MetricsQuery,
    ) -> Result<Vec<WorkOrderMetrics>, MetricsError> {
        let scope = query.scope();
        let rows = self
            .collect_rows(&scope)
            .await
            .map_err(|e| MetricsError::aggregation(&scope, e))?;

        let groups = summarize_groups(rows, |row| row.work_order.clone());
        debug!(step = %query.step_type, work_orders = groups.len(), "Computed work order breakdown");
        Ok(groups
            .into_iter()
            .map(|(work_order, summary)| WorkOrderMetrics { work_order, summary })
            .collect())
    }

    /// Per-station summaries, ordered by station number; rows without a station are left out
    pub async fn get_station_breakdown(
        &self,
        query: &MetricsQuery,
    ) -> Result<Vec<StationMetrics>, MetricsError> {
        let scope = query.scope();
        let rows = self
            .collect_rows(&scope)
            .await
            .map_err(|e| MetricsError::aggregation(&scope, e))?;

        let groups = summarize_groups(rows, |row| row.station_number);
        debug!(step = %query.step_type, stations = groups.len(), "Computed station breakdown");
        Ok(groups
            .into_iter()
            .map(|(station, summary)| StationMetrics { station, summary })
            .collect())
    }

    /// Defect Pareto for a step's failing rows
    pub async fn get_pareto_breakdown(&self, query: &ParetoQuery) -> Result<ParetoChart, MetricsError> {
        let scope = query.scope();
        let chart = self
            .pareto(&scope)
            .await
            .map_err(|e| MetricsError::aggregation(&scope, e))?;

        info!(
            step = %query.step_type,
            categories = chart.categories.len(),
            failures = chart.total(),
            "Computed defect Pareto"
        );
        Ok(chart)
    }

    /// Raw result-code tally over all merged rows of a step
    pub async fn get_error_code_stats(&self, query: &MetricsQuery) -> Result<ErrorCodeStats, MetricsError> {
        let scope = query.scope();
        let rows = self
            .collect_rows(&scope)
            .await
            .map_err(|e| MetricsError::aggregation(&scope, e))?;
        Ok(error_code_stats(&rows))
    }

    /// Products produced within a range, via either identity path
    pub async fn get_product_options(
        &self,
        origin: Option<Origin>,
        range: &DateRange,
    ) -> Result<Vec<ProductOption>, MetricsError> {
        let pool = self.router.resolve(origin);
        product_options(pool, range).await.map_err(|e| {
            let scope = QueryScope {
                step_type: "*".to_string(),
                origin,
                range: range.clone(),
                ..Default::default()
            };
            MetricsError::aggregation(&scope, e)
        })
    }

    async fn pareto(&self, scope: &QueryScope) -> mes_common::Result<ParetoChart> {
        let Some(entry) = self.registry.entry(&scope.step_type) else {
            debug!(step = %scope.step_type, "Unknown step type; empty Pareto");
            return Ok(ParetoChart::default());
        };

        let mut rows = self.collect_rows(scope).await?;

        let pool = self.router.resolve(scope.origin);
        let mut normalizer = self
            .enricher
            .normalizer(pool, &scope.step_type, entry.reason_source(scope.origin))
            .await?;

        for row in rows.iter_mut().filter(|row| !row.is_success()) {
            row.failure_reason = Some(normalizer.normalize(row).await?);
        }

        Ok(build_pareto(&rows))
    }

    /// Fetch every descriptor × product through both identity paths, then merge.
    ///
    /// All reads run concurrently; any failure fails the whole scope.
    async fn collect_rows(&self, scope: &QueryScope) -> mes_common::Result<Vec<AttemptRow>> {
        let descriptors = self.registry.descriptors_for(&scope.step_type);
        if descriptors.is_empty() {
            debug!(step = %scope.step_type, "Unknown step type; no data");
            return Ok(Vec::new());
        }

        let pool = self.router.resolve(scope.origin);
        let products: Vec<Option<&str>> = if scope.products.is_empty() {
            vec![None]
        } else {
            scope.products.iter().map(|p| Some(p.as_str())).collect()
        };

        let mut reads = Vec::new();
        for path in CorrelationPath::ALL {
            for descriptor in descriptors {
                for product in &products {
                    let filter = AttemptFilter {
                        product: *product,
                        work_order: scope.work_order.as_deref(),
                        stations: &scope.stations,
                        range: Some(&scope.range),
                    };
                    reads.push(async move {
                        fetch_attempts(pool, descriptor, path, &filter)
                            .await
                            .map(|rows| (path, rows))
                    });
                }
            }
        }

        let mut beam = Vec::new();
        let mut tag = Vec::new();
        for (path, rows) in try_join_all(reads).await? {
            match path {
                CorrelationPath::ViaBeamIdentity => beam.extend(rows),
                CorrelationPath::ViaTagIdentity => tag.extend(rows),
            }
        }

        let fetched = beam.len() + tag.len();
        let merged = merge(beam, tag);
        debug!(
            step = %scope.step_type,
            fetched,
            merged = merged.len(),
            "Merged correlation paths"
        );
        Ok(merged)
    }
}
