//! mes-metrics - production metrics query tool
//!
//! Runs one aggregation against the configured origin databases and prints
//! the result as JSON.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mes_common::config::MetricsConfig;
use mes_common::db::OriginRouter;
use mes_common::time::DateRange;
use mes_common::Origin;
use mes_metrics::enrichment::mes_client::MesLabelClient;
use mes_metrics::enrichment::ReasonEnricher;
use mes_metrics::{MetricsEngine, MetricsQuery, ParetoQuery};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "mes-metrics", version, about = "Production yield and defect metrics")]
struct Cli {
    /// Config file (overrides MES_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Yield, throughput and duration summary
    Metrics(ScopeArgs),
    /// Defect Pareto of failing rows
    Pareto(ScopeArgs),
    /// Raw result-code breakdown
    ErrorCodes(ScopeArgs),
    /// Summary per work order
    WorkOrders(ScopeArgs),
    /// Summary per station
    Stations(ScopeArgs),
    /// Products produced in the date range
    Products(RangeArgs),
    /// Known step types with their labels and tables
    Steps,
}

#[derive(Debug, Args)]
struct RangeArgs {
    /// Origin code or name (1/suzhou, 2/mianyang)
    #[arg(long)]
    origin: Option<Origin>,
    /// Start date or timestamp (YYYY-MM-DD expands to 00:00:00)
    #[arg(long)]
    start: Option<String>,
    /// End date or timestamp (YYYY-MM-DD expands to 23:59:59)
    #[arg(long)]
    end: Option<String>,
}

impl RangeArgs {
    fn range(&self) -> DateRange {
        DateRange::normalized(self.start.as_deref(), self.end.as_deref())
    }
}

#[derive(Debug, Args)]
struct ScopeArgs {
    /// Step type (e.g. 020, FQC)
    #[arg(long)]
    step: String,
    #[command(flatten)]
    range: RangeArgs,
    /// Material code; repeat for several products (pareto)
    #[arg(long = "product")]
    products: Vec<String>,
    #[arg(long)]
    work_order: Option<String>,
    /// Station number; repeat for several stations
    #[arg(long = "station")]
    stations: Vec<i64>,
}

impl ScopeArgs {
    fn metrics_query(&self) -> MetricsQuery {
        MetricsQuery {
            step_type: self.step.clone(),
            origin: self.range.origin,
            range: self.range.range(),
            product: self.products.first().cloned(),
            work_order: self.work_order.clone(),
            stations: self.stations.clone(),
        }
    }

    fn pareto_query(&self) -> Result<ParetoQuery> {
        let origin = self
            .range
            .origin
            .ok_or_else(|| anyhow::anyhow!("--origin is required for pareto"))?;
        Ok(ParetoQuery {
            step_type: self.step.clone(),
            origin,
            range: self.range.range(),
            products: self.products.clone(),
            work_order: self.work_order.clone(),
            stations: self.stations.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting mes-metrics v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = MetricsConfig::load(cli.config.as_deref())?;

    let router = match OriginRouter::connect(&config).await {
        Ok(router) => Arc::new(router),
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let labels = MesLabelClient::from_config(&config.enrichment)?;
    let engine = MetricsEngine::new(Arc::clone(&router), ReasonEnricher::new(labels));

    let result = run(&engine, &cli.command).await;
    router.close().await;

    match result {
        Ok(json) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

async fn run(engine: &MetricsEngine, command: &Command) -> Result<String> {
    match command {
        Command::Metrics(args) => to_json(&engine.get_metrics(&args.metrics_query()).await?),
        Command::Pareto(args) => {
            to_json(&engine.get_pareto_breakdown(&args.pareto_query()?).await?)
        }
        Command::ErrorCodes(args) => {
            to_json(&engine.get_error_code_stats(&args.metrics_query()).await?)
        }
        Command::WorkOrders(args) => {
            to_json(&engine.get_work_order_breakdown(&args.metrics_query()).await?)
        }
        Command::Stations(args) => {
            to_json(&engine.get_station_breakdown(&args.metrics_query()).await?)
        }
        Command::Products(args) => {
            to_json(&engine.get_product_options(args.origin, &args.range()).await?)
        }
        Command::Steps => to_json(&engine.steps()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
