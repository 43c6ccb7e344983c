use std::{env, sync::Arc};

use anyhow::{bail, Context, Result};
use apportion_service::{
    config::{AppConfig, ReportConfig, ReportFormat},
    observability,
    pipeline::{Envelope, Pipeline, PipelineError, Sink, Source},
    sinks::{CsvReportSink, NdjsonReportSink},
    sources::{PeriodInputFileSource, StoreMonthSource},
    transform::{AllocationStage, PeriodInputValidation},
};
use sqlx::postgres::PgPoolOptions;
use tokio::io::AsyncWrite;
use utility_client::{
    db::PgUtilityStore,
    engine::{BillingPeriod, MeterPeriodInput, PeriodOutcome},
};

const BATCH_SIZE: usize = 100;

const USAGE: &str = "usage: monthly_report <year> <month> [property_id]\n       monthly_report --input <period_inputs.ndjson>";

type Output = Box<dyn AsyncWrite + Send + Unpin>;

enum ReportSink {
    Ndjson(NdjsonReportSink<Output>),
    Csv(CsvReportSink<Output>),
}

#[async_trait::async_trait]
impl Sink<PeriodOutcome> for ReportSink {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<PeriodOutcome>, PipelineError>> + Send + Unpin + 'static,
    {
        match self {
            Self::Ndjson(s) => s.run(input).await,
            Self::Csv(s) => s.run(input).await,
        }
    }
}

async fn open_output(report: &ReportConfig) -> Result<Output> {
    match &report.output_path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create report file '{path}'"))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

async fn report_sink(report: &ReportConfig) -> Result<ReportSink> {
    let output = open_output(report).await?;
    Ok(match report.format {
        ReportFormat::Ndjson => ReportSink::Ndjson(NdjsonReportSink::new(output, BATCH_SIZE)),
        ReportFormat::Csv => ReportSink::Csv(CsvReportSink::new(output, BATCH_SIZE)),
    })
}

async fn run<S>(source: S, report: &ReportConfig) -> Result<()>
where
    S: Source<MeterPeriodInput> + 'static,
{
    let pipeline: Pipeline<_, MeterPeriodInput, PeriodOutcome, _> = Pipeline {
        source,
        checks: vec![Arc::new(PeriodInputValidation)],
        stage: Arc::new(AllocationStage),
        sink: report_sink(report).await?,
    };

    pipeline.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--input") {
        let Some(path) = args.get(1) else {
            bail!(USAGE);
        };

        // Offline runs need no database, so a missing config only costs the report settings.
        let report = match AppConfig::load() {
            Ok(cfg) => cfg.report,
            Err(e) => {
                tracing::warn!(error = %e, "no usable config, writing ndjson to stdout");
                ReportConfig::default()
            }
        };

        return run(PeriodInputFileSource::new(path), &report).await;
    }

    let (year, month, property_id) = match args.as_slice() {
        [year, month] => (year, month, None),
        [year, month, property_id] => (year, month, Some(property_id)),
        _ => bail!(USAGE),
    };

    let year: i32 = year.parse().with_context(|| format!("invalid year '{year}'"))?;
    let month: u8 = month.parse().with_context(|| format!("invalid month '{month}'"))?;
    let property_id: Option<i32> = property_id
        .map(|p| p.parse().with_context(|| format!("invalid property id '{p}'")))
        .transpose()?;
    let period = BillingPeriod::new(year, month)?;

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgUtilityStore::new(pool));

    tracing::info!(%period, ?property_id, "running monthly report");
    run(StoreMonthSource::new(store, period, property_id), &cfg.report).await
}
