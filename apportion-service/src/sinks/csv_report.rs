use futures::StreamExt;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use utility_client::engine::PeriodOutcome;

use super::rows::{report_rows, ReportRow};
use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes one CSV row per (meter, room) allocation, with a single header row.
pub struct CsvReportSink<W> {
    writer: Mutex<W>,
    batch_size: usize,
}

impl<W> CsvReportSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, batch_size: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            batch_size: batch_size.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn encode_batch(batch: &[ReportRow], with_header: bool) -> Result<Vec<u8>, PipelineError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::with_capacity(batch.len().saturating_mul(160)));
        if with_header {
            wtr.write_record(ReportRow::HEADER)
                .map_err(|e| PipelineError::Sink(format!("failed to encode csv header: {e}")))?;
        }
        for row in batch {
            wtr.serialize(row)
                .map_err(|e| PipelineError::Sink(format!("failed to encode csv row: {e}")))?;
        }
        wtr.into_inner()
            .map_err(|e| PipelineError::Sink(format!("failed to finish csv batch: {e}")))
    }

    async fn flush_batch(&self, batch: &[ReportRow], with_header: bool) -> Result<(), PipelineError> {
        if batch.is_empty() && !with_header {
            return Ok(());
        }

        let payload = Self::encode_batch(batch, with_header)?;
        let mut writer = self.writer.lock().await;
        match writer.write_all(&payload).await {
            Ok(()) => {
                metrics::counter!("report_rows_written_total").increment(batch.len() as u64);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "csv report write failed");
                metrics::counter!("report_sink_errors_total").increment(1);
                Err(PipelineError::Sink(format!("csv write failed: {e}")))
            }
        }
    }
}

#[async_trait::async_trait]
impl<W> Sink<PeriodOutcome> for CsvReportSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<PeriodOutcome>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut buffer: Vec<ReportRow> = Vec::with_capacity(self.batch_size);
        let mut header_pending = true;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for CsvReportSink");
                    failed += 1;
                    continue;
                }
            };

            match &env.payload {
                PeriodOutcome::Allocated(report) => buffer.extend(report_rows(report)),
                PeriodOutcome::Skipped(consumption) => {
                    tracing::debug!(meter_id = consumption.meter_id, "meter skipped, no consumption");
                    skipped += 1;
                    continue;
                }
            }

            if buffer.len() >= self.batch_size {
                self.flush_batch(&buffer, header_pending).await?;
                header_pending = false;
                buffer.clear();
            }
        }

        // Also reached with an empty buffer so a report of skipped meters still has its header.
        if !buffer.is_empty() || header_pending {
            self.flush_batch(&buffer, header_pending).await?;
        }

        self.writer
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| PipelineError::Sink(format!("csv flush failed: {e}")))?;

        if failed > 0 {
            tracing::error!(skipped, failed, "csv report incomplete");
            return Err(PipelineError::Sink(format!("report incomplete: {failed} upstream errors")));
        }

        tracing::info!(skipped, "csv report complete");
        Ok(())
    }
}
