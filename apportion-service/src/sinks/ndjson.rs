use futures::StreamExt;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use utility_client::engine::{MeterPeriodReport, PeriodOutcome};

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes each allocated meter report as one JSON line.
pub struct NdjsonReportSink<W> {
    writer: Mutex<W>,
    batch_size: usize,
}

impl<W> NdjsonReportSink<W>
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

    fn encode_batch(batch: &[MeterPeriodReport]) -> Result<Vec<u8>, PipelineError> {
        let mut out = Vec::with_capacity(batch.len().saturating_mul(512));
        for report in batch {
            serde_json::to_writer(&mut out, report)
                .map_err(|e| PipelineError::Sink(format!("failed to encode report: {e}")))?;
            out.push(b'\n');
        }
        Ok(out)
    }

    async fn flush_batch(&self, batch: &[MeterPeriodReport]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let payload = Self::encode_batch(batch)?;
        let mut writer = self.writer.lock().await;
        match writer.write_all(&payload).await {
            Ok(()) => {
                metrics::counter!("report_rows_written_total").increment(batch.len() as u64);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "ndjson report write failed");
                metrics::counter!("report_sink_errors_total").increment(1);
                Err(PipelineError::Sink(format!("ndjson write failed: {e}")))
            }
        }
    }
}

#[async_trait::async_trait]
impl<W> Sink<PeriodOutcome> for NdjsonReportSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<PeriodOutcome>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut buffer: Vec<MeterPeriodReport> = Vec::with_capacity(self.batch_size);
        let mut skipped = 0usize;
        let mut failed = 0usize;

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for NdjsonReportSink");
                    failed += 1;
                    continue;
                }
            };

            match env.payload {
                PeriodOutcome::Allocated(report) => buffer.push(report),
                PeriodOutcome::Skipped(consumption) => {
                    tracing::debug!(meter_id = consumption.meter_id, "meter skipped, no consumption");
                    skipped += 1;
                    continue;
                }
            }

            if buffer.len() >= self.batch_size {
                self.flush_batch(&buffer).await?;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            self.flush_batch(&buffer).await?;
        }

        self.writer
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| PipelineError::Sink(format!("ndjson flush failed: {e}")))?;

        if failed > 0 {
            tracing::error!(skipped, failed, "ndjson report incomplete");
            return Err(PipelineError::Sink(format!("report incomplete: {failed} upstream errors")));
        }

        tracing::info!(skipped, "ndjson report complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::rows::fixtures;
    use utility_client::domain::SplitMethod;

    #[tokio::test]
    async fn writes_arrived_reports_and_fails_on_upstream_error() {
        let sink = NdjsonReportSink::new(Vec::<u8>::new(), 1);
        let items = vec![
            Ok(Envelope::new(PeriodOutcome::Allocated(fixtures::report(
                SplitMethod::Area,
                fixtures::two_rooms(),
            )))),
            Err(PipelineError::Transform("bad input".to_string())),
            Ok(Envelope::new(PeriodOutcome::Allocated(fixtures::report(
                SplitMethod::Custom,
                fixtures::two_rooms(),
            )))),
        ];

        let result = sink.run(futures::stream::iter(items)).await;

        // Reports that did arrive are still written before the run fails.
        assert!(matches!(result, Err(PipelineError::Sink(_))));
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["allocation"]["rooms"][0]["cost"], "30.00");
        assert_eq!(lines[0]["cost_basis"]["basis"], "billed");
        assert_eq!(lines[1]["allocation"]["rooms"][1]["percentage"], "N/A");
    }
}
