use std::path::PathBuf;

use async_stream::try_stream;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use utility_client::engine::MeterPeriodInput;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// NDJSON file of pre-assembled meter inputs, one `MeterPeriodInput` per line.
///
/// Lets a report run offline against an export instead of the database.
/// Blank lines are skipped; a malformed line ends the stream with an error.
pub struct PeriodInputFileSource {
    path: PathBuf,
}

impl PeriodInputFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<MeterPeriodInput> for PeriodInputFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterPeriodInput> {
        let path = self.path.clone();
        let s = try_stream! {
            let file = File::open(&path).await.map_err(|e| {
                PipelineError::Source(format!("failed to open input file {}: {e}", path.display()))
            })?;
            let reader = BufReader::new(file);
            let mut lines = reader.lines();
            let mut line_no = 0usize;

            while let Some(line) = lines.next_line().await.map_err(|e| {
                PipelineError::Source(format!("failed to read input line: {e}"))
            })? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }

                let input: MeterPeriodInput = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        metrics::counter!("period_input_parse_errors_total").increment(1);
                        Err(PipelineError::Source(format!(
                            "failed to parse input line {line_no}: {e}"
                        )))?
                    }
                };

                yield Envelope::new(input);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rust_decimal_macros::dec;
    use utility_client::domain::SplitMethod;

    const LINE: &str = r#"{"meter":{"id":4,"property_id":1,"utility_type":"water","split_method":"equal"},"period":{"year":2024,"month":3},"rooms":[{"id":1,"property_id":1,"name":"A","square_meters":"10"}],"readings":[{"id":1,"meter_id":4,"date":"2024-02-28","value":"12.5"},{"id":2,"meter_id":4,"date":"2024-03-30","value":"20"}],"billed_amount":"30.00"}"#;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.ndjson", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn parses_inputs_and_skips_blank_lines() {
        let path = temp_file("period-inputs", &format!("{LINE}\n\n{LINE}\n"));
        let items: Vec<_> = PeriodInputFileSource::new(&path).stream().await.collect().await;
        std::fs::remove_file(&path).ok();

        assert_eq!(items.len(), 2);
        let input = &items[0].as_ref().unwrap().payload;
        assert_eq!(input.meter.split_method, Some(SplitMethod::Equal));
        assert_eq!(input.readings[1].value, dec!(20));
        assert_eq!(input.billed_amount, Some(dec!(30.00)));
    }

    #[tokio::test]
    async fn malformed_line_is_a_source_error() {
        let path = temp_file("period-inputs-bad", "{not json}\n");
        let items: Vec<_> = PeriodInputFileSource::new(&path).stream().await.collect().await;
        std::fs::remove_file(&path).ok();

        assert!(matches!(items.as_slice(), [Err(PipelineError::Source(_))]));
    }
}
