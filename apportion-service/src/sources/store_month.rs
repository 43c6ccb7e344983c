use std::sync::Arc;

use async_stream::stream;
use utility_client::{
    db::UtilityStore,
    engine::{BillingPeriod, MeterPeriodInput},
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Emits one `MeterPeriodInput` per meter for a billing period, read from a store.
///
/// Restricted to a single property when `property_id` is set.
pub struct StoreMonthSource {
    store: Arc<dyn UtilityStore>,
    period: BillingPeriod,
    property_id: Option<i32>,
}

impl StoreMonthSource {
    pub fn new(store: Arc<dyn UtilityStore>, period: BillingPeriod, property_id: Option<i32>) -> Self {
        Self {
            store,
            period,
            property_id,
        }
    }
}

#[async_trait::async_trait]
impl Source<MeterPeriodInput> for StoreMonthSource {
    async fn stream(&self) -> EnvelopeStream<MeterPeriodInput> {
        let store = self.store.clone();
        let period = self.period;
        let property_id = self.property_id;

        let s = stream! {
            let listed = match property_id {
                Some(id) => store.meters_for_property(id).await,
                None => store.meters().await,
            };
            let meters = match listed {
                Ok(meters) => meters,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to list meters: {e:#}")));
                    return;
                }
            };

            tracing::info!(meters = meters.len(), %period, ?property_id, "loading meter inputs");

            // One meter failing to load must not hide the meters after it.
            for meter in meters {
                let meter_id = meter.id;
                match store.period_input(meter, period).await {
                    Ok(input) => yield Ok(Envelope::new(input)),
                    Err(e) => {
                        tracing::error!(meter_id, error = %format!("{e:#}"), "failed to load meter inputs");
                        metrics::counter!("report_meter_load_errors_total").increment(1);
                        yield Err(PipelineError::Source(format!(
                            "failed to load inputs for meter {meter_id}: {e:#}"
                        )));
                    }
                }
            }
        };

        Box::pin(s)
    }
}
