use crate::pipeline::{Envelope, PipelineError, Transform};
use rust_decimal::Decimal;
use time::macros::date;
use utility_client::engine::{allocate_period, MeterPeriodInput, PeriodOutcome};

/// Pure validation of a `MeterPeriodInput`.
///
/// Rules:
/// - every reading must belong to the input's meter.
/// - reading dates must fall in a broad sanity window [2000-01-01, 2100-01-01).
/// - reading values, prices, billed amounts and room areas must stay within
///   ±10^12, so deltas and period sums cannot overflow.
///
/// Negative deltas are not rejected here; they are reported with the result.
pub fn validate_period_input(
    env: Envelope<MeterPeriodInput>,
) -> Result<Envelope<MeterPeriodInput>, PipelineError> {
    let input = &env.payload;
    let meter_id = input.meter.id;

    if let Some(stray) = input.readings.iter().find(|r| r.meter_id != meter_id) {
        return Err(PipelineError::Transform(format!(
            "reading {} belongs to meter {}, not meter {meter_id}",
            stray.id, stray.meter_id
        )));
    }

    let min_date = date!(2000-01-01);
    let max_date = date!(2100-01-01);

    if let Some(r) = input.readings.iter().find(|r| r.date < min_date || r.date >= max_date) {
        return Err(PipelineError::Transform(format!(
            "reading {} date {} out of allowed range",
            r.id, r.date
        )));
    }

    let limit = max_magnitude();
    let out_of_range = |v: &Decimal| v.abs() > limit;

    if let Some(r) = input.readings.iter().find(|r| out_of_range(&r.value)) {
        return Err(PipelineError::Transform(format!(
            "reading {} value {} out of allowed range",
            r.id, r.value
        )));
    }
    if let Some(room) = input.rooms.iter().find(|room| out_of_range(&room.square_meters)) {
        return Err(PipelineError::Transform(format!(
            "room {} area {} out of allowed range",
            room.id, room.square_meters
        )));
    }
    let amounts = [
        ("unit_price", input.meter.unit_price),
        ("billed_amount", input.billed_amount),
        ("utility_rate", input.utility_rate),
    ];
    if let Some((field, Some(v))) = amounts.iter().find(|(_, v)| v.as_ref().is_some_and(out_of_range)) {
        return Err(PipelineError::Transform(format!(
            "meter {meter_id} {field} {v} out of allowed range"
        )));
    }

    Ok(env)
}

fn max_magnitude() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

#[derive(Clone, Default)]
pub struct PeriodInputValidation;

#[async_trait::async_trait]
impl Transform<MeterPeriodInput, MeterPeriodInput> for PeriodInputValidation {
    async fn apply(
        &self,
        input: Envelope<MeterPeriodInput>,
    ) -> Result<Envelope<MeterPeriodInput>, PipelineError> {
        match validate_period_input(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_period_input_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

/// Runs the apportionment engine for each meter/period.
#[derive(Clone, Default)]
pub struct AllocationStage;

pub fn record_outcome_metrics(outcome: &PeriodOutcome) {
    match outcome {
        PeriodOutcome::Allocated(report) => {
            metrics::counter!("allocation_runs_total").increment(1);
            if !report.allocation.is_supported() {
                metrics::counter!("allocation_unsupported_total").increment(1);
            }
        }
        PeriodOutcome::Skipped(_) => {
            metrics::counter!("report_meters_skipped_total").increment(1);
        }
    }

    let anomalies = negative_deltas(outcome);
    if anomalies > 0 {
        metrics::counter!("reading_negative_delta_total").increment(anomalies);
    }
}

/// Negative deltas in the period, skipped periods included: one can cancel out the rest.
fn negative_deltas(outcome: &PeriodOutcome) -> u64 {
    let consumption = match outcome {
        PeriodOutcome::Allocated(report) => &report.consumption,
        PeriodOutcome::Skipped(consumption) => consumption,
    };
    consumption.anomalies.len() as u64
}

#[async_trait::async_trait]
impl Transform<MeterPeriodInput, PeriodOutcome> for AllocationStage {
    async fn apply(&self, input: Envelope<MeterPeriodInput>) -> Result<Envelope<PeriodOutcome>, PipelineError> {
        let outcome = input.map(|i| allocate_period(&i));
        record_outcome_metrics(&outcome.payload);
        Ok(outcome)
    }
}
