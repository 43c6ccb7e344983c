//! Read-only HTTP endpoints over the apportionment engine.

mod error;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use time::{Date, OffsetDateTime};
use utility_client::{
    db::UtilityStore,
    engine::{BillingPeriod, PeriodConsumption},
};

use crate::report::{self, PropertyMonthReport, ReadingBreakdown};

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UtilityStore>,
}

/// `?year=&month=`; either part defaults to the current month.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

impl PeriodQuery {
    pub fn resolve(&self, today: Date) -> Result<BillingPeriod, ApiError> {
        let year = self.year.unwrap_or(today.year());
        let month = self.month.unwrap_or(today.month() as u8);
        Ok(BillingPeriod::new(year, month)?)
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/properties/:property_id/room-costs", get(property_room_costs))
        .route("/readings/:reading_id/room-consumption", get(reading_room_consumption))
        .route("/meters/:meter_id/consumption", get(meter_consumption))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid api.http_bind_addr '{bind_addr}': {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn property_room_costs(
    State(state): State<AppState>,
    Path(property_id): Path<i32>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<PropertyMonthReport>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "room_costs").increment(1);
    let period = query.resolve(today())?;

    let report = report::property_month_report(state.store.as_ref(), property_id, period).await?;
    Ok(Json(report))
}

async fn reading_room_consumption(
    State(state): State<AppState>,
    Path(reading_id): Path<i32>,
) -> Result<Json<ReadingBreakdown>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "reading_room_consumption").increment(1);

    report::reading_breakdown(state.store.as_ref(), reading_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound {
            resource: "reading",
            id: reading_id,
        })
}

async fn meter_consumption(
    State(state): State<AppState>,
    Path(meter_id): Path<i32>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<PeriodConsumption>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "meter_consumption").increment(1);
    let period = query.resolve(today())?;

    report::meter_consumption(state.store.as_ref(), meter_id, period)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound {
            resource: "meter",
            id: meter_id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use time::macros::date;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState {
            store: Arc::new(report::fixtures::store()),
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn period_query_defaults_to_current_month() {
        let today = date!(2024-05-17);
        let period = PeriodQuery::default().resolve(today).unwrap();
        assert_eq!(period, BillingPeriod::new(2024, 5).unwrap());

        let explicit = PeriodQuery {
            year: Some(2023),
            month: Some(12),
        };
        assert_eq!(explicit.resolve(today).unwrap(), BillingPeriod::new(2023, 12).unwrap());

        let bad = PeriodQuery {
            year: None,
            month: Some(13),
        };
        assert!(matches!(bad.resolve(today), Err(ApiError::InvalidPeriod(_))));
    }

    #[tokio::test]
    async fn room_costs_returns_area_split_in_two_decimals() {
        let (status, body) = get_json("/properties/1/room-costs?year=2024&month=1").await;

        assert_eq!(status, StatusCode::OK);
        let electric = &body["meters"][0];
        assert_eq!(electric["meter_id"], 10);
        assert_eq!(electric["allocation"]["rooms"][0]["room_name"], "Room A");
        assert_eq!(electric["allocation"]["rooms"][0]["consumption"], "20.00");
        assert_eq!(electric["allocation"]["rooms"][0]["cost"], "30.00");
        assert_eq!(electric["allocation"]["rooms"][1]["cost"], "45.00");
        assert_eq!(body["meters"][2]["allocation"]["rooms"][0]["cost"], "N/A");
        assert_eq!(body["skipped_meters"], serde_json::json!([13]));
        assert_eq!(body["total_cost"], "96.05");
    }

    #[tokio::test]
    async fn invalid_month_is_bad_request() {
        let (status, body) = get_json("/properties/1/room-costs?year=2024&month=0").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PERIOD");
    }

    #[tokio::test]
    async fn reading_breakdown_and_not_found() {
        let (status, body) = get_json("/readings/101/room-consumption").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delta"]["consumption"], "50.00");
        assert_eq!(body["allocation"]["rooms"][1]["percentage"], "60.00");
        assert!(body["cost"].is_null());

        let (status, body) = get_json("/readings/4040/room-consumption").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn meter_consumption_for_month() {
        let (status, body) = get_json("/meters/11/consumption?year=2024&month=1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], "10.00");
        assert_eq!(body["period"]["month"], 1);
    }
}
