use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::UtilityStore;
use crate::{
    domain::{Meter, Reading, Room, SplitMethod, UtilityType},
    engine::BillingPeriod,
};

/// Read-only queries against the property management schema.
///
/// The schema itself is owned and migrated elsewhere; only the columns
/// selected below are relied on.
#[derive(Clone)]
pub struct PgUtilityStore {
    pool: PgPool,
}

impl PgUtilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct MeterRow {
    id: i32,
    property_id: i32,
    utility_type: String,
    meter_number: Option<String>,
    split_method: Option<String>,
    unit_price: Option<Decimal>,
}

impl TryFrom<MeterRow> for Meter {
    type Error = anyhow::Error;

    fn try_from(row: MeterRow) -> Result<Self> {
        let utility_type: UtilityType = row
            .utility_type
            .parse()
            .with_context(|| format!("meter {}", row.id))?;

        Ok(Meter {
            id: row.id,
            property_id: row.property_id,
            utility_type,
            meter_number: row.meter_number,
            split_method: SplitMethod::parse_lenient(row.split_method.as_deref()),
            unit_price: row.unit_price,
        })
    }
}

const METER_COLUMNS: &str = "id, property_id, utility_type, meter_number, split_method, unit_price";

fn into_meters(rows: Vec<MeterRow>) -> Result<Vec<Meter>> {
    rows.into_iter().map(Meter::try_from).collect()
}

#[async_trait::async_trait]
impl UtilityStore for PgUtilityStore {
    async fn meter(&self, meter_id: i32) -> Result<Option<Meter>> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters WHERE id = $1");
        let row = sqlx::query_as::<_, MeterRow>(&sql)
            .bind(meter_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Meter::try_from).transpose()
    }

    async fn meters(&self) -> Result<Vec<Meter>> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters ORDER BY property_id, id");
        let rows = sqlx::query_as::<_, MeterRow>(&sql).fetch_all(&self.pool).await?;

        into_meters(rows)
    }

    async fn meters_for_property(&self, property_id: i32) -> Result<Vec<Meter>> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters WHERE property_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, MeterRow>(&sql)
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;

        into_meters(rows)
    }

    async fn readings_for_meter(&self, meter_id: i32) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT
                id,
                meter_id,
                date,
                value,
                created_at,
                notes
            FROM readings
            WHERE meter_id = $1
            ORDER BY date, created_at NULLS FIRST, id
            "#,
        )
        .bind(meter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn reading(&self, reading_id: i32) -> Result<Option<Reading>> {
        let row = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, meter_id, date, value, created_at, notes
            FROM readings
            WHERE id = $1
            "#,
        )
        .bind(reading_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn rooms_for_meter(&self, meter_id: i32) -> Result<Vec<Room>> {
        let rows = sqlx::query_as::<_, Room>(
            r#"
            SELECT
                r.id,
                r.property_id,
                r.name,
                r.square_meters
            FROM meter_rooms mr
            JOIN rooms r ON r.id = mr.room_id
            WHERE mr.meter_id = $1
            ORDER BY r.name, r.id
            "#,
        )
        .bind(meter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn billed_amount(&self, meter_id: i32, period: BillingPeriod) -> Result<Option<Decimal>> {
        let (start, end) = period.bounds()?;
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount)
            FROM bills
            WHERE meter_id = $1
              AND date >= $2
              AND date <  $3
            "#,
        )
        .bind(meter_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn utility_price(&self, utility: UtilityType) -> Result<Option<Decimal>> {
        let price: Option<Decimal> =
            sqlx::query_scalar("SELECT price FROM utility_prices WHERE utility_type = $1")
                .bind(utility.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(price)
    }
}
