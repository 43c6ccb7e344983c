use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

/// A dated cumulative value recorded against one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub id: i32,
    pub meter_id: i32,
    pub date: Date,
    pub value: Decimal,
    /// Insertion time; breaks ties between readings on the same date.
    #[serde(default)]
    pub created_at: Option<PrimitiveDateTime>,
    #[serde(default)]
    pub notes: Option<String>,
}
