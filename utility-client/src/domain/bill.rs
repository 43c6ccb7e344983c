use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

/// A billed amount for one meter, optionally tied to the reading it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bill {
    pub id: i32,
    pub meter_id: i32,
    #[serde(default)]
    pub reading_id: Option<i32>,
    pub date: Date,
    pub amount: Decimal,
    #[serde(default)]
    pub verified: bool,
}
