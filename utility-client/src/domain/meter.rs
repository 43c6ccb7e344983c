use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of utility a meter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityType {
    #[serde(alias = "electric")]
    Electricity,
    Gas,
    Water,
    Heating,
}

impl UtilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityType::Electricity => "electricity",
            UtilityType::Gas => "gas",
            UtilityType::Water => "water",
            UtilityType::Heating => "heating",
        }
    }
}

impl fmt::Display for UtilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown utility type '{0}'")]
pub struct UnknownUtilityType(pub String);

impl FromStr for UtilityType {
    type Err = UnknownUtilityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "electricity" | "electric" => Ok(UtilityType::Electricity),
            "gas" => Ok(UtilityType::Gas),
            "water" => Ok(UtilityType::Water),
            "heating" => Ok(UtilityType::Heating),
            other => Err(UnknownUtilityType(other.to_string())),
        }
    }
}

/// Policy for dividing a meter's consumption and cost among its rooms.
///
/// Only `Area` and `Equal` have a defined formula. `Custom` and `Individual`
/// are accepted values without one and allocate as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Area,
    Equal,
    Custom,
    Individual,
}

impl SplitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMethod::Area => "area",
            SplitMethod::Equal => "equal",
            SplitMethod::Custom => "custom",
            SplitMethod::Individual => "individual",
        }
    }

    /// Parse a stored split method, mapping unknown values to `None`.
    ///
    /// A meter with no recognised method still allocates, just as unsupported,
    /// so an odd value in the data never fails a whole report.
    pub fn parse_lenient(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        match raw.parse() {
            Ok(method) => Some(method),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unrecognised split method");
                None
            }
        }
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown split method '{0}'")]
pub struct UnknownSplitMethod(pub String);

impl FromStr for SplitMethod {
    type Err = UnknownSplitMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(SplitMethod::Area),
            "equal" => Ok(SplitMethod::Equal),
            "custom" => Ok(SplitMethod::Custom),
            "individual" => Ok(SplitMethod::Individual),
            other => Err(UnknownSplitMethod(other.to_string())),
        }
    }
}

fn lenient_split_method<'de, D>(deserializer: D) -> Result<Option<SplitMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(SplitMethod::parse_lenient(raw.as_deref()))
}

/// A physical utility meter belonging to a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub id: i32,
    pub property_id: i32,
    pub utility_type: UtilityType,
    #[serde(default)]
    pub meter_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_split_method")]
    pub split_method: Option<SplitMethod>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}
