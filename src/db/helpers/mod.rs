use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::AnalysisState;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_optional_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| anyhow!("{field} value {raw} is out of range"))
        })
        .transpose()
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_analysis_state(value: &str) -> Result<AnalysisState> {
    AnalysisState::ALL
        .into_iter()
        .find(|state| state.as_str() == value)
        .ok_or_else(|| anyhow!("unknown analysis state {value}"))
}
