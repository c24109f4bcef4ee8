//! Column encodings shared by the execution-side tables.
//!
//! Instants are stored as unix milliseconds so range scans compare integers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use formflow_domain::execution::ExecutionKey;
use formflow_domain::id::{OccurrenceId, PipelineId};
use formflow_domain::time::Timestamp;

use crate::error::decode;

pub(crate) fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<Timestamp, sqlx::Error> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| crate::error::decode_msg(format!("timestamp {millis} out of range")))
}

pub(crate) fn action_index(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

/// Read an [`ExecutionKey`] spread over three columns.
pub(crate) fn key_from_row(
    row: &SqliteRow,
    pipeline_col: &str,
    index_col: &str,
    occurrence_col: &str,
) -> Result<ExecutionKey, sqlx::Error> {
    let pipeline_id: String = row.try_get(pipeline_col)?;
    let index: i64 = row.try_get(index_col)?;
    let occurrence_id: String = row.try_get(occurrence_col)?;

    Ok(ExecutionKey::new(
        PipelineId::from_str(&pipeline_id).map_err(decode)?,
        usize::try_from(index).map_err(decode)?,
        OccurrenceId::from_str(&occurrence_id).map_err(decode)?,
    ))
}
