//! `may_postgres`-backed executor (feature `postgres`).
//!
//! Calls block the current coroutine when run under the `may` runtime, so
//! every executor call is a yield point for the scheduler.

use super::{Dialect, ExecError, Executor};
use crate::model::Attributes;
use crate::query::value_conversion::with_converted_params;
#[cfg(feature = "tracing")]
use crate::tracing_helpers;
use may_postgres::types::Type;
use may_postgres::{Client, Row};
use serde_json::{Number, Value as JsonValue};

/// Executor over a single `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Executor for MayPostgresExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&self, sql: &str, values: &sea_query::Values) -> Result<u64, ExecError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        with_converted_params(values, |params| Ok(self.client.execute(sql, params)?))
    }

    fn query_all(&self, sql: &str, values: &sea_query::Values) -> Result<Vec<Attributes>, ExecError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let rows = with_converted_params(values, |params| Ok(self.client.query(sql, params)?))?;
        rows.iter().map(row_to_attributes).collect()
    }
}

fn row_to_attributes(row: &Row) -> Result<Attributes, ExecError> {
    let mut attributes = Attributes::new();
    for (index, column) in row.columns().iter().enumerate() {
        attributes.insert(column.name().to_string(), column_value(row, index, column.type_())?);
    }
    Ok(attributes)
}

fn column_value(row: &Row, index: usize, ty: &Type) -> Result<JsonValue, ExecError> {
    let decode_error = |e: may_postgres::Error| {
        ExecError::ParseError(format!("Failed to decode column {index} ({ty}): {e}"))
    };
    let value = match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(index)
            .map_err(decode_error)?
            .map(JsonValue::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)
            .map_err(decode_error)?
            .and_then(|f| Number::from_f64(f64::from(f)))
            .map(JsonValue::Number),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(index)
            .map_err(decode_error)?
            .and_then(Number::from_f64)
            .map(JsonValue::Number),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<JsonValue>>(index)
            .map_err(decode_error)?,
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        _ => row
            .try_get::<_, Option<String>>(index)
            .map_err(decode_error)?
            .map(JsonValue::String),
    };
    Ok(value.unwrap_or(JsonValue::Null))
}
