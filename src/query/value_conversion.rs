//! Value conversion between attribute JSON and sea-query bind values.
//!
//! Attributes are stored as `serde_json::Value`; statements bind
//! `sea_query::Value`. Scalars map to their natural SQL type, arrays and
//! objects are bound as JSON.
//!
//! With the `postgres` feature, [`with_converted_params`] additionally turns
//! built statement values into `may_postgres` `ToSql` parameters.

use crate::schema::ColumnType;
use sea_query::Value;
use serde_json::Value as JsonValue;

/// Convert an attribute value into a bind value
pub fn to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::String(None),
        JsonValue::Bool(b) => Value::Bool(Some(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(Some(i))
            } else if let Some(u) = n.as_u64() {
                Value::BigUnsigned(Some(u))
            } else {
                Value::Double(n.as_f64())
            }
        }
        JsonValue::String(s) => Value::String(Some(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Json(Some(Box::new(json.clone()))),
    }
}

/// Convert a column value, binding NULL with the column's own type
pub fn to_column_value(json: &JsonValue, column_type: ColumnType) -> Value {
    if !json.is_null() {
        return to_value(json);
    }
    match column_type {
        ColumnType::Integer => Value::BigInt(None),
        ColumnType::Real => Value::Double(None),
        ColumnType::Boolean => Value::Bool(None),
        ColumnType::Json => Value::Json(None),
        ColumnType::Text => Value::String(None),
    }
}

/// Convert sea-query values to `may_postgres` parameters and run `f` with them
///
/// Parameters are owned by this frame, so the references handed to `f` stay
/// valid for the duration of the call.
///
/// # Errors
///
/// Returns `ExecError::Other` for value types with no parameter mapping.
#[cfg(feature = "postgres")]
pub fn with_converted_params<F, R>(
    values: &sea_query::Values,
    f: F,
) -> Result<R, crate::executor::ExecError>
where
    F: FnOnce(&[&dyn may_postgres::types::ToSql]) -> Result<R, crate::executor::ExecError>,
{
    use crate::executor::ExecError;
    use may_postgres::types::ToSql;

    let mut owned: Vec<Box<dyn ToSql>> = Vec::with_capacity(values.iter().count());
    for value in values.iter() {
        let param: Box<dyn ToSql> = match value {
            Value::Bool(b) => Box::new(*b),
            Value::TinyInt(i) => Box::new(i.map(i16::from)),
            Value::SmallInt(i) => Box::new(*i),
            Value::Int(i) => Box::new(*i),
            Value::BigInt(i) => Box::new(*i),
            Value::TinyUnsigned(u) => Box::new(u.map(i16::from)),
            Value::SmallUnsigned(u) => Box::new(u.map(i32::from)),
            Value::Unsigned(u) => Box::new(u.map(i64::from)),
            Value::BigUnsigned(u) => Box::new(
                u.map(|u| {
                    i64::try_from(u).map_err(|_| {
                        ExecError::Other(format!(
                            "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                            i64::MAX
                        ))
                    })
                })
                .transpose()?,
            ),
            Value::Float(f) => Box::new(*f),
            Value::Double(d) => Box::new(*d),
            Value::String(s) => Box::new(s.clone()),
            Value::Bytes(b) => Box::new(b.clone()),
            Value::Json(j) => Box::new(j.as_deref().cloned()),
            _ => {
                return Err(ExecError::Other(format!(
                    "Unsupported value type in query: {value:?}"
                )))
            }
        };
        owned.push(param);
    }

    let params: Vec<&dyn ToSql> = owned.iter().map(|param| param.as_ref()).collect();
    f(&params)
}
