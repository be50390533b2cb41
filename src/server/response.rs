use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use polars::prelude::*;
use serde_json::{json, Map, Value};

use crate::access::Denial;
use crate::error::AppError;

/// Rows as JSON objects keyed by column name. Nulls stay null; numbers stay numbers.
pub fn dataframe_to_json(df: &DataFrame) -> Value {
    let cols = df.get_columns();
    let mut out: Vec<Value> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut map = Map::with_capacity(cols.len());
        for c in cols {
            let v = c.get(row).map(any_to_json).unwrap_or(Value::Null);
            map.insert(c.name().to_string(), v);
        }
        out.push(Value::Object(map));
    }
    Value::Array(out)
}

fn any_to_json(av: AnyValue<'_>) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(v) => json!(v),
        AnyValue::Int16(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt8(v) => json!(v),
        AnyValue::UInt16(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Float32(v) => serde_json::Number::from_f64(v as f64).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"status": "error", "code": self.code_str(), "message": self.message()}))).into_response()
    }
}

/// Structured refusal: the denial's own fields plus a human-readable `error`.
pub fn denial_response(d: &Denial) -> Response {
    let status = StatusCode::from_u16(d.http_status()).unwrap_or(StatusCode::FORBIDDEN);
    let mut body = serde_json::to_value(d).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut body {
        map.insert("status".into(), Value::String("denied".into()));
        map.insert("error".into(), Value::String(d.message()));
    }
    (status, Json(body)).into_response()
}
