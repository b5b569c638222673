//! Arrow array value -> [`Scalar`] conversion for exception rows (spec
//! §4.11's sanitization rules: temporal values as ISO-8601, `NaN`/missing
//! dates as explicit null, everything else coerced to its canonical form).
//!
//! Grounded on the teacher's `casparian_sinks_duckdb::arrow_to_duckdb_type`,
//! which performs the inverse mapping for the same Arrow/DuckDB type
//! boundary.

use arrow::array::{
    Array, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use arrow::datatypes::DataType;
use attest_protocol::Scalar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const ARROW_DATE_EPOCH: i32 = 0; // Date32 counts days since 1970-01-01, chrono's default epoch alignment.

/// Convert the value at `row` in `array` into a canonical [`Scalar`]. An
/// array slot that is arrow-null, or a floating-point `NaN`, becomes
/// `Scalar::Null` — auditors must never see a bare `NaN` in persisted
/// evidence.
pub fn arrow_value_to_scalar(array: &dyn Array, row: usize) -> Scalar {
    if array.is_null(row) {
        return Scalar::Null;
    }

    match array.data_type() {
        DataType::Boolean => {
            Scalar::Boolean(array.as_any().downcast_ref::<BooleanArray>().unwrap().value(row))
        }
        DataType::Int8 => Scalar::Integer(array.as_any().downcast_ref::<Int8Array>().unwrap().value(row) as i64),
        DataType::Int16 => Scalar::Integer(array.as_any().downcast_ref::<Int16Array>().unwrap().value(row) as i64),
        DataType::Int32 => Scalar::Integer(array.as_any().downcast_ref::<Int32Array>().unwrap().value(row) as i64),
        DataType::Int64 => Scalar::Integer(array.as_any().downcast_ref::<Int64Array>().unwrap().value(row)),
        DataType::UInt8 => Scalar::Integer(array.as_any().downcast_ref::<UInt8Array>().unwrap().value(row) as i64),
        DataType::UInt16 => Scalar::Integer(array.as_any().downcast_ref::<UInt16Array>().unwrap().value(row) as i64),
        DataType::UInt32 => Scalar::Integer(array.as_any().downcast_ref::<UInt32Array>().unwrap().value(row) as i64),
        DataType::UInt64 => Scalar::Integer(array.as_any().downcast_ref::<UInt64Array>().unwrap().value(row) as i64),
        DataType::Float32 => {
            let v = array.as_any().downcast_ref::<Float32Array>().unwrap().value(row);
            if v.is_nan() {
                Scalar::Null
            } else {
                Scalar::Float(v as f64)
            }
        }
        DataType::Float64 => {
            let v = array.as_any().downcast_ref::<Float64Array>().unwrap().value(row);
            if v.is_nan() {
                Scalar::Null
            } else {
                Scalar::Float(v)
            }
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            Scalar::String(array.as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string())
        }
        DataType::Date32 => {
            let days = array.as_any().downcast_ref::<Date32Array>().unwrap().value(row);
            match NaiveDate::from_ymd_opt(1970, 1, 1).and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days((days - ARROW_DATE_EPOCH) as i64))) {
                Some(date) => Scalar::Date(date),
                None => Scalar::Null,
            }
        }
        DataType::Timestamp(unit, _) => timestamp_to_scalar(array, row, unit),
        other => Scalar::String(format!("<unrepresentable arrow type {other:?}>")),
    }
}

fn timestamp_to_scalar(array: &dyn Array, row: usize, unit: &arrow::datatypes::TimeUnit) -> Scalar {
    use arrow::datatypes::TimeUnit;

    let naive: Option<NaiveDateTime> = match unit {
        TimeUnit::Second => array
            .as_any()
            .downcast_ref::<TimestampSecondArray>()
            .and_then(|a| DateTime::<Utc>::from_timestamp(a.value(row), 0))
            .map(|dt| dt.naive_utc()),
        TimeUnit::Millisecond => array
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|a| DateTime::<Utc>::from_timestamp_millis(a.value(row)))
            .map(|dt| dt.naive_utc()),
        TimeUnit::Microsecond => array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|a| DateTime::<Utc>::from_timestamp_micros(a.value(row)))
            .map(|dt| dt.naive_utc()),
        TimeUnit::Nanosecond => array
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()
            .map(|a| a.value(row))
            .and_then(|ns| DateTime::<Utc>::from_timestamp(ns / 1_000_000_000, (ns % 1_000_000_000) as u32))
            .map(|dt| dt.naive_utc()),
    };

    match naive {
        Some(dt) => Scalar::Timestamp(dt),
        None => Scalar::Null,
    }
}
