//! Conversion from Arrow RecordBatch to row-based values.
//!
//! Parquet files arrive as Arrow columns. This module maps the Arrow schema to
//! SQL column types and transposes each RecordBatch into rows of typed
//! [`Value`]s, with nulls represented as [`Value::Null`].

use anyhow::{Context, Result, anyhow, bail};
use arrow::array::*;
use arrow::datatypes::{
    DECIMAL128_MAX_SCALE, DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type,
    Float16Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};

use crate::db::schema::{Column, Schema, SqlType};
use crate::formats::{Row, Value};

/// Map an Arrow data type to the SQL column type it is stored as
pub fn sql_type_for(data_type: &DataType) -> Result<SqlType> {
    Ok(match data_type {
        DataType::Boolean => SqlType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => SqlType::BigInt,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => SqlType::DoublePrecision,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary => {
            SqlType::Text
        }
        DataType::Date32 | DataType::Date64 => SqlType::Date,
        DataType::Timestamp(_, _) => SqlType::Timestamp,
        other => bail!("Unsupported Parquet column type: {:?}", other),
    })
}

/// Build the table schema for an Arrow schema
pub fn schema_from_arrow(arrow_schema: &arrow::datatypes::Schema) -> Result<Schema> {
    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| {
            sql_type_for(field.data_type())
                .with_context(|| format!("Column '{}'", field.name()))
                .map(|sql_type| Column::new(field.name().clone(), sql_type))
        })
        .collect::<Result<Vec<_>>>()?;

    if columns.is_empty() {
        bail!("Parquet source has no columns");
    }

    Ok(Schema { columns })
}

/// Convert an Arrow RecordBatch to rows of values
pub fn record_batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let num_rows = batch.num_rows();
    let num_columns = batch.num_columns();

    if num_rows == 0 {
        return Ok(Vec::new());
    }

    let mut columns: Vec<std::vec::IntoIter<Value>> = Vec::with_capacity(num_columns);
    for col_idx in 0..num_columns {
        let array = batch.column(col_idx);
        let values = array_to_values(array).with_context(|| {
            format!(
                "Failed to convert column {} ({:?})",
                col_idx,
                array.data_type()
            )
        })?;
        columns.push(values.into_iter());
    }

    // Transpose to rows
    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let row = columns
            .iter_mut()
            .map(|col| col.next().unwrap_or(Value::Null))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Convert an Arrow array to a vector of values
fn array_to_values(array: &dyn Array) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(array.len());

    match array.data_type() {
        DataType::Boolean => {
            let arr = as_boolean_array(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Boolean(arr.value(i))
                });
            }
        }
        DataType::Int8 => convert_int::<Int8Type>(array, &mut values),
        DataType::Int16 => convert_int::<Int16Type>(array, &mut values),
        DataType::Int32 => convert_int::<Int32Type>(array, &mut values),
        DataType::Int64 => convert_int::<Int64Type>(array, &mut values),
        DataType::UInt8 => convert_int::<UInt8Type>(array, &mut values),
        DataType::UInt16 => convert_int::<UInt16Type>(array, &mut values),
        DataType::UInt32 => convert_int::<UInt32Type>(array, &mut values),
        DataType::UInt64 => {
            let arr = as_primitive_array::<UInt64Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let v = i64::try_from(arr.value(i))
                        .with_context(|| format!("UInt64 value {} exceeds BIGINT", arr.value(i)))?;
                    Value::Int(v)
                });
            }
        }
        DataType::Float16 => {
            let arr = as_primitive_array::<Float16Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(arr.value(i).to_f64())
                });
            }
        }
        DataType::Float32 => convert_float::<Float32Type>(array, &mut values),
        DataType::Float64 => convert_float::<Float64Type>(array, &mut values),
        DataType::Utf8 => {
            let arr = as_string_array(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Text(arr.value(i).to_string())
                });
            }
        }
        DataType::LargeUtf8 => {
            let arr = as_largestring_array(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Text(arr.value(i).to_string())
                });
            }
        }
        DataType::Binary => {
            let arr = as_generic_binary_array::<i32>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Text(hex::encode(arr.value(i)))
                });
            }
        }
        DataType::LargeBinary => {
            let arr = as_generic_binary_array::<i64>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    Value::Text(hex::encode(arr.value(i)))
                });
            }
        }
        DataType::Date32 => {
            let arr = as_primitive_array::<Date32Type>(array);
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("Invalid epoch")?;
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let days = arr.value(i);
                    let date = epoch
                        .checked_add_signed(chrono::Duration::days(days as i64))
                        .context("Invalid date")?;
                    Value::Date(date)
                });
            }
        }
        DataType::Date64 => {
            let arr = as_primitive_array::<Date64Type>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let millis = arr.value(i);
                    let datetime =
                        chrono::DateTime::from_timestamp_millis(millis).context("Invalid date")?;
                    Value::Date(datetime.date_naive())
                });
            }
        }
        DataType::Timestamp(unit, _) => {
            convert_timestamp(array, unit, &mut values)?;
        }
        DataType::Decimal128(_, scale) => {
            let arr = as_primitive_array::<Decimal128Type>(array);
            let scale = u32::try_from(*scale)
                .ok()
                .filter(|s| *s <= DECIMAL128_MAX_SCALE as u32)
                .with_context(|| format!("Unsupported Decimal128 scale {}", scale))?;
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let text = format_decimal128(arr.value(i), scale);
                    Value::Float(text.parse().context("Invalid decimal")?)
                });
            }
        }
        DataType::Decimal256(_, scale) => {
            let arr = as_primitive_array::<Decimal256Type>(array);
            let divisor = 10f64.powi(*scale as i32);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let unscaled: f64 = arr.value(i).to_string().parse().context("Invalid decimal")?;
                    Value::Float(unscaled / divisor)
                });
            }
        }
        _ => {
            return Err(anyhow!(
                "Unsupported array type for conversion: {:?}",
                array.data_type()
            ));
        }
    }

    Ok(values)
}

/// Helper to convert integer arrays that fit in i64
fn convert_int<T: ArrowPrimitiveType>(array: &dyn Array, values: &mut Vec<Value>)
where
    T::Native: Into<i64>,
{
    let arr = as_primitive_array::<T>(array);
    for i in 0..arr.len() {
        values.push(if arr.is_null(i) {
            Value::Null
        } else {
            Value::Int(arr.value(i).into())
        });
    }
}

/// Helper to convert float arrays
fn convert_float<T: ArrowPrimitiveType>(array: &dyn Array, values: &mut Vec<Value>)
where
    T::Native: Into<f64>,
{
    let arr = as_primitive_array::<T>(array);
    for i in 0..arr.len() {
        values.push(if arr.is_null(i) {
            Value::Null
        } else {
            Value::Float(arr.value(i).into())
        });
    }
}

/// Convert timestamp arrays to naive UTC timestamps
fn convert_timestamp(array: &dyn Array, unit: &TimeUnit, values: &mut Vec<Value>) -> Result<()> {
    let to_value = |ts: Option<chrono::DateTime<chrono::Utc>>| -> Result<Value> {
        ts.map(|dt| Value::Timestamp(dt.naive_utc()))
            .context("Invalid timestamp")
    };

    match unit {
        TimeUnit::Second => {
            let arr = as_primitive_array::<TimestampSecondType>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    to_value(chrono::DateTime::from_timestamp(arr.value(i), 0))?
                });
            }
        }
        TimeUnit::Millisecond => {
            let arr = as_primitive_array::<TimestampMillisecondType>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    to_value(chrono::DateTime::from_timestamp_millis(arr.value(i)))?
                });
            }
        }
        TimeUnit::Microsecond => {
            let arr = as_primitive_array::<TimestampMicrosecondType>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    to_value(chrono::DateTime::from_timestamp_micros(arr.value(i)))?
                });
            }
        }
        TimeUnit::Nanosecond => {
            let arr = as_primitive_array::<TimestampNanosecondType>(array);
            for i in 0..arr.len() {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    let datetime: NaiveDateTime =
                        chrono::DateTime::from_timestamp_nanos(arr.value(i)).naive_utc();
                    Value::Timestamp(datetime)
                });
            }
        }
    }
    Ok(())
}

/// Format a Decimal128 value with the given scale
fn format_decimal128(value: i128, scale: u32) -> String {
    if scale == 0 {
        return value.to_string();
    }

    let divisor = 10_i128.pow(scale);
    let int_part = value / divisor;
    let frac_part = (value % divisor).abs();
    let sign = if value < 0 && int_part == 0 { "-" } else { "" };

    format!(
        "{}{}.{:0width$}",
        sign,
        int_part,
        frac_part,
        width = scale as usize
    )
}
