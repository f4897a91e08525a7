use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::db::schema::{Schema, SqlType, parse_timestamp};

/// A single scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl Value {
    /// Parse a raw delimited field as the given column type
    ///
    /// NA markers become `Null`; text columns keep the field verbatim.
    pub fn parse(raw: &str, sql_type: SqlType) -> Result<Value> {
        if crate::db::SchemaInferrer::is_na(raw) {
            return Ok(Value::Null);
        }
        Value::Text(raw.to_string()).coerce_to(sql_type)
    }

    /// Convert this value so it can be stored in a column of `sql_type`
    pub fn coerce_to(self, sql_type: SqlType) -> Result<Value> {
        let coerced = match (self, sql_type) {
            (Value::Null, _) => Some(Value::Null),

            (v @ Value::Boolean(_), SqlType::Boolean)
            | (v @ Value::Int(_), SqlType::BigInt)
            | (v @ Value::Float(_), SqlType::DoublePrecision)
            | (v @ Value::Text(_), SqlType::Text)
            | (v @ Value::Timestamp(_), SqlType::Timestamp)
            | (v @ Value::Date(_), SqlType::Date) => Some(v),

            (Value::Boolean(b), SqlType::BigInt) => Some(Value::Int(b as i64)),
            (Value::Boolean(b), SqlType::DoublePrecision) => Some(Value::Float(b as i64 as f64)),
            (Value::Int(i), SqlType::DoublePrecision) => Some(Value::Float(i as f64)),
            // i64::MAX as f64 rounds up to 2^63, which is already out of range
            (Value::Float(f), SqlType::BigInt)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Some(Value::Int(f as i64))
            }
            (Value::Date(d), SqlType::Timestamp) => d.and_hms_opt(0, 0, 0).map(Value::Timestamp),

            (v, SqlType::Text) => Some(Value::Text(v.to_string())),

            (Value::Text(s), target) => {
                let trimmed = s.trim();
                let parsed = match target {
                    SqlType::Boolean if trimmed.eq_ignore_ascii_case("true") => {
                        Some(Value::Boolean(true))
                    }
                    SqlType::Boolean if trimmed.eq_ignore_ascii_case("false") => {
                        Some(Value::Boolean(false))
                    }
                    SqlType::BigInt => trimmed.parse().ok().map(Value::Int),
                    SqlType::DoublePrecision => trimmed.parse().ok().map(Value::Float),
                    SqlType::Timestamp => parse_timestamp(trimmed).map(Value::Timestamp),
                    SqlType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                        .ok()
                        .map(Value::Date),
                    _ => None,
                };
                if parsed.is_none() {
                    return Err(anyhow!(
                        "Type mismatch: Cannot convert value to {}.\n\
                         - Got: '{}'",
                        target.to_postgres(),
                        s
                    ));
                }
                parsed
            }

            (v, target) => {
                return Err(anyhow!(
                    "Type mismatch: Cannot convert {:?} to {}",
                    v,
                    target.to_postgres()
                ));
            }
        };

        coerced.ok_or_else(|| anyhow!("Value out of range for {}", sql_type.to_postgres()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One row of values in schema column order
pub type Row = Vec<Value>;

/// A bounded chunk of rows processed as one unit of work
#[derive(Debug, Clone)]
pub struct Batch {
    pub schema: Schema,
    /// Ordinal of the first row of this batch within the source
    pub offset: u64,
    pub rows: Vec<Row>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert the named columns to timestamp values in place
    ///
    /// Fails when a column is absent or holds a value that is not a timestamp.
    pub fn coerce_timestamps(&mut self, columns: &[String]) -> Result<()> {
        for name in columns {
            let col_idx = self
                .schema
                .position(name)
                .with_context(|| format!("Column '{}' not found in source", name))?;

            for (row_idx, row) in self.rows.iter_mut().enumerate() {
                let value = std::mem::replace(&mut row[col_idx], Value::Null);
                row[col_idx] = value.coerce_to(SqlType::Timestamp).with_context(|| {
                    format!(
                        "Invalid timestamp in column '{}' at row {}",
                        name,
                        self.offset + row_idx as u64 + 1
                    )
                })?;
            }

            self.schema.columns[col_idx].sql_type = SqlType::Timestamp;
        }

        Ok(())
    }

    /// Coerce every row to the column types of `target`
    ///
    /// The column names and order must already match.
    pub fn conform_to(&self, target: &Schema) -> Result<Vec<Row>> {
        if !self.schema.same_columns(target) {
            bail!(
                "Schema mismatch: batch columns [{}] do not match table columns [{}]",
                self.schema.column_names().collect::<Vec<_>>().join(", "),
                target.column_names().collect::<Vec<_>>().join(", ")
            );
        }

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                row.iter()
                    .zip(&target.columns)
                    .map(|(value, col)| {
                        value.clone().coerce_to(col.sql_type).with_context(|| {
                            format!(
                                "Schema mismatch in column '{}' at row {}",
                                col.name,
                                self.offset + row_idx as u64 + 1
                            )
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

/// Forward-only source of batches
///
/// `Ok(None)` marks the end of the sequence; it is not an error.
pub trait BatchReader {
    fn next_batch(&mut self) -> Result<Option<Batch>>;
}

/// Configuration for delimited file reading
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl DelimitedConfig {
    pub fn csv() -> Self {
        Self::default()
    }
}
