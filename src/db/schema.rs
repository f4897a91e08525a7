use chrono::{NaiveDate, NaiveDateTime};

use crate::config::NA_VALUES;

/// SQL data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    BigInt,
    DoublePrecision,
    Text,
    Timestamp,
    Date,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::BigInt => "BIGINT",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMP WITHOUT TIME ZONE",
            SqlType::Date => "DATE",
        }
    }

    /// Find the most specific common type that accommodates both types
    pub fn common_type(&self, other: &SqlType) -> SqlType {
        if self == other {
            return *self;
        }

        use SqlType::*;
        match (self, other) {
            (BigInt, DoublePrecision) | (DoublePrecision, BigInt) => DoublePrecision,
            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            _ => Text,
        }
    }
}

/// A column in a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// A table schema (ordered collection of columns)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// True when both schemas have the same column names in the same order
    pub fn same_columns(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len() && self.column_names().eq(other.column_names())
    }
}

/// Quote an identifier for use in generated SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Parse a timestamp in any of the accepted text forms
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    const FORMATS: [&str; 9] = [
        "%Y-%m-%d %H:%M:%S",    // 2021-01-01 00:30:10
        "%Y-%m-%dT%H:%M:%S",    // 2021-01-01T00:30:10 (ISO 8601)
        "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
        "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
        "%Y-%m-%d %H:%M",       // Without seconds
        "%Y-%m-%dT%H:%M",       // ISO 8601 without seconds
        "%m/%d/%Y %H:%M:%S",    // US format with time
        "%d-%m-%Y %H:%M:%S",    // European format with time
        "%d/%m/%Y %H:%M:%S",    // European format with time
    ];

    for format in &FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Schema inferrer for delimited sources and DDL generation
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// True when the field should be read as NULL
    pub fn is_na(value: &str) -> bool {
        NA_VALUES.contains(&value)
    }

    /// Infer the type of a single value
    pub(crate) fn infer_value_type(value: &str) -> Option<SqlType> {
        if Self::is_na(value) {
            return None;
        }

        let trimmed = value.trim();

        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            return Some(SqlType::Boolean);
        }

        if trimmed.parse::<i64>().is_ok() {
            return Some(SqlType::BigInt);
        }

        if trimmed.parse::<f64>().is_ok() {
            return Some(SqlType::DoublePrecision);
        }

        Some(SqlType::Text)
    }

    /// Infer a column type from all of its values; all-null columns are TEXT
    pub(crate) fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a str>) -> SqlType {
        let mut inferred: Option<SqlType> = None;

        for value in values {
            if let Some(val_type) = Self::infer_value_type(value) {
                inferred = Some(match inferred {
                    None => val_type,
                    Some(current) => current.common_type(&val_type),
                });
                if inferred == Some(SqlType::Text) {
                    break;
                }
            }
        }

        inferred.unwrap_or(SqlType::Text)
    }

    /// Infer a schema from a header and the raw records of one batch
    pub fn infer_from_records(header: &[String], records: &[csv::StringRecord]) -> Schema {
        let columns = header
            .iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let values = records.iter().filter_map(|r| r.get(col_idx));
                Column::new(name.clone(), Self::infer_column_type(values))
            })
            .collect();

        Schema { columns }
    }

    /// Generate DDL statement for creating a table
    ///
    /// Every column is nullable; `index_label` prepends a BIGINT row-ordinal column.
    pub fn generate_ddl(
        table_name: &str,
        schema: &Schema,
        index_label: Option<&str>,
        if_not_exists: bool,
    ) -> String {
        let mut ddl = if if_not_exists {
            format!("CREATE TABLE IF NOT EXISTS {} (\n", quote_ident(table_name))
        } else {
            format!("CREATE TABLE {} (\n", quote_ident(table_name))
        };

        let column_defs: Vec<String> = index_label
            .map(|label| format!("  {} BIGINT", quote_ident(label)))
            .into_iter()
            .chain(schema.columns.iter().map(|col| {
                format!("  {} {}", quote_ident(&col.name), col.sql_type.to_postgres())
            }))
            .collect();

        ddl.push_str(&column_defs.join(",\n"));
        ddl.push_str("\n)");

        ddl
    }

    /// Generate the statement that removes a table ahead of a replace
    pub fn generate_drop(table_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(table_name))
    }
}
