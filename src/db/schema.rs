use arrow::datatypes::DataType as ArrowType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A row as returned to callers: column name to JSON value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    BigInt,
    Double,
    String,
    Boolean,
    Date,
    Timestamp,
    Unknown(String),
}

impl DataType {
    /// Maps a declared catalog type (as reported by `information_schema`) onto a coarse type.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "INT4" | "INT2" | "UTINYINT"
            | "USMALLINT" | "UINTEGER" => DataType::Integer,
            "BIGINT" | "INT8" | "HUGEINT" | "UBIGINT" | "UHUGEINT" => DataType::BigInt,
            "DOUBLE" | "FLOAT" | "REAL" | "FLOAT4" | "FLOAT8" | "DECIMAL" | "NUMERIC" => {
                DataType::Double
            }
            "VARCHAR" | "TEXT" | "STRING" | "CHAR" | "BPCHAR" | "UUID" => DataType::String,
            "BOOLEAN" | "BOOL" => DataType::Boolean,
            "DATE" => DataType::Date,
            b if b.starts_with("TIMESTAMP") || b == "DATETIME" => DataType::Timestamp,
            _ => DataType::Unknown(declared.trim().to_string()),
        }
    }

    /// Maps the type of a result column onto a coarse type.
    pub fn from_arrow(data_type: &ArrowType) -> Self {
        match data_type {
            ArrowType::Int8
            | ArrowType::Int16
            | ArrowType::Int32
            | ArrowType::UInt8
            | ArrowType::UInt16
            | ArrowType::UInt32 => DataType::Integer,
            ArrowType::Int64 | ArrowType::UInt64 => DataType::BigInt,
            ArrowType::Float16
            | ArrowType::Float32
            | ArrowType::Float64
            | ArrowType::Decimal128(_, _)
            | ArrowType::Decimal256(_, _) => DataType::Double,
            ArrowType::Utf8 | ArrowType::LargeUtf8 | ArrowType::Utf8View => DataType::String,
            ArrowType::Boolean => DataType::Boolean,
            ArrowType::Date32 | ArrowType::Date64 => DataType::Date,
            ArrowType::Timestamp(_, _) => DataType::Timestamp,
            ArrowType::Dictionary(_, value) => DataType::from_arrow(value),
            other => DataType::Unknown(other.to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::BigInt | DataType::Double)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, DataType::String | DataType::Boolean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Type exactly as the catalog reports it, e.g. `DECIMAL(10,2)`.
    pub declared_type: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, declared_type: &str, nullable: bool) -> Self {
        let declared_type = declared_type.trim().to_uppercase();
        Self {
            name: name.into(),
            data_type: DataType::from_declared(&declared_type),
            declared_type,
            nullable,
        }
    }

    pub fn to_sql_definition(&self) -> String {
        let nullable_str = if self.nullable { "" } else { " NOT NULL" };
        format!("\"{}\" {}{}", self.name, self.declared_type, nullable_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Best effort; capped for very large tables.
    pub row_count: u64,
    pub row_count_capped: bool,
    /// Context only, never used to answer aggregate questions.
    pub sample_rows: Vec<Row>,
}

impl TableInfo {
    pub fn to_create_table_sql(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition())
            .collect();

        format!(
            "CREATE TABLE \"{}\" (\n    {}\n);",
            self.name,
            columns_sql.join(",\n    ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableInfo>,
    pub fingerprint: String,
}

impl SchemaDescription {
    /// Builds a description and derives its fingerprint from table and column definitions.
    pub fn new(tables: Vec<TableInfo>) -> Self {
        let fingerprint = fingerprint(&tables);
        Self { tables, fingerprint }
    }
}

/// Content hash over table names and column definitions, using the declared
/// column types. Row counts and sample rows are not hashed.
pub fn fingerprint(tables: &[TableInfo]) -> String {
    let mut ordered: Vec<&TableInfo> = tables.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for table in ordered {
        hasher.update(b"table\0");
        hasher.update(table.name.as_bytes());
        for column in &table.columns {
            hasher.update(b"\0column\0");
            hasher.update(column.name.as_bytes());
            hasher.update(b"\0");
            hasher.update(column.declared_type.as_bytes());
            hasher.update(if column.nullable { b"\0null" } else { b"\0nonn" });
        }
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
