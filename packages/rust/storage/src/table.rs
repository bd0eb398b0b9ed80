//! SQL text and value binding for loading a [`Dataset`] into the engine.

use csvagent_dataset::Dataset;
use csvagent_shared::ColumnType;
use libsql::Value;

/// Quote an identifier with double quotes, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE` statement with declared column affinities.
pub(crate) fn create_table_sql(table: &str, dataset: &Dataset) -> String {
    let columns = dataset
        .schema()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_ident(table))
}

/// Positional `INSERT` statement for every column.
pub(crate) fn insert_sql(table: &str, dataset: &Dataset) -> String {
    let width = dataset.schema().len();
    let names = dataset
        .schema()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=width)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_ident(table)
    )
}

/// Convert a raw cell into a typed engine value.
///
/// Cells that do not parse as the column type fall back to text rather
/// than being dropped.
pub(crate) fn to_value(cell: Option<&str>, column_type: ColumnType) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let trimmed = raw.trim();
    match column_type {
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Real => trimmed
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Value::Integer(1)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Value::Integer(0)
            } else {
                Value::Text(raw.to_string())
            }
        }
        ColumnType::Text => Value::Text(raw.to_string()),
    }
}
