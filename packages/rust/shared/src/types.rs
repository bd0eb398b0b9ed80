//! Core domain types shared across the csvagent pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Directory name used for this run's extracted files.
    pub fn dir_name(&self) -> String {
        format!("run-{}", self.0)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Column types and schema
// ---------------------------------------------------------------------------

/// Inferred type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ColumnType {
    /// Declared SQL type used when creating the engine table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// dtype-style name shown to the model in the schema listing.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Integer => "int64",
            Self::Real => "float64",
            Self::Boolean => "bool",
            Self::Text => "object",
        }
    }

    /// The narrowest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Integer, Self::Real) | (Self::Real, Self::Integer) => Self::Real,
            _ => Self::Text,
        }
    }
}

/// Name and type of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

/// Render a schema as one `name  type` line per column, names padded to a common width.
pub fn render_schema(columns: &[ColumnSchema]) -> String {
    let width = columns
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0);

    columns
        .iter()
        .map(|c| format!("{:<width$}    {}", c.name, c.column_type.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
        assert!(id.dir_name().starts_with("run-"));
    }

    #[test]
    fn widen_types() {
        assert_eq!(ColumnType::Integer.widen(ColumnType::Integer), ColumnType::Integer);
        assert_eq!(ColumnType::Integer.widen(ColumnType::Real), ColumnType::Real);
        assert_eq!(ColumnType::Boolean.widen(ColumnType::Integer), ColumnType::Text);
        assert_eq!(ColumnType::Text.widen(ColumnType::Real), ColumnType::Text);
    }

    #[test]
    fn schema_rendering_aligns_names() {
        let schema = vec![
            ColumnSchema {
                name: "CHAVE DE ACESSO".into(),
                column_type: ColumnType::Text,
            },
            ColumnSchema {
                name: "VALOR".into(),
                column_type: ColumnType::Real,
            },
        ];
        let text = render_schema(&schema);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "CHAVE DE ACESSO    object");
        assert_eq!(lines[1], "VALOR              float64");
    }

    #[test]
    fn empty_schema_renders_empty() {
        assert_eq!(render_schema(&[]), "");
    }
}
