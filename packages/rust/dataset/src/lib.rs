//! In-memory tabular dataset: CSV loading, type inference, and key merge.
//!
//! A [`Dataset`] keeps every cell as its original text (empty cells are
//! null) next to a per-column [`ColumnType`] inferred from that text. The
//! query engine uses the inferred types to bind typed values.

mod loader;
mod merge;

use std::path::PathBuf;

use csvagent_shared::{ColumnSchema, ColumnType, CsvAgentError, Result, render_schema};
use tracing::{info, instrument};

pub use loader::load_csv;
pub use merge::merge_datasets;

/// A nullable cell holding the raw CSV text.
pub type Cell = Option<String>;

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Columns plus rows of nullable text cells.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// File name (or other label) the data came from, for error messages.
    pub source: Option<String>,
    columns: Vec<ColumnSchema>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Build a dataset and infer each column's type from its cells.
    ///
    /// Rows shorter than the header are padded with nulls.
    pub fn from_rows(names: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        for row in &mut rows {
            row.resize(names.len(), None);
        }

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ColumnSchema {
                name,
                column_type: infer_type(rows.iter().map(|r| r[i].as_deref())),
            })
            .collect();

        Self {
            source: None,
            columns,
            rows,
        }
    }

    /// Attach a source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Column names and inferred types.
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Schema listing shown to the model.
    pub fn schema_text(&self) -> String {
        render_schema(&self.columns)
    }

    /// Label used in error messages.
    pub(crate) fn label(&self, position: usize) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("dataset #{}", position + 1))
    }
}

// ---------------------------------------------------------------------------
// Type inference
// ---------------------------------------------------------------------------

/// How a single non-null cell reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Integer,
    Real,
    Boolean,
    Text,
}

fn classify(raw: &str) -> CellKind {
    let value = raw.trim();
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);

    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        // Codes such as CNPJ, NCM or CEP keep their leading zeros, and access
        // keys overflow i64; both stay text.
        if digits.len() > 1 && digits.starts_with('0') {
            return CellKind::Text;
        }
        return match value.parse::<i64>() {
            Ok(_) => CellKind::Integer,
            Err(_) => CellKind::Text,
        };
    }

    if value.bytes().any(|b| b.is_ascii_digit()) && value.parse::<f64>().is_ok() {
        return CellKind::Real;
    }

    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return CellKind::Boolean;
    }

    CellKind::Text
}

/// Infer a column type from its cells. Nulls are ignored; an all-null column is text.
pub fn infer_type<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut seen: Option<ColumnType> = None;

    for cell in cells.flatten() {
        let kind = match classify(cell) {
            CellKind::Integer => ColumnType::Integer,
            CellKind::Real => ColumnType::Real,
            CellKind::Boolean => ColumnType::Boolean,
            CellKind::Text => return ColumnType::Text,
        };
        let next = match seen {
            Some(current) => current.widen(kind),
            None => kind,
        };
        if next == ColumnType::Text {
            return ColumnType::Text;
        }
        seen = Some(next);
    }

    seen.unwrap_or(ColumnType::Text)
}

// ---------------------------------------------------------------------------
// Data loader step
// ---------------------------------------------------------------------------

/// Data loader step: load every selected CSV and merge them on `key`.
#[instrument(skip_all, fields(files = paths.len(), key = %key))]
pub fn load_and_merge(paths: &[PathBuf], key: &str) -> Result<Dataset> {
    if paths.is_empty() {
        return Err(CsvAgentError::dataset("no CSV files selected to load"));
    }

    let datasets = paths
        .iter()
        .map(|path| load_csv(path))
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_datasets(datasets, key)?;

    if merged.is_empty() {
        return Err(CsvAgentError::dataset(format!(
            "merge produced an empty dataset; check key '{key}' and the file contents"
        )));
    }

    let (rows, columns) = merged.shape();
    info!(rows, columns, "merged dataset ready");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: &[&str]) -> ColumnType {
        infer_type(values.iter().map(|v| if v.is_empty() { None } else { Some(*v) }))
    }

    #[test]
    fn infers_integers_and_reals() {
        assert_eq!(infer(&["1", "2", "-3"]), ColumnType::Integer);
        assert_eq!(infer(&["1", "2.5", ""]), ColumnType::Real);
        assert_eq!(infer(&["1e3", "0.25"]), ColumnType::Real);
    }

    #[test]
    fn infers_booleans_and_text() {
        assert_eq!(infer(&["true", "FALSE"]), ColumnType::Boolean);
        assert_eq!(infer(&["true", "1"]), ColumnType::Text);
        assert_eq!(infer(&["abc", "1"]), ColumnType::Text);
        assert_eq!(infer(&["", ""]), ColumnType::Text);
    }

    #[test]
    fn codes_stay_text() {
        // leading zeros
        assert_eq!(infer(&["00123", "456"]), ColumnType::Text);
        // 44-digit access key overflows i64
        assert_eq!(
            infer(&["41240106267630001509550010035101291224888487"]),
            ColumnType::Text
        );
        // "NaN" and "inf" parse as f64 but are not numbers here
        assert_eq!(infer(&["NaN", "inf"]), ColumnType::Text);
        assert_eq!(infer(&["0"]), ColumnType::Integer);
    }

    #[test]
    fn from_rows_pads_short_rows() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Some("1".into())], vec![Some("2".into()), Some("x".into())]],
        );
        assert_eq!(ds.shape(), (2, 2));
        assert_eq!(ds.rows()[0][1], None);
        assert_eq!(ds.schema()[0].column_type, ColumnType::Integer);
        assert_eq!(ds.schema()[1].column_type, ColumnType::Text);
        assert_eq!(ds.column_index("b"), Some(1));
        assert_eq!(ds.column_index("c"), None);
    }

    #[test]
    fn load_and_merge_fixtures() {
        let paths = vec![
            PathBuf::from("../../../fixtures/csv/202401_NFs_Cabecalho.csv"),
            PathBuf::from("../../../fixtures/csv/202401_NFs_Itens.csv"),
        ];
        let merged = load_and_merge(&paths, "CHAVE DE ACESSO").expect("merge fixtures");

        // 2 + 1 matched item rows, 1 header without items, 1 orphan item
        assert_eq!(merged.shape(), (5, 14));
        assert_eq!(
            merged.schema()[merged.column_index("VALOR NOTA FISCAL").unwrap()].column_type,
            ColumnType::Real
        );
        assert!(merged.schema_text().contains("CHAVE DE ACESSO"));
    }

    #[test]
    fn load_and_merge_requires_selection() {
        let err = load_and_merge(&[], "CHAVE DE ACESSO").unwrap_err();
        assert_eq!(err.detail(), "no CSV files selected to load");
    }

    #[test]
    fn load_and_merge_missing_key_names_file() {
        let paths = vec![
            PathBuf::from("../../../fixtures/csv/202401_NFs_Cabecalho.csv"),
            PathBuf::from("../../../fixtures/csv/202401_NFs_Itens.csv"),
        ];
        let err = load_and_merge(&paths, "ID").unwrap_err();
        assert!(err.detail().contains("merge key 'ID' not found"));
        assert!(err.detail().contains("202401_NFs_Cabecalho.csv"));
    }
}
