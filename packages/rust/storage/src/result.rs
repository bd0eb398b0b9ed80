//! Query results and their plain-text rendering.

use serde::Serialize;

/// A single value returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// Binary data; only its length is kept.
    Blob(usize),
}

impl CellValue {
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }

    fn render(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => format_real(*v),
            Self::Text(s) => s.clone(),
            Self::Blob(len) => format!("<{len} bytes>"),
        }
    }
}

/// Fixed six decimals with trailing zeros trimmed.
fn format_real(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Column names plus rows of values, as returned by one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as an aligned text table.
    ///
    /// Numbers are right-aligned and everything else left-aligned. Past
    /// `max_rows` the remaining rows are replaced by a notice.
    pub fn to_text(&self, max_rows: usize) -> String {
        if self.rows.is_empty() {
            return format!("Empty result\nColumns: [{}]", self.columns.join(", "));
        }

        let shown = &self.rows[..self.rows.len().min(max_rows)];
        let rendered: Vec<Vec<String>> = shown
            .iter()
            .map(|row| row.iter().map(CellValue::render).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let mut lines = Vec::with_capacity(shown.len() + 2);
        lines.push(
            self.columns
                .iter()
                .enumerate()
                .map(|(i, name)| pad(name, widths[i], false))
                .collect::<Vec<_>>()
                .join("  "),
        );

        for (row, cells) in shown.iter().zip(&rendered) {
            lines.push(
                cells
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let width = widths.get(i).copied().unwrap_or(0);
                        pad(cell, width, row[i].is_numeric())
                    })
                    .collect::<Vec<_>>()
                    .join("  "),
            );
        }

        let hidden = self.rows.len() - shown.len();
        if hidden > 0 {
            lines.push(format!(
                "... {hidden} more rows not shown ({} rows x {} columns in total)",
                self.rows.len(),
                self.columns.len()
            ));
        }

        lines
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = width.saturating_sub(text.chars().count());
    if right {
        format!("{}{text}", " ".repeat(fill))
    } else {
        format!("{text}{}", " ".repeat(fill))
    }
}
