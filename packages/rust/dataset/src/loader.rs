//! CSV file loading.
//!
//! Fiscal exports arrive in more than one shape: UTF-8 or Latin-1, comma or
//! semicolon separated, sometimes with a BOM. The loader normalizes all of
//! them into a [`Dataset`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use csvagent_shared::{CsvAgentError, Result};
use regex::Regex;
use tracing::{debug, instrument};

use crate::{Cell, Dataset};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `1.234,56` or `10,5`: optional thousands dots, comma before the fraction.
static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(\d{1,3}(\.\d{3})+|\d+),\d+$").expect("valid decimal pattern")
});

static PLAIN_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+$").expect("valid integer pattern"));

/// Load one CSV file. The header row names the columns; empty cells are null.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let bytes = std::fs::read(path).map_err(|e| CsvAgentError::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let text = decode(&bytes);
    if text.trim().is_empty() {
        return Err(CsvAgentError::dataset(format!("file '{file_name}' is empty")));
    }

    let delimiter = sniff_delimiter(&text);
    debug!(delimiter = %(delimiter as char), "reading CSV");

    let dataset = parse(&text, delimiter)
        .map_err(|e| CsvAgentError::dataset(format!("failed to read '{file_name}': {e}")))?;

    let (rows, columns) = dataset.shape();
    debug!(rows, columns, "CSV loaded");
    Ok(dataset.with_source(file_name))
}

/// UTF-8 when valid, Latin-1 otherwise. A leading BOM is dropped.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// `;` when the header line has more semicolons than commas, else `,`.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let commas = header.matches(',').count();
    let semicolons = header.matches(';').count();
    if semicolons > commas { b';' } else { b',' }
}

fn parse(text: &str, delimiter: u8) -> std::result::Result<Dataset, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let names = dedupe_headers(headers.iter());

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() > names.len() {
            return Err(format!(
                "row {} has {} fields, header has {}",
                line + 2,
                record.len(),
                names.len()
            ));
        }
        // blank lines
        if record.iter().all(|f| f.is_empty()) && record.len() <= 1 {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    if delimiter == b';' {
        normalize_decimal_commas(&mut rows, names.len());
    }

    Ok(Dataset::from_rows(names, rows))
}

/// Rewrite decimal-comma columns (`1.234,56`) to dotted decimals (`1234.56`).
///
/// A column is rewritten only when every non-null cell is an integer or a
/// decimal-comma number and at least one cell has the comma.
fn normalize_decimal_commas(rows: &mut [Vec<Cell>], width: usize) {
    for col in 0..width {
        let cells: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get(col)?.as_deref())
            .collect();
        let all_numeric = cells
            .iter()
            .all(|v| DECIMAL_COMMA.is_match(v) || PLAIN_INTEGER.is_match(v));
        if !all_numeric || !cells.iter().any(|v| DECIMAL_COMMA.is_match(v)) {
            continue;
        }

        debug!(column = col, "normalizing decimal commas");
        for cell in rows.iter_mut().filter_map(|row| row.get_mut(col)?.as_mut()) {
            if DECIMAL_COMMA.is_match(cell) {
                *cell = cell.replace('.', "").replace(',', ".");
            }
        }
    }
}

/// Trim header names, name blank ones `Unnamed: <i>`, and suffix repeats with `.1`, `.2`, ...
///
/// Repeats are detected case-insensitively and a suffixed name never reuses
/// one already present in the header.
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::new();

    for (i, name) in raw.enumerate() {
        let base = match name.trim() {
            "" => format!("Unnamed: {i}"),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut ordinal = 1;
        while !taken.insert(candidate.to_lowercase()) {
            candidate = format!("{base}.{ordinal}");
            ordinal += 1;
        }
        names.push(candidate);
    }

    names
}
