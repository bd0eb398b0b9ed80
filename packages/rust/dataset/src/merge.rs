//! Full outer join of datasets on a shared key column.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use csvagent_shared::{ColumnType, CsvAgentError, Result};
use tracing::{debug, info, instrument};

use crate::{Cell, Dataset};

/// Merge all datasets into one by left-folding full outer joins on `key`.
///
/// Every dataset must carry the key column. Zero datasets produce an empty
/// dataset and a single dataset is returned unchanged.
#[instrument(skip_all, fields(datasets = datasets.len(), key = %key))]
pub fn merge_datasets(datasets: Vec<Dataset>, key: &str) -> Result<Dataset> {
    for (i, ds) in datasets.iter().enumerate() {
        if ds.column_index(key).is_none() {
            return Err(CsvAgentError::dataset(format!(
                "merge key '{key}' not found in file '{}'",
                ds.label(i)
            )));
        }
    }

    let mut iter = datasets.into_iter();
    let Some(mut merged) = iter.next() else {
        return Ok(Dataset::default());
    };

    for right in iter {
        debug!(
            left_rows = merged.shape().0,
            right_rows = right.shape().0,
            right = right.source.as_deref().unwrap_or("-"),
            "joining"
        );
        merged = outer_join(&merged, &right, key);
    }

    let (rows, columns) = merged.shape();
    info!(rows, columns, "datasets merged on '{key}'");
    Ok(merged)
}

/// One full outer join. Both sides are known to contain `key`.
fn outer_join(left: &Dataset, right: &Dataset, key: &str) -> Dataset {
    let lk = left.column_index(key).unwrap_or_default();
    let rk = right.column_index(key).unwrap_or_default();

    let names = joined_names(left, right, lk, rk);
    let right_cols: Vec<usize> = (0..right.columns.len()).filter(|&i| i != rk).collect();
    let width = names.len();

    // Group row positions per key, remembering first-seen order.
    let mut left_groups: HashMap<Option<&str>, Vec<usize>> = HashMap::new();
    let mut right_groups: HashMap<Option<&str>, Vec<usize>> = HashMap::new();
    let mut keys: Vec<Option<&str>> = Vec::new();
    let mut seen: HashSet<Option<&str>> = HashSet::new();

    for (i, row) in left.rows.iter().enumerate() {
        let k = row[lk].as_deref();
        left_groups.entry(k).or_default().push(i);
        if seen.insert(k) {
            keys.push(k);
        }
    }
    for (i, row) in right.rows.iter().enumerate() {
        let k = row[rk].as_deref();
        right_groups.entry(k).or_default().push(i);
        if seen.insert(k) {
            keys.push(k);
        }
    }

    let key_type = left.columns[lk]
        .column_type
        .widen(right.columns[rk].column_type);
    keys.sort_by(|a, b| compare_keys(*a, *b, key_type));

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let empty: Vec<usize> = Vec::new();

    for k in keys {
        let lrows = left_groups.get(&k).unwrap_or(&empty);
        let rrows = right_groups.get(&k).unwrap_or(&empty);

        match (lrows.is_empty(), rrows.is_empty()) {
            (false, false) => {
                for &li in lrows {
                    for &ri in rrows {
                        let mut row = left.rows[li].clone();
                        row.extend(right_cols.iter().map(|&c| right.rows[ri][c].clone()));
                        rows.push(row);
                    }
                }
            }
            (false, true) => {
                for &li in lrows {
                    let mut row = left.rows[li].clone();
                    row.resize(width, None);
                    rows.push(row);
                }
            }
            (true, false) => {
                for &ri in rrows {
                    let mut row: Vec<Cell> = vec![None; left.columns.len()];
                    row[lk] = right.rows[ri][rk].clone();
                    row.extend(right_cols.iter().map(|&c| right.rows[ri][c].clone()));
                    rows.push(row);
                }
            }
            (true, true) => {}
        }
    }

    Dataset::from_rows(names, rows)
}

/// Output column names: left columns, then right columns minus the key.
///
/// Names present on both sides (other than the key) get `_x` / `_y`
/// suffixes; a suffixed name that still collides gets a numeric ordinal.
/// Names are compared case-insensitively, as the SQL engine does.
fn joined_names(left: &Dataset, right: &Dataset, lk: usize, rk: usize) -> Vec<String> {
    let folded = |ds: &Dataset, key: usize| -> HashSet<String> {
        ds.column_names()
            .enumerate()
            .filter(|&(i, _)| i != key)
            .map(|(_, n)| n.to_lowercase())
            .collect()
    };
    let left_names = folded(left, lk);
    let right_names = folded(right, rk);

    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::new();

    let mut push = |name: String, taken: &mut HashSet<String>| {
        let mut candidate = name.clone();
        let mut ordinal = 2;
        while !taken.insert(candidate.to_lowercase()) {
            candidate = format!("{name}_{ordinal}");
            ordinal += 1;
        }
        names.push(candidate);
    };

    for (i, name) in left.column_names().enumerate() {
        if i != lk && right_names.contains(&name.to_lowercase()) {
            push(format!("{name}_x"), &mut taken);
        } else {
            push(name.to_string(), &mut taken);
        }
    }
    for (i, name) in right.column_names().enumerate() {
        if i == rk {
            continue;
        }
        if left_names.contains(&name.to_lowercase()) {
            push(format!("{name}_y"), &mut taken);
        } else {
            push(name.to_string(), &mut taken);
        }
    }

    names
}

/// Order keys numerically when the key column is numeric, else as text. Nulls sort last.
fn compare_keys(a: Option<&str>, b: Option<&str>, key_type: ColumnType) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match key_type {
            ColumnType::Integer | ColumnType::Real => {
                match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                    (Ok(x), Ok(y)) => x.total_cmp(&y),
                    _ => a.cmp(b),
                }
            }
            _ => a.cmp(b),
        },
    }
}
