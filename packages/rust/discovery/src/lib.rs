//! Input preparation: archive extraction and CSV discovery.
//!
//! These are the first two pipeline steps. The file manager step unpacks the
//! uploaded ZIP (when there is one) into the run's data directory and lists
//! every CSV underneath it; the selector step decides which of those files
//! feed the merge.

mod archive;

use std::path::{Path, PathBuf};

use csvagent_shared::{CsvAgentError, Result};
use tracing::{info, instrument, warn};

pub use archive::{ExtractSummary, unzip_archive};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Where the pipeline's input comes from.
#[derive(Debug, Clone, Default)]
pub struct InputRequest {
    /// Optional ZIP archive to unpack into `data_dir` first.
    pub zip_path: Option<PathBuf>,
    /// Directory scanned for CSV files.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// File manager step: unpack the archive (if any) and list available CSVs.
///
/// A ZIP path that does not exist is skipped and the data directory is
/// scanned as it is.
#[instrument(skip_all)]
pub fn prepare_inputs(request: &InputRequest) -> Result<Vec<PathBuf>> {
    let data_dir = request
        .data_dir
        .as_deref()
        .ok_or_else(|| CsvAgentError::Discovery("data directory not specified".into()))?;

    match request.zip_path.as_deref() {
        Some(zip) if zip.exists() => {
            unzip_archive(zip, data_dir)?;
        }
        Some(zip) => {
            warn!(zip = %zip.display(), "archive not found, scanning data directory as is");
        }
        None => {}
    }

    let available = find_csv_files(data_dir)?;
    if available.is_empty() {
        return Err(CsvAgentError::Discovery(format!(
            "no CSV files found in {}",
            data_dir.display()
        )));
    }

    info!(csv_count = available.len(), files = ?available, "CSV files found");
    Ok(available)
}

/// File selector step: every discovered CSV takes part in the merge.
pub fn select_csv_files(available: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if available.is_empty() {
        return Err(CsvAgentError::Discovery(
            "no CSV files available for selection".into(),
        ));
    }
    info!(csv_count = available.len(), "CSV files selected");
    Ok(available.to_vec())
}

/// Recursively find `.csv` files (case-insensitive) under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CsvAgentError::Discovery(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| CsvAgentError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CsvAgentError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| CsvAgentError::io(&path, e))?;

        if file_type.is_dir() {
            walk(&path, found)?;
        } else if file_type.is_file() && has_csv_extension(&path) {
            found.push(path);
        }
    }
    Ok(())
}

pub(crate) fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("csvagent-{label}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn csv_extension_is_case_insensitive() {
        assert!(has_csv_extension(Path::new("a/notas.csv")));
        assert!(has_csv_extension(Path::new("ITENS.CSV")));
        assert!(!has_csv_extension(Path::new("readme.txt")));
        assert!(!has_csv_extension(Path::new("csv")));
    }

    #[test]
    fn find_csv_files_recurses_and_sorts() {
        let dir = temp_dir("find");
        std::fs::create_dir_all(dir.join("nested/deeper")).unwrap();
        std::fs::write(dir.join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.join("nested/a.CSV"), "x\n1\n").unwrap();
        std::fs::write(dir.join("nested/deeper/c.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignore me").unwrap();

        let found = find_csv_files(&dir).unwrap();
        assert_eq!(found.len(), 3);
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
        assert!(found.iter().all(|p| has_csv_extension(p)));
    }

    #[test]
    fn find_csv_files_missing_dir_errors() {
        let dir = std::env::temp_dir().join(format!("csvagent-missing-{}", Uuid::now_v7()));
        let err = find_csv_files(&dir).unwrap_err();
        assert!(matches!(err, CsvAgentError::Discovery(_)));
    }

    #[test]
    fn unzip_extracts_all_entries() {
        let work = temp_dir("unzip");
        let zip_path = work.join("input.zip");
        write_zip(
            &zip_path,
            &[
                ("202401_NFs_Cabecalho.csv", "CHAVE DE ACESSO,VALOR\n1,10.5\n"),
                ("sub/202401_NFs_Itens.csv", "CHAVE DE ACESSO,PRODUTO\n1,Caneta\n"),
                ("LEIAME.txt", "docs"),
            ],
        );

        let dest = work.join("extracted");
        let summary = unzip_archive(&zip_path, &dest).unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.csv_entries, 2);
        assert!(dest.join("202401_NFs_Cabecalho.csv").is_file());
        assert!(dest.join("sub/202401_NFs_Itens.csv").is_file());
    }

    #[test]
    fn unzip_rejects_non_zip_input() {
        let work = temp_dir("badzip");
        let zip_path = work.join("broken.zip");
        std::fs::write(&zip_path, b"definitely not a zip archive").unwrap();

        let err = unzip_archive(&zip_path, &work.join("out")).unwrap_err();
        assert!(matches!(err, CsvAgentError::Archive(_)));
        assert!(err.to_string().contains("broken.zip"));
    }

    #[test]
    fn unzip_unreadable_archive_is_an_archive_error() {
        let work = temp_dir("nozip");
        let zip_path = work.join("missing.zip");

        let err = unzip_archive(&zip_path, &work.join("out")).unwrap_err();
        assert!(matches!(err, CsvAgentError::Archive(_)));
        assert!(err.detail().starts_with("failed to extract"));
        assert!(err.detail().contains("missing.zip"));
    }

    #[test]
    fn prepare_inputs_requires_data_dir() {
        let err = prepare_inputs(&InputRequest::default()).unwrap_err();
        assert_eq!(err.detail(), "data directory not specified");
    }

    #[test]
    fn prepare_inputs_unzips_then_lists() {
        let work = temp_dir("prepare");
        let zip_path = work.join("notas.zip");
        write_zip(&zip_path, &[("notas.csv", "CHAVE DE ACESSO\n1\n")]);

        let request = InputRequest {
            zip_path: Some(zip_path),
            data_dir: Some(work.join("data")),
        };
        let found = prepare_inputs(&request).unwrap();
        assert_eq!(found, vec![work.join("data").join("notas.csv")]);
    }

    #[test]
    fn prepare_inputs_skips_missing_zip() {
        let work = temp_dir("nozip");
        std::fs::write(work.join("ready.csv"), "k\n1\n").unwrap();

        let request = InputRequest {
            zip_path: Some(work.join("does-not-exist.zip")),
            data_dir: Some(work.clone()),
        };
        let found = prepare_inputs(&request).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn prepare_inputs_reports_corrupt_zip() {
        let work = temp_dir("corrupt");
        let zip_path = work.join("corrupt.zip");
        std::fs::write(&zip_path, b"PK but not really").unwrap();

        let request = InputRequest {
            zip_path: Some(zip_path),
            data_dir: Some(work.join("data")),
        };
        let err = prepare_inputs(&request).unwrap_err();
        assert!(err.detail().starts_with("failed to extract"));
    }

    #[test]
    fn prepare_inputs_without_csv_errors() {
        let work = temp_dir("empty");
        std::fs::write(work.join("notes.txt"), "nothing tabular").unwrap();

        let request = InputRequest {
            zip_path: None,
            data_dir: Some(work.clone()),
        };
        let err = prepare_inputs(&request).unwrap_err();
        assert!(err.detail().starts_with("no CSV files found in"));
    }

    #[test]
    fn select_takes_everything() {
        let available = vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")];
        assert_eq!(select_csv_files(&available).unwrap(), available);

        let err = select_csv_files(&[]).unwrap_err();
        assert_eq!(err.detail(), "no CSV files available for selection");
    }
}
