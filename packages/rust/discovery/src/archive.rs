//! ZIP extraction.

use std::fs::File;
use std::path::{Path, PathBuf};

use csvagent_shared::{CsvAgentError, Result};
use tracing::{debug, info, instrument};

/// What an extraction wrote to disk.
#[derive(Debug, Clone)]
pub struct ExtractSummary {
    /// Directory the archive was extracted into.
    pub dest: PathBuf,
    /// Number of archive entries (files and directories).
    pub entries: usize,
    /// Number of entries with a `.csv` extension.
    pub csv_entries: usize,
}

/// Extract every entry of `zip_path` into `dest`, creating `dest` if needed.
///
/// Entries whose path would land outside `dest` make the whole extraction fail.
#[instrument(skip_all, fields(zip = %zip_path.display(), dest = %dest.display()))]
pub fn unzip_archive(zip_path: &Path, dest: &Path) -> Result<ExtractSummary> {
    std::fs::create_dir_all(dest).map_err(|e| CsvAgentError::io(dest, e))?;

    let file = File::open(zip_path).map_err(|e| {
        CsvAgentError::Archive(format!("failed to extract {}: {e}", zip_path.display()))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        CsvAgentError::Archive(format!(
            "failed to extract {}: not a readable ZIP archive ({e})",
            zip_path.display()
        ))
    })?;

    let entries = archive.len();
    let csv_entries = archive
        .file_names()
        .filter(|name| super::has_csv_extension(Path::new(name)))
        .count();
    debug!(entries, csv_entries, "archive opened");

    archive.extract(dest).map_err(|e| {
        CsvAgentError::Archive(format!("failed to extract {}: {e}", zip_path.display()))
    })?;

    info!(entries, csv_entries, "archive extracted");

    Ok(ExtractSummary {
        dest: dest.to_path_buf(),
        entries,
        csv_entries,
    })
}
