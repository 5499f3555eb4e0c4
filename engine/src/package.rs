//! Moving pages between directories and archives.
//!
//! `extract_archive` unpacks an archive's files flat into a directory and
//! `pack_directory` builds a new archive from a directory's files, both in
//! natural page order.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::{SourceArchive, TargetArchive};
use crate::error::EngineError;
use crate::model::{Item, NamingMode};
use crate::paths;

/// Appendix of the temporary archive `pack_directory` writes before renaming.
const PACKING_TAG: &str = "-packing";

/// Write every file of `directory` (not recursive) into a new archive at `target`.
///
/// The archive is written next to `target` and renamed onto it once
/// complete, so an existing archive at `target` is only replaced by a whole
/// one. Returns the number of entries written.
pub fn pack_directory(
    directory: &Path,
    target: &Path,
    naming: NamingMode,
) -> Result<usize, EngineError> {
    let files = paths::sorted_files(directory, &BTreeSet::new(), &BTreeSet::new())?;
    let temporary = paths::sibling_with_appendix(target, PACKING_TAG)?;
    let archive = TargetArchive::create(&temporary)?;

    let result = write_pages(&files, archive, naming).and_then(|count| {
        fs::rename(&temporary, target).map_err(|e| EngineError::WriteError {
            path: target.to_path_buf(),
            source: e,
        })?;
        Ok(count)
    });

    match result {
        Ok(count) => {
            info!(
                directory = %directory.display(),
                archive = %target.display(),
                entries = count,
                %naming,
                "Packed directory"
            );
            Ok(count)
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&temporary) {
                warn!(archive = %temporary.display(), error = %cleanup, "Failed to remove partial archive");
            }
            Err(err)
        }
    }
}

fn write_pages(
    files: &[PathBuf],
    mut archive: TargetArchive,
    naming: NamingMode,
) -> Result<usize, EngineError> {
    let width = files.len().to_string().len();
    for (index, path) in files.iter().enumerate() {
        let name = match naming {
            NamingMode::Source => paths::file_name(path)?.to_string(),
            NamingMode::Incrementing => {
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{}", e))
                    .unwrap_or_default();
                format!("{:0width$}{}", index + 1, extension, width = width)
            }
        };
        let mut reader = File::open(path).map_err(|e| EngineError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        archive.add_file(&name, &mut reader)?;
    }
    archive.finish()
}

/// Base name of a file entry, unless it could point outside the target directory.
fn extractable_name(entry: &Item) -> Option<&str> {
    let name = entry.basename();
    let unsafe_name = name.is_empty() || name == "." || name == ".." || name.contains('\\');
    (!unsafe_name).then_some(name)
}

/// Copy every file entry of `archive` into `directory` under its base name.
///
/// Directory entries are skipped. Returns the number of files written.
pub fn extract_archive(archive: &Path, directory: &Path) -> Result<usize, EngineError> {
    paths::ensure_directory(directory)?;
    let mut source = SourceArchive::open(archive)?;
    let mut count = 0;
    for entry in source.sorted_files() {
        let name = extractable_name(&entry).ok_or_else(|| EngineError::InvalidPath {
            path: archive.join(entry.name()),
            reason: "entry name escapes the target directory".to_string(),
        })?;
        source.extract_to(&entry, &directory.join(name))?;
        count += 1;
    }
    info!(archive = %archive.display(), directory = %directory.display(), files = count, "Extracted archive");
    Ok(count)
}
