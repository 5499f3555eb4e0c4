//! Filesystem path helpers.
//!
//! This module provides the low-level operations shared by the archive
//! rewrite and the trim pipeline:
//! - Sibling naming by appending a suffix to a file or directory name
//! - Listing directory children as `Item`s in natural order
//! - Copying ownership and permission bits between paths
//! - Creating and removing directories

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::model::Item;
use crate::ordering;

/// File name of `path` as UTF-8 text.
pub fn file_name(path: &Path) -> Result<&str, EngineError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EngineError::InvalidPath {
            path: path.to_path_buf(),
            reason: "no UTF-8 file name".to_string(),
        })
}

/// Path of a sibling named by appending `appendix` to this path's name.
///
/// Directories and extensionless files get the appendix at the end of the
/// name; other files get it before the extension (`book.cbz` + `-tmp` is
/// `book-tmp.cbz`).
pub fn sibling_with_appendix(path: &Path, appendix: &str) -> Result<PathBuf, EngineError> {
    let name = file_name(path)?;
    let sibling_name = match path.extension().and_then(|e| e.to_str()) {
        Some(extension) if !path.is_dir() => {
            let stem = &name[..name.len() - extension.len() - 1];
            format!("{}{}.{}", stem, appendix, extension)
        }
        _ => format!("{}{}", name, appendix),
    };
    Ok(path.with_file_name(sibling_name))
}

/// Create a new sibling directory named by appending `appendix`.
///
/// Fails if the directory already exists.
pub fn create_sibling_directory_with_appendix(
    path: &Path,
    appendix: &str,
) -> Result<PathBuf, EngineError> {
    let sibling = sibling_directory_path(path, appendix)?;
    fs::create_dir(&sibling).map_err(|e| EngineError::DirectoryCreationFailed {
        path: sibling.clone(),
        source: e,
    })?;
    Ok(sibling)
}

/// Path of the sibling directory named by appending `appendix` to `path`.
///
/// A file contributes its name without extension, a directory its full name.
pub fn sibling_directory_path(path: &Path, appendix: &str) -> Result<PathBuf, EngineError> {
    let name = if path.is_file() {
        path.file_stem().and_then(|n| n.to_str()).ok_or_else(|| EngineError::InvalidPath {
            path: path.to_path_buf(),
            reason: "no UTF-8 file stem".to_string(),
        })?
    } else {
        file_name(path)?
    };
    Ok(path.with_file_name(format!("{}{}", name, appendix)))
}

/// Create a directory and its parents if they don't already exist.
pub fn ensure_directory(path: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if parent.is_file() {
                return Err(EngineError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Parent path exists but is not a directory",
                    ),
                });
            }
            ensure_directory(parent)
        }
        _ => Ok(()),
    }
}

/// Remove a directory tree if it exists.
pub fn remove_directory(path: &Path) -> Result<(), EngineError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// List the direct children of a directory as items named by file name.
pub fn list_items(directory: &Path) -> Result<Vec<Item>, EngineError> {
    let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
        path: directory.to_path_buf(),
        source: e,
    };
    let mut items = Vec::new();
    for entry in fs::read_dir(directory).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let file_type = entry.file_type().map_err(enumeration_failed)?;
        let name = entry.file_name().into_string().map_err(|_| EngineError::InvalidPath {
            path: entry.path(),
            reason: "file name is not UTF-8".to_string(),
        })?;
        items.push(Item::new(name, file_type.is_dir()));
    }
    Ok(items)
}

/// Files of a directory in natural order, filtered by name and extension.
///
/// `excluded_names` are matched against the whole file name; when
/// `extensions` is not empty only files with one of those (lowercase)
/// extensions are kept. Filtering happens before ordering, so skipped files
/// never influence how the rest are classified.
pub fn sorted_files(
    directory: &Path,
    excluded_names: &BTreeSet<String>,
    extensions: &BTreeSet<String>,
) -> Result<Vec<PathBuf>, EngineError> {
    let files = list_items(directory)?
        .into_iter()
        .filter(|item| !item.is_dir())
        .filter(|item| !excluded_names.contains(item.name()))
        .filter(|item| extensions.is_empty() || extensions.contains(&item.extension()));
    Ok(ordering::sort(files)
        .into_iter()
        .map(|item| directory.join(item.name()))
        .collect())
}

/// Copy owner group and permission bits from `from` onto `to`.
///
/// Execute bits are dropped when copying a directory's mode onto a file.
#[cfg(unix)]
pub fn copy_permissions(from: &Path, to: &Path) -> Result<(), EngineError> {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    let source = fs::metadata(from).map_err(|e| EngineError::ReadError {
        path: from.to_path_buf(),
        source: e,
    })?;
    let mut mode = source.mode() & 0o7777;
    if source.is_dir() && to.is_file() {
        mode &= !0o111;
    }
    let write_error = |e: io::Error| EngineError::WriteError {
        path: to.to_path_buf(),
        source: e,
    };
    fs::set_permissions(to, fs::Permissions::from_mode(mode)).map_err(write_error)?;
    // Changing the owner needs root; the group is enough.
    std::os::unix::fs::chown(to, None, Some(source.gid())).map_err(write_error)
}

/// Copy the read-only flag from `from` onto `to`.
#[cfg(not(unix))]
pub fn copy_permissions(from: &Path, to: &Path) -> Result<(), EngineError> {
    let source = fs::metadata(from).map_err(|e| EngineError::ReadError {
        path: from.to_path_buf(),
        source: e,
    })?;
    let mut permissions = fs::metadata(to)
        .map_err(|e| EngineError::ReadError {
            path: to.to_path_buf(),
            source: e,
        })?
        .permissions();
    permissions.set_readonly(source.permissions().readonly());
    fs::set_permissions(to, permissions).map_err(|e| EngineError::WriteError {
        path: to.to_path_buf(),
        source: e,
    })
}

/// Move `from` onto `onto`, replacing it and taking over its permissions.
///
/// Both paths should live in the same directory so the final step is a
/// rename rather than a copy.
pub fn move_with_permissions(from: &Path, onto: &Path) -> Result<(), EngineError> {
    copy_permissions(onto, from)?;
    fs::rename(from, onto).map_err(|e| EngineError::WriteError {
        path: onto.to_path_buf(),
        source: e,
    })
}
