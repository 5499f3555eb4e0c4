//! Zip archive access and the atomic rewrite transaction.
//!
//! `SourceArchive` and `TargetArchive` wrap the zip reader and writer with
//! the operations the sanitizer needs: listing entries as `Item`s, copying
//! an entry under a new name without recompressing it, and extracting one.
//!
//! `rewrite` is the only way the engine modifies an archive in place. A new
//! archive is written next to the source and renamed over it once complete;
//! on any failure the temporary file is removed and the source is untouched.
//! Two rewrites of the same archive must not run at the same time, since
//! they would share the temporary path.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::EngineError;
use crate::model::Item;
use crate::ordering;
use crate::paths;

/// An archive opened for reading.
pub struct SourceArchive {
    path: PathBuf,
    zip: ZipArchive<File>,
    entries: Vec<Item>,
}

impl SourceArchive {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(|e| EngineError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let zip = ZipArchive::new(file).map_err(|e| EngineError::archive(path, e))?;
        let entries = (0..zip.len())
            .filter_map(|i| zip.name_for_index(i))
            .map(Item::from_entry_name)
            .collect();
        Ok(SourceArchive {
            path: path.to_path_buf(),
            zip,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in the order they are stored in the archive.
    pub fn entries(&self) -> &[Item] {
        &self.entries
    }

    /// File entries in the order they are stored in the archive.
    pub fn files(&self) -> impl Iterator<Item = &Item> {
        self.entries.iter().filter(|e| !e.is_dir())
    }

    /// All entries in natural order.
    pub fn sorted_entries(&self) -> Vec<Item> {
        ordering::sort(self.entries.iter().cloned())
    }

    /// Entries in natural order, leaving out the given (lowercase) extensions.
    pub fn sorted_entries_excluding(&self, extensions: &BTreeSet<String>) -> Vec<Item> {
        self.sorted_entries()
            .into_iter()
            .filter(|e| !extensions.contains(&e.extension()))
            .collect()
    }

    /// File entries in natural order.
    pub fn sorted_files(&self) -> Vec<Item> {
        ordering::sort(self.files().cloned())
    }

    /// Read the full content of a file entry.
    pub fn read(&mut self, item: &Item) -> Result<Vec<u8>, EngineError> {
        let mut entry = self
            .zip
            .by_name(item.name())
            .map_err(|e| EngineError::archive(&self.path, e))?;
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| EngineError::ReadError {
                path: self.path.join(item.name()),
                source: e,
            })?;
        Ok(content)
    }

    /// Copy an entry into `target` under `name`, keeping its bytes as stored.
    pub fn copy_to(
        &mut self,
        item: &Item,
        target: &mut TargetArchive,
        name: &str,
    ) -> Result<(), EngineError> {
        if item.is_dir() {
            return target.add_directory(name);
        }
        let entry = self
            .zip
            .by_name(item.name())
            .map_err(|e| EngineError::archive(&self.path, e))?;
        target
            .zip
            .raw_copy_file_rename(entry, name)
            .map_err(|e| EngineError::archive(&target.path, e))?;
        debug!(from = item.name(), to = name, "Copied archive entry");
        target.written.push(name.to_string());
        Ok(())
    }

    /// Write a file entry's content to `destination`, creating parent directories.
    pub fn extract_to(&mut self, item: &Item, destination: &Path) -> Result<u64, EngineError> {
        paths::ensure_parent_dir_exists(destination)?;
        let mut entry = self
            .zip
            .by_name(item.name())
            .map_err(|e| EngineError::archive(&self.path, e))?;
        let mut output = File::create(destination).map_err(|e| EngineError::WriteError {
            path: destination.to_path_buf(),
            source: e,
        })?;
        io::copy(&mut entry, &mut output).map_err(|e| EngineError::WriteError {
            path: destination.to_path_buf(),
            source: e,
        })
    }
}

/// A brand-new archive opened for writing.
pub struct TargetArchive {
    path: PathBuf,
    zip: ZipWriter<File>,
    written: Vec<String>,
}

impl TargetArchive {
    /// Create an empty archive at `path`.
    ///
    /// Fails with `AlreadyExists` if anything is already at `path`.
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| EngineError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(TargetArchive {
            path: path.to_path_buf(),
            zip: ZipWriter::new(file),
            written: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names written so far, in order.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn add_directory(&mut self, name: &str) -> Result<(), EngineError> {
        self.zip
            .add_directory(name, SimpleFileOptions::default())
            .map_err(|e| EngineError::archive(&self.path, e))?;
        self.written.push(name.to_string());
        Ok(())
    }

    /// Add a file entry whose content is read from `reader`.
    pub fn add_file<R: Read>(&mut self, name: &str, reader: &mut R) -> Result<u64, EngineError> {
        self.zip
            .start_file(name, SimpleFileOptions::default())
            .map_err(|e| EngineError::archive(&self.path, e))?;
        let bytes = io::copy(reader, &mut self.zip).map_err(|e| EngineError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        self.written.push(name.to_string());
        Ok(bytes)
    }

    /// Write the central directory and close the file.
    pub fn finish(self) -> Result<usize, EngineError> {
        let count = self.written.len();
        self.zip
            .finish()
            .map_err(|e| EngineError::archive(&self.path, e))?;
        Ok(count)
    }
}

/// Rewrite the archive at `source` through `populate`, replacing it atomically.
///
/// The temporary archive is named by inserting `tag` before the source's
/// extension. After `populate` returns successfully the temporary archive
/// takes over the source's permissions and is renamed onto it. A file
/// already at the temporary path is never touched; the rewrite fails
/// instead. If anything fails after the temporary archive was created it is
/// removed and the original error is returned.
pub fn rewrite<F>(source: &Path, tag: &str, populate: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut SourceArchive, &mut TargetArchive) -> Result<(), EngineError>,
{
    if tag.is_empty() {
        return Err(EngineError::InvalidPath {
            path: source.to_path_buf(),
            reason: "rewrite tag must not be empty".to_string(),
        });
    }
    let temporary = paths::sibling_with_appendix(source, tag)?;
    let target = TargetArchive::create(&temporary)?;

    let result = write_temporary(source, target, populate).and_then(|count| {
        paths::move_with_permissions(&temporary, source)?;
        Ok(count)
    });

    match result {
        Ok(count) => {
            info!(archive = %source.display(), tag, entries = count, "Rewrote archive");
            Ok(())
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&temporary) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        temporary = %temporary.display(),
                        error = %cleanup,
                        "Failed to remove temporary archive"
                    );
                }
            }
            Err(err)
        }
    }
}

fn write_temporary<F>(
    source: &Path,
    mut target: TargetArchive,
    populate: F,
) -> Result<usize, EngineError>
where
    F: FnOnce(&mut SourceArchive, &mut TargetArchive) -> Result<(), EngineError>,
{
    let mut source_archive = SourceArchive::open(source)?;
    populate(&mut source_archive, &mut target)?;
    target.finish()
}
