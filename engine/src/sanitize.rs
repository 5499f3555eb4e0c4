//! Archive sanitizing operations.
//!
//! Every mutating operation here is a single `archive::rewrite` transaction
//! and keeps the bytes of every entry it copies. The detection predicates
//! only read the archive and tell callers which operations are needed.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::archive::{self, SourceArchive};
use crate::error::EngineError;
use crate::model::Item;

/// File extensions recognised as page images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];

/// Names of platform metadata entries that are never pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarbageNames {
    /// Directory names; an entry with any path component in this set is garbage
    pub directories: BTreeSet<String>,
    /// File base names
    pub files: BTreeSet<String>,
}

impl Default for GarbageNames {
    fn default() -> Self {
        GarbageNames {
            directories: ["__MACOSX"].into_iter().map(String::from).collect(),
            files: [".DS_Store", "mimetype"].into_iter().map(String::from).collect(),
        }
    }
}

impl GarbageNames {
    /// Whether any component of the entry's path is a garbage directory name.
    pub fn in_garbage_directory(&self, item: &Item) -> bool {
        item.components().any(|c| self.directories.contains(c))
    }

    pub fn is_garbage_file(&self, item: &Item) -> bool {
        !item.is_dir() && self.files.contains(item.basename())
    }
}

/// A read-only check on an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// All entries live inside one top-level directory
    SingleDirectory,
    /// Files are already named 1..N with uniform zero padding
    Numbered,
    /// Some entry lies in a garbage directory
    GarbageDirectories,
    /// Some entry is a garbage file
    GarbageFiles,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::SingleDirectory => write!(f, "single-directory"),
            Precondition::Numbered => write!(f, "numbered"),
            Precondition::GarbageDirectories => write!(f, "garbage-directories"),
            Precondition::GarbageFiles => write!(f, "garbage-files"),
        }
    }
}

impl FromStr for Precondition {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-directory" => Ok(Precondition::SingleDirectory),
            "numbered" => Ok(Precondition::Numbered),
            "garbage-directories" => Ok(Precondition::GarbageDirectories),
            "garbage-files" => Ok(Precondition::GarbageFiles),
            _ => Err(EngineError::UnknownPrecondition(s.to_string())),
        }
    }
}

/// Which steps `Sanitizer::sanitize` applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub removed_garbage_directories: bool,
    pub removed_garbage_files: bool,
    pub flattened: bool,
    pub renumbered: bool,
}

impl SanitizeReport {
    pub fn changed(&self) -> bool {
        self.removed_garbage_directories
            || self.removed_garbage_files
            || self.flattened
            || self.renumbered
    }
}

/// Number of decimal digits needed to write `count`.
fn digits(count: usize) -> usize {
    count.to_string().len()
}

/// Archive sanitizer configured with the garbage names to strip.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    garbage: GarbageNames,
}

impl Sanitizer {
    pub fn new(garbage: GarbageNames) -> Self {
        Sanitizer { garbage }
    }

    pub fn garbage(&self) -> &GarbageNames {
        &self.garbage
    }

    /// Drop every entry that lies in a garbage directory.
    pub fn remove_garbage_directories(&self, path: &Path) -> Result<(), EngineError> {
        archive::rewrite(path, "-withoutgarbagedirectories", |source, target| {
            for entry in source.entries().to_vec() {
                if self.garbage.in_garbage_directory(&entry) {
                    debug!(entry = entry.name(), "Dropping garbage directory entry");
                    continue;
                }
                source.copy_to(&entry, target, entry.name())?;
            }
            Ok(())
        })
    }

    /// Drop every file entry whose base name is a garbage file name.
    pub fn remove_garbage_files(&self, path: &Path) -> Result<(), EngineError> {
        archive::rewrite(path, "-withoutgarbagefiles", |source, target| {
            for entry in source.entries().to_vec() {
                if self.garbage.is_garbage_file(&entry) {
                    debug!(entry = entry.name(), "Dropping garbage file");
                    continue;
                }
                source.copy_to(&entry, target, entry.name())?;
            }
            Ok(())
        })
    }

    /// Move every entry out of the archive's single top-level directory.
    ///
    /// Fails with `ArchiveInvariantViolation`, leaving the archive as it was,
    /// unless `is_single_directory` holds.
    pub fn flatten_single_directory(&self, path: &Path) -> Result<(), EngineError> {
        let directory = {
            let source = SourceArchive::open(path)?;
            single_directory(source.entries()).ok_or_else(|| {
                EngineError::ArchiveInvariantViolation {
                    path: path.to_path_buf(),
                    reason: "entries are not all inside one directory".to_string(),
                }
            })?
        };

        archive::rewrite(path, "-nodirectory", |source, target| {
            for entry in source.sorted_files() {
                let name = &entry.name()[directory.name().len()..];
                source.copy_to(&entry, target, name)?;
            }
            Ok(())
        })
    }

    /// Rename file entries to `<index>.<extension>` in natural order.
    ///
    /// Indexes start at 1 and are zero-padded to the digit count of the
    /// number of files. Directory entries are dropped.
    pub fn renumber(&self, path: &Path) -> Result<(), EngineError> {
        archive::rewrite(path, "-renumbered", |source, target| {
            let files = source.sorted_files();
            let width = digits(files.len());
            for (index, entry) in files.iter().enumerate() {
                let name = numbered_name(index + 1, width, &entry.extension());
                source.copy_to(entry, target, &name)?;
            }
            Ok(())
        })
    }

    /// Whether there is exactly one directory entry and every other entry is inside it.
    pub fn is_single_directory(&self, path: &Path) -> Result<bool, EngineError> {
        let source = SourceArchive::open(path)?;
        Ok(single_directory(source.entries()).is_some())
    }

    /// Whether files are already named 1..N (zero-padded) in natural order.
    pub fn is_numbered(&self, path: &Path) -> Result<bool, EngineError> {
        let source = SourceArchive::open(path)?;
        let files = source.sorted_files();
        let width = digits(files.len());
        Ok(files
            .iter()
            .enumerate()
            .all(|(index, entry)| entry.stem() == format!("{:0width$}", index + 1, width = width)))
    }

    pub fn has_garbage_directories(&self, path: &Path) -> Result<bool, EngineError> {
        let source = SourceArchive::open(path)?;
        Ok(source
            .entries()
            .iter()
            .any(|e| self.garbage.in_garbage_directory(e)))
    }

    pub fn has_garbage_files(&self, path: &Path) -> Result<bool, EngineError> {
        let source = SourceArchive::open(path)?;
        Ok(source.entries().iter().any(|e| self.garbage.is_garbage_file(e)))
    }

    /// File entries that are neither garbage files nor page images.
    pub fn unknown_entries(&self, path: &Path) -> Result<Vec<Item>, EngineError> {
        let source = SourceArchive::open(path)?;
        Ok(source
            .files()
            .filter(|e| !self.garbage.is_garbage_file(e))
            .filter(|e| !self.garbage.in_garbage_directory(e))
            .filter(|e| !IMAGE_EXTENSIONS.contains(&e.extension().as_str()))
            .cloned()
            .collect())
    }

    /// Evaluate one precondition.
    pub fn check(&self, path: &Path, precondition: Precondition) -> Result<bool, EngineError> {
        match precondition {
            Precondition::SingleDirectory => self.is_single_directory(path),
            Precondition::Numbered => self.is_numbered(path),
            Precondition::GarbageDirectories => self.has_garbage_directories(path),
            Precondition::GarbageFiles => self.has_garbage_files(path),
        }
    }

    /// Apply each operation whose detection predicate says it is needed.
    pub fn sanitize(&self, path: &Path) -> Result<SanitizeReport, EngineError> {
        let mut report = SanitizeReport::default();

        if self.has_garbage_directories(path)? {
            self.remove_garbage_directories(path)?;
            report.removed_garbage_directories = true;
        }
        if self.has_garbage_files(path)? {
            self.remove_garbage_files(path)?;
            report.removed_garbage_files = true;
        }
        if self.is_single_directory(path)? {
            self.flatten_single_directory(path)?;
            report.flattened = true;
        }
        if !self.is_numbered(path)? {
            self.renumber(path)?;
            report.renumbered = true;
        }

        info!(archive = %path.display(), ?report, "Sanitized archive");
        Ok(report)
    }
}

/// The one directory entry that contains every other entry, if there is one.
fn single_directory(entries: &[Item]) -> Option<Item> {
    let mut directories = entries.iter().filter(|e| e.is_dir());
    let directory = directories.next()?;
    if directories.next().is_some() {
        return None;
    }
    let prefix = directory.name();
    entries
        .iter()
        .all(|e| e.name() == prefix || e.name().starts_with(prefix))
        .then(|| directory.clone())
}

fn numbered_name(index: usize, width: usize, extension: &str) -> String {
    if extension.is_empty() {
        format!("{:0width$}", index, width = width)
    } else {
        format!("{:0width$}.{}", index, extension, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{entry_content, entry_names, write_zip};
    use std::fs;

    #[test]
    fn test_remove_garbage_directories() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[
                ("p-1.jpg", b"one"),
                ("__MACOSX/", b""),
                ("__MACOSX/._p-1.jpg", b"fork"),
                ("extra/__MACOSX/deep.jpg", b"fork"),
                ("p-2.jpg", b"two"),
            ],
        );
        let sanitizer = Sanitizer::default();
        assert!(sanitizer.has_garbage_directories(&archive).unwrap());

        sanitizer.remove_garbage_directories(&archive).expect("Failed to remove");

        assert_eq!(entry_names(&archive), vec!["p-1.jpg", "p-2.jpg"]);
        assert_eq!(entry_content(&archive, "p-2.jpg"), b"two");
        assert!(!sanitizer.has_garbage_directories(&archive).unwrap());
    }

    #[test]
    fn test_remove_garbage_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[
                ("mimetype", b"application/zip"),
                ("pages/", b""),
                ("pages/.DS_Store", b"junk"),
                ("pages/01.jpg", b"one"),
            ],
        );
        let sanitizer = Sanitizer::default();
        assert!(sanitizer.has_garbage_files(&archive).unwrap());

        sanitizer.remove_garbage_files(&archive).expect("Failed to remove");

        assert_eq!(entry_names(&archive), vec!["pages/", "pages/01.jpg"]);
        assert!(!sanitizer.has_garbage_files(&archive).unwrap());
    }

    #[test]
    fn test_custom_garbage_names() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(&archive, &[("Thumbs.db", b"x"), (".DS_Store", b"y"), ("1.jpg", b"z")]);

        let sanitizer = Sanitizer::new(GarbageNames {
            directories: BTreeSet::new(),
            files: ["Thumbs.db".to_string()].into(),
        });
        sanitizer.remove_garbage_files(&archive).expect("Failed to remove");
        assert_eq!(entry_names(&archive), vec![".DS_Store", "1.jpg"]);
    }

    #[test]
    fn test_flatten_single_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[("Vol 1/", b""), ("Vol 1/p-2.jpg", b"two"), ("Vol 1/p-1.jpg", b"one")],
        );
        let sanitizer = Sanitizer::default();
        assert!(sanitizer.is_single_directory(&archive).unwrap());

        sanitizer.flatten_single_directory(&archive).expect("Failed to flatten");

        assert_eq!(entry_names(&archive), vec!["p-1.jpg", "p-2.jpg"]);
        assert_eq!(entry_content(&archive, "p-1.jpg"), b"one");
        assert!(!sanitizer.is_single_directory(&archive).unwrap());
    }

    #[test]
    fn test_flatten_rejects_two_directories() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[("a/", b""), ("a/1.jpg", b"one"), ("b/", b""), ("b/2.jpg", b"two")],
        );
        let before = fs::read(&archive).unwrap();
        let sanitizer = Sanitizer::default();
        assert!(!sanitizer.is_single_directory(&archive).unwrap());

        let result = sanitizer.flatten_single_directory(&archive);
        assert!(matches!(result, Err(EngineError::ArchiveInvariantViolation { .. })));
        assert_eq!(fs::read(&archive).unwrap(), before);
    }

    #[test]
    fn test_single_directory_requires_every_entry_inside() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(&archive, &[("a/", b""), ("a/1.jpg", b"one"), ("cover.jpg", b"c")]);
        assert!(!Sanitizer::default().is_single_directory(&archive).unwrap());
    }

    #[test]
    fn test_renumber_pads_to_entry_count() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        let names: Vec<String> = (1..=12).rev().map(|i| format!("page_{}.PNG", i)).collect();
        let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), n.as_bytes())).collect();
        write_zip(&archive, &entries);
        let sanitizer = Sanitizer::default();
        assert!(!sanitizer.is_numbered(&archive).unwrap());

        sanitizer.renumber(&archive).expect("Failed to renumber");

        let expected: Vec<String> = (1..=12).map(|i| format!("{:02}.png", i)).collect();
        assert_eq!(entry_names(&archive), expected);
        assert_eq!(entry_content(&archive, "01.png"), b"page_1.PNG");
        assert_eq!(entry_content(&archive, "12.png"), b"page_12.PNG");
        assert!(sanitizer.is_numbered(&archive).unwrap());
    }

    #[test]
    fn test_renumber_twice_is_stable() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[("c-3.jpg", b"3"), ("c-1.jpg", b"1"), ("c-10.jpg", b"10"), ("c-2.jpg", b"2")],
        );
        let sanitizer = Sanitizer::default();

        sanitizer.renumber(&archive).expect("Failed to renumber");
        let once = entry_names(&archive);
        sanitizer.renumber(&archive).expect("Failed to renumber again");

        assert_eq!(entry_names(&archive), once);
        assert_eq!(once, vec!["1.jpg", "2.jpg", "3.jpg", "4.jpg"]);
        assert_eq!(entry_content(&archive, "4.jpg"), b"10");
    }

    #[test]
    fn test_unknown_entries() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[("1.jpg", b"1"), ("ComicInfo.xml", b"<x/>"), (".DS_Store", b"j")],
        );
        let unknown = Sanitizer::default().unknown_entries(&archive).unwrap();
        assert_eq!(unknown, vec![Item::file("ComicInfo.xml")]);
    }

    #[test]
    fn test_precondition_parsing() {
        assert_eq!(
            "garbage-files".parse::<Precondition>().unwrap(),
            Precondition::GarbageFiles
        );
        assert!(matches!(
            "sorted".parse::<Precondition>(),
            Err(EngineError::UnknownPrecondition(_))
        ));
    }

    #[test]
    fn test_sanitize_composes_steps_and_settles() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("book.cbz");
        write_zip(
            &archive,
            &[
                ("Book/", b""),
                ("Book/page-2.jpg", b"two"),
                ("Book/page-1.jpg", b"one"),
                ("Book/.DS_Store", b"junk"),
                ("__MACOSX/", b""),
                ("__MACOSX/Book/._page-1.jpg", b"fork"),
            ],
        );
        let sanitizer = Sanitizer::default();

        let report = sanitizer.sanitize(&archive).expect("Failed to sanitize");
        assert_eq!(
            report,
            SanitizeReport {
                removed_garbage_directories: true,
                removed_garbage_files: true,
                flattened: true,
                renumbered: true,
            }
        );
        assert_eq!(entry_names(&archive), vec!["1.jpg", "2.jpg"]);
        assert_eq!(entry_content(&archive, "1.jpg"), b"one");

        let again = sanitizer.sanitize(&archive).expect("Failed to sanitize again");
        assert!(!again.changed(), "second pass should find nothing to do");
    }
}
