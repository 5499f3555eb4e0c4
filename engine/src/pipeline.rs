//! Trim and resize pipeline for a directory of page images.
//!
//! A run makes `trim_count - 1` lossless trim passes, each into a fresh
//! scratch directory next to the source (`<name>-trim-<i>`), then one final
//! trim+resize pass at quality 94 into `<name><suffix>`. Scratch directories
//! are removed when the run ends, whether it succeeded or not. The final
//! pass skips pages whose output already exists, so a failed run can be
//! resumed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::convert::Converter;
use crate::error::EngineError;
use crate::model::{Item, Operation, Pass, Percent, Quality};
use crate::paths;
use crate::progress::ProgressCallback;
use crate::sanitize::IMAGE_EXTENSIONS;

/// Format of the lossless intermediate copies.
const SCRATCH_EXTENSION: &str = "webp";

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Number of trims; 0 only resizes
    pub trim_count: usize,
    /// Extension (and so format) of the final pages
    pub compression: String,
    /// Appended to the source directory name to name the target directory
    pub suffix: String,
    /// File names never treated as pages
    pub excluded_names: BTreeSet<String>,
    /// Lowercase extensions treated as pages
    pub image_extensions: BTreeSet<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            trim_count: 1,
            compression: "webp".to_string(),
            suffix: "-optimized".to_string(),
            excluded_names: [".nomedia".to_string()].into(),
            image_extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl PipelineOptions {
    fn final_operations(&self) -> &'static [Operation] {
        if self.trim_count > 0 {
            &[Operation::Trim, Operation::Resize]
        } else {
            &[Operation::Resize]
        }
    }

    fn pages(&self, directory: &Path) -> Result<Vec<PathBuf>, EngineError> {
        paths::sorted_files(directory, &self.excluded_names, &self.image_extensions)
    }
}

/// Scratch directories created by one run, removed when dropped.
#[derive(Debug, Default)]
struct ScratchDirectories {
    directories: Vec<PathBuf>,
}

impl ScratchDirectories {
    /// Create the scratch directory for `iteration`, replacing a stale one.
    fn create(&mut self, source: &Path, iteration: usize) -> Result<PathBuf, EngineError> {
        let appendix = format!("-trim-{}", iteration);
        let stale = paths::sibling_directory_path(source, &appendix)?;
        paths::remove_directory(&stale)?;
        let directory = paths::create_sibling_directory_with_appendix(source, &appendix)?;
        self.directories.push(directory.clone());
        Ok(directory)
    }
}

impl Drop for ScratchDirectories {
    fn drop(&mut self) {
        for directory in &self.directories {
            match paths::remove_directory(directory) {
                Ok(()) => debug!(directory = %directory.display(), "Removed scratch directory"),
                Err(e) => warn!(
                    directory = %directory.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                ),
            }
        }
    }
}

fn stem(path: &Path) -> Result<String, EngineError> {
    Ok(Item::file(paths::file_name(path)?).stem().to_string())
}

/// Output path in `directory` for every page, in page order.
///
/// Pages differing only by extension would share an output; that is an
/// error rather than a silently lost page.
fn page_targets(
    pages: &[PathBuf],
    directory: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, EngineError> {
    let mut claimed: BTreeMap<String, &Path> = BTreeMap::new();
    let mut targets = Vec::with_capacity(pages.len());
    for page in pages {
        let name = format!("{}.{}", stem(page)?, extension);
        if let Some(other) = claimed.insert(name.clone(), page.as_path()) {
            return Err(EngineError::InvalidPath {
                path: page.clone(),
                reason: format!("{} would also be written as {}", other.display(), name),
            });
        }
        targets.push(directory.join(name));
    }
    Ok(targets)
}

/// Run the pipeline over `directory` and return the target directory.
pub fn trim_all(
    directory: &Path,
    options: &PipelineOptions,
    converter: &dyn Converter,
    progress: Option<&dyn ProgressCallback>,
) -> Result<PathBuf, EngineError> {
    if options.suffix.is_empty() {
        return Err(EngineError::InvalidPath {
            path: directory.to_path_buf(),
            reason: "target suffix must not be empty".to_string(),
        });
    }

    let mut scratch = ScratchDirectories::default();
    let mut read_from = directory.to_path_buf();

    for iteration in 2..=options.trim_count {
        let pass = Pass::Trim { iteration };
        let trim_directory = scratch.create(directory, iteration)?;
        let pages = options.pages(&read_from)?;
        let targets = page_targets(&pages, &trim_directory, SCRATCH_EXTENSION)?;
        info!(directory = %directory.display(), iteration, pages = pages.len(), "Extra trim");
        if let Some(cb) = progress {
            cb.on_pass_started(pass, pages.len());
        }

        for (index, (source, target)) in pages.iter().zip(&targets).enumerate() {
            if let Some(cb) = progress {
                cb.on_file_started(pass, index, source, target);
            }
            converter.convert(&[Operation::Trim], Quality::Lossless, source, target)?;
        }

        if let Some(cb) = progress {
            cb.on_pass_completed(pass);
        }
        read_from = trim_directory;
    }

    let target_directory = paths::sibling_directory_path(directory, &options.suffix)?;
    let pages = options.pages(&read_from)?;
    let targets = page_targets(&pages, &target_directory, &options.compression)?;
    paths::ensure_directory(&target_directory)?;

    let pass = Pass::Final {
        trimming: options.trim_count > 0,
    };
    info!(
        directory = %directory.display(),
        target = %target_directory.display(),
        pages = pages.len(),
        "{}",
        pass
    );
    if let Some(cb) = progress {
        cb.on_pass_started(pass, pages.len());
    }

    for (index, (source, target)) in pages.iter().zip(&targets).enumerate() {
        if target.exists() {
            debug!(target = %target.display(), "Output exists, skipping");
            if let Some(cb) = progress {
                cb.on_file_skipped(pass, index, target);
            }
            continue;
        }
        if let Some(cb) = progress {
            cb.on_file_started(pass, index, source, target);
        }
        converter.convert(
            options.final_operations(),
            Quality::Percent(Percent::FINAL_PASS),
            source,
            target,
        )?;
    }

    if let Some(cb) = progress {
        cb.on_pass_completed(pass);
    }
    Ok(target_directory)
}
