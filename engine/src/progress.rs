//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the trim
//! pipeline independent of how progress is shown. The CLI prints lines to
//! stderr; tests record the calls.

use std::path::Path;

use crate::model::Pass;

/// Receives progress updates from a trim pipeline run.
///
/// All methods are called synchronously, in page order.
pub trait ProgressCallback: Send {
    /// Called when a pass starts, with the number of files it will visit.
    fn on_pass_started(&self, pass: Pass, files: usize);

    /// Called before a file is converted.
    fn on_file_started(&self, pass: Pass, file_index: usize, source: &Path, target: &Path);

    /// Called when a file's output already exists and the conversion is skipped.
    fn on_file_skipped(&self, pass: Pass, file_index: usize, target: &Path);

    /// Called after every file of a pass has been handled.
    fn on_pass_completed(&self, pass: Pass);
}
