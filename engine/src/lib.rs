//! # pagepack engine - page archive normalization library
//!
//! Cleans up comic-book style page archives and page directories, and
//! produces trimmed, resized copies of their images.
//!
//! ## Overview
//!
//! The engine provides:
//! - Natural page ordering across common file naming conventions
//! - Atomic archive rewrites: an archive is either fully replaced or left
//!   byte-for-byte as it was
//! - Sanitizing operations built on those rewrites (garbage removal,
//!   flattening, renumbering) and read-only checks to decide which are needed
//! - A trim/resize pipeline driving an external image converter, with
//!   scratch directories that never outlive a run
//! - Packing a directory into an archive and extracting one
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{trim_all, MagickConverter, PipelineOptions, Sanitizer};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sanitizer = Sanitizer::default();
//! let report = sanitizer.sanitize(Path::new("book.cbz"))?;
//! println!("Renumbered: {}", report.renumbered);
//!
//! let target = trim_all(
//!     Path::new("book"),
//!     &PipelineOptions::default(),
//!     &MagickConverter::default(),
//!     None,
//! )?;
//! println!("Pages written to {}", target.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core values (Item, Operation, Quality, NamingMode, Pass)
//! - **error**: Error types and handling
//! - **ordering**: Natural page ordering
//! - **paths**: Sibling naming, permissions and directory helpers
//! - **archive**: Zip access and the atomic rewrite transaction
//! - **sanitize**: Archive sanitizing operations and checks
//! - **convert**: Image conversion service
//! - **pipeline**: Trim and resize pipeline
//! - **package**: Packing and extracting archives
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod ordering;
pub mod paths;
pub mod archive;
pub mod sanitize;
pub mod convert;
pub mod pipeline;
pub mod package;
pub mod progress;

#[cfg(test)]
mod test_util;

// Re-export main types and functions
pub use model::{Item, NamingMode, Operation, Pass, Percent, Quality};
pub use error::EngineError;
pub use archive::{rewrite, SourceArchive, TargetArchive};
pub use sanitize::{GarbageNames, Precondition, SanitizeReport, Sanitizer, IMAGE_EXTENSIONS};
pub use convert::{Converter, MagickConverter};
pub use pipeline::{trim_all, PipelineOptions};
pub use package::{extract_archive, pack_directory};
pub use progress::ProgressCallback;
