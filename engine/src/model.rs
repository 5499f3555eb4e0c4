//! Core data model for archive and page-directory processing.
//!
//! This module defines the values that flow between the engine's modules:
//! - Item: a named entry of a directory or an archive
//! - Operation, Quality, Percent: what the conversion service is asked to do
//! - NamingMode: how packed archive entries are named
//! - Pass: which stage of the trim pipeline is running

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// A named, orderable entry of a container.
///
/// For archive entries the name is the full `/`-separated path inside the
/// archive, with a trailing `/` for directories. For filesystem entries it is
/// the file name within the listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    name: String,
    is_dir: bool,
}

impl Item {
    pub fn new(name: impl Into<String>, is_dir: bool) -> Self {
        Item {
            name: name.into(),
            is_dir,
        }
    }

    /// Build an item from an archive entry name; a trailing `/` marks a directory.
    pub fn from_entry_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let is_dir = name.ends_with('/');
        Item { name, is_dir }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Item::new(name, false)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Item::new(name, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Last path component, without any trailing separator.
    pub fn basename(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        }
    }

    /// Base name with its extension removed. Leading-dot names keep their dot.
    pub fn stem(&self) -> &str {
        let basename = self.basename();
        match basename.rfind('.') {
            Some(i) if i > 0 => &basename[..i],
            _ => basename,
        }
    }

    /// Lowercased extension without the dot, empty when there is none.
    pub fn extension(&self) -> String {
        let basename = self.basename();
        match basename.rfind('.') {
            Some(i) if i > 0 => basename[i + 1..].to_lowercase(),
            _ => String::new(),
        }
    }

    /// Path components of the name, in order, without empty segments.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.name.split('/').filter(|c| !c.is_empty())
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An image operation understood by the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Auto-straighten
    Deskew,
    /// Downscale to fit the maximum page dimension; never upscale
    Resize,
    /// Fuzz-tolerant auto-crop
    Trim,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deskew => write!(f, "deskew"),
            Operation::Resize => write!(f, "resize"),
            Operation::Trim => write!(f, "trim"),
        }
    }
}

/// A compression quality percentage, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(u8);

impl Percent {
    /// Quality used for the final lossy pass of the trim pipeline.
    pub const FINAL_PASS: Percent = Percent(94);

    pub fn new(value: u8) -> Option<Percent> {
        (value <= 100).then_some(Percent(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Output quality requested from the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Lossless,
    Percent(Percent),
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Lossless => write!(f, "lossless"),
            Quality::Percent(p) => write!(f, "{}%", p.get()),
        }
    }
}

impl FromStr for Quality {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        if text == "lossless" {
            return Ok(Quality::Lossless);
        }
        text.trim_end_matches('%')
            .parse::<u8>()
            .ok()
            .and_then(Percent::new)
            .map(Quality::Percent)
            .ok_or_else(|| EngineError::InvalidQuality(s.to_string()))
    }
}

/// How files are named when a directory is packed into an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingMode {
    /// Keep the source file names
    #[default]
    Source,
    /// Zero-padded 1-based index followed by the original extension
    Incrementing,
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingMode::Source => write!(f, "source"),
            NamingMode::Incrementing => write!(f, "incrementing"),
        }
    }
}

impl FromStr for NamingMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" => Ok(NamingMode::Source),
            "incrementing" => Ok(NamingMode::Incrementing),
            _ => Err(EngineError::UnknownNamingMode(s.to_string())),
        }
    }
}

/// A stage of one trim pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Lossless extra trim; `iteration` runs from 2 to the trim count
    Trim { iteration: usize },
    /// Final resize and compression into the target directory
    Final { trimming: bool },
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Trim { iteration } => write!(f, "Extra trim {}", iteration),
            Pass::Final { trimming: true } => write!(f, "Trimming"),
            Pass::Final { trimming: false } => write!(f, "Resizing"),
        }
    }
}
