//! Image conversion service.
//!
//! The engine never touches pixels itself. It asks a `Converter` to turn one
//! image file into another with a list of operations and a quality, and the
//! production implementation shells out to ImageMagick.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::EngineError;
use crate::model::{Operation, Quality};

/// Largest width or height, in pixels, a resized page may have.
pub const MAX_DIMENSION: u32 = 2700;

/// Converts a single image file.
pub trait Converter {
    /// Write `source` to `target`, applying `operations` in order.
    ///
    /// The target's extension selects the output format.
    fn convert(
        &self,
        operations: &[Operation],
        quality: Quality,
        source: &Path,
        target: &Path,
    ) -> Result<(), EngineError>;
}

impl Operation {
    /// Command-line arguments for this operation.
    pub fn arguments(self) -> Vec<String> {
        match self {
            Operation::Deskew => strings(&["-deskew", "40%", "+repage"]),
            Operation::Resize => vec![
                "-resize".to_string(),
                format!("{0}>x{0}>", MAX_DIMENSION),
                "+repage".to_string(),
            ],
            Operation::Trim => strings(&["-fuzz", "7%", "-trim", "+repage"]),
        }
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Compression arguments for writing `target` at `quality`.
///
/// Only WebP output takes compression settings.
fn compression_arguments(quality: Quality, target: &Path) -> Vec<String> {
    let is_webp = target
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("webp"));
    if !is_webp {
        return Vec::new();
    }
    match quality {
        Quality::Lossless => strings(&["-define", "webp:lossless=true"]),
        Quality::Percent(p) => vec!["-quality".to_string(), format!("{}%", p.get())],
    }
}

/// Converter backed by the ImageMagick `convert` program.
#[derive(Debug, Clone)]
pub struct MagickConverter {
    program: String,
}

impl Default for MagickConverter {
    fn default() -> Self {
        MagickConverter {
            program: "convert".to_string(),
        }
    }
}

impl MagickConverter {
    pub fn new(program: impl Into<String>) -> Self {
        MagickConverter {
            program: program.into(),
        }
    }

    /// Full argument list, program first.
    pub fn command(
        &self,
        operations: &[Operation],
        quality: Quality,
        source: &Path,
        target: &Path,
    ) -> Vec<String> {
        let mut command = vec![
            self.program.clone(),
            "-alpha".to_string(),
            "flatten".to_string(),
            source.display().to_string(),
        ];
        command.extend(operations.iter().flat_map(|op| op.arguments()));
        command.extend(compression_arguments(quality, target));
        command.push(target.display().to_string());
        command
    }
}

impl Converter for MagickConverter {
    fn convert(
        &self,
        operations: &[Operation],
        quality: Quality,
        source: &Path,
        target: &Path,
    ) -> Result<(), EngineError> {
        let source = source.canonicalize().map_err(|e| EngineError::ReadError {
            path: source.to_path_buf(),
            source: e,
        })?;
        let command = self.command(operations, quality, &source, target);
        run(&command).map_err(|err| match err {
            CommandError::Launch(e) => EngineError::CommandLaunch {
                program: self.program.clone(),
                source: e,
            },
            CommandError::Failed(output) => EngineError::Conversion {
                input: source.clone(),
                output,
            },
        })?;
        Ok(())
    }
}

#[derive(Debug)]
enum CommandError {
    Launch(std::io::Error),
    Failed(String),
}

/// Run a command and return its combined output; non-zero exit is an error.
fn run(command: &[String]) -> Result<String, CommandError> {
    let Some((program, args)) = command.split_first() else {
        return Ok(String::new());
    };
    debug!(command = %command.join(" "), "Running");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(CommandError::Launch)?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(combined)
    } else {
        Err(CommandError::Failed(combined))
    }
}
