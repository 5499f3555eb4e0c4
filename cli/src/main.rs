//! pagepack - Command-line interface for the page archive engine.
//!
//! Sanitizes page archives, runs the trim/resize pipeline over page
//! directories, and packs or extracts archives. Progress goes to stderr.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use engine::{
    extract_archive, pack_directory, paths, trim_all, GarbageNames, MagickConverter, NamingMode,
    Pass, PipelineOptions, Precondition, ProgressCallback, Sanitizer,
};

/// pagepack - normalize and repackage page archives
#[derive(Parser, Debug)]
#[command(name = "pagepack")]
#[command(version = "0.1.0")]
#[command(about = "Clean up page archives and produce trimmed, resized pages")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remove garbage entries, flatten and renumber an archive in place
    Sanitize {
        /// Archive to sanitize
        archive: PathBuf,

        #[command(flatten)]
        garbage: GarbageArgs,
    },

    /// Exit 0 if a precondition holds for an archive, 1 if not
    Check {
        /// Archive to inspect
        archive: PathBuf,

        /// One of: single-directory, numbered, garbage-directories, garbage-files
        #[arg(long, value_name = "NAME")]
        precondition: String,

        #[command(flatten)]
        garbage: GarbageArgs,
    },

    /// Trim and resize the pages of a directory into a sibling directory
    Trim {
        /// Directory of page images
        directory: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Pack the files of a directory into a new archive
    Pack {
        /// Directory of pages
        directory: PathBuf,

        /// Archive to create
        target: PathBuf,

        /// Entry naming: source or incrementing
        #[arg(long, value_name = "MODE", default_value = "source")]
        naming: String,
    },

    /// Extract the files of an archive into a directory
    Extract {
        /// Archive to read
        archive: PathBuf,

        /// Directory to write pages into
        directory: PathBuf,
    },

    /// Sanitize an archive, trim its pages and pack them into a new archive
    Process {
        /// Archive to process
        archive: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Entry naming of the packed archive: source or incrementing
        #[arg(long, value_name = "MODE", default_value = "incrementing")]
        naming: String,

        #[command(flatten)]
        garbage: GarbageArgs,
    },
}

#[derive(ClapArgs, Debug, Clone)]
struct GarbageArgs {
    /// Extra directory name to treat as garbage (repeatable)
    #[arg(long = "garbage-dir", value_name = "NAME")]
    garbage_dirs: Vec<String>,

    /// Extra file name to treat as garbage (repeatable)
    #[arg(long = "garbage-file", value_name = "NAME")]
    garbage_files: Vec<String>,
}

impl GarbageArgs {
    fn sanitizer(&self) -> Sanitizer {
        let mut garbage = GarbageNames::default();
        garbage.directories.extend(self.garbage_dirs.iter().cloned());
        garbage.files.extend(self.garbage_files.iter().cloned());
        Sanitizer::new(garbage)
    }
}

#[derive(ClapArgs, Debug, Clone)]
struct PipelineArgs {
    /// Number of trim passes; 0 only resizes
    #[arg(long, value_name = "N", default_value_t = 1)]
    trim_count: usize,

    /// Output format extension of the final pages
    #[arg(long, value_name = "EXT", default_value = "webp")]
    format: String,

    /// Suffix appended to the directory name for the output directory
    #[arg(long, value_name = "SUFFIX", default_value = "-optimized")]
    suffix: String,

    /// ImageMagick program used for conversions
    #[arg(long, value_name = "PROGRAM", default_value = "convert")]
    convert_program: String,
}

impl PipelineArgs {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            trim_count: self.trim_count,
            compression: self.format.to_lowercase(),
            suffix: self.suffix.clone(),
            ..Default::default()
        }
    }

    fn converter(&self) -> MagickConverter {
        MagickConverter::new(self.convert_program.clone())
    }
}

/// CLI implementation of ProgressCallback for displaying pipeline progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn name(path: &Path) -> &str {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("(unknown)")
    }
}

impl ProgressCallback for CliProgress {
    fn on_pass_started(&self, pass: Pass, files: usize) {
        eprintln!("    {} ({} pages)", pass, files);
    }

    fn on_file_started(&self, pass: Pass, file_index: usize, source: &Path, target: &Path) {
        if self.verbose {
            let action = match pass {
                Pass::Trim { .. } | Pass::Final { trimming: true } => "Trimming",
                Pass::Final { trimming: false } => "Resizing",
            };
            eprintln!(
                "      [{:3}] {} {} -> {}",
                file_index,
                action,
                Self::name(source),
                Self::name(target)
            );
        }
    }

    fn on_file_skipped(&self, _pass: Pass, file_index: usize, target: &Path) {
        if self.verbose {
            eprintln!("      [{:3}] Exists: {}", file_index, Self::name(target));
        }
    }

    fn on_pass_completed(&self, pass: Pass) {
        if let Pass::Final { .. } = pass {
            eprintln!(
                "    Done in {}",
                Self::format_duration(self.start_time.elapsed())
            );
        }
    }
}

/// Parse command-line arguments, set up logging, then run the command
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn require_file(path: &Path) -> Result<(), String> {
    if !path.is_file() {
        return Err(format!("Archive does not exist: {}", path.display()));
    }
    Ok(())
}

fn require_directory(path: &Path) -> Result<(), String> {
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    Ok(())
}

/// Main CLI logic - separated for testability. Returns the exit code.
fn run_cli(args: &Args) -> Result<i32, String> {
    match &args.command {
        Commands::Sanitize { archive, garbage } => {
            require_file(archive)?;
            let report = garbage
                .sanitizer()
                .sanitize(archive)
                .map_err(|e| format!("Sanitizing failed: {}", e))?;
            eprintln!("Sanitized {}: {:?}", archive.display(), report);
            Ok(0)
        }

        Commands::Check {
            archive,
            precondition,
            garbage,
        } => {
            let precondition: Precondition = precondition.parse().map_err(|e| format!("{}", e))?;
            require_file(archive)?;
            let holds = garbage
                .sanitizer()
                .check(archive, precondition)
                .map_err(|e| format!("Check failed: {}", e))?;
            if args.verbose {
                eprintln!("{}: {}", precondition, holds);
            }
            Ok(if holds { 0 } else { 1 })
        }

        Commands::Trim {
            directory,
            pipeline,
        } => {
            require_directory(directory)?;
            let target = run_pipeline(directory, pipeline, args.verbose)?;
            eprintln!("Pages written to {}", target.display());
            Ok(0)
        }

        Commands::Pack {
            directory,
            target,
            naming,
        } => {
            let naming: NamingMode = naming.parse().map_err(|e| format!("{}", e))?;
            require_directory(directory)?;
            let count = pack_directory(directory, target, naming)
                .map_err(|e| format!("Packing failed: {}", e))?;
            eprintln!("Packed {} pages into {}", count, target.display());
            Ok(0)
        }

        Commands::Extract { archive, directory } => {
            require_file(archive)?;
            let count = extract_archive(archive, directory)
                .map_err(|e| format!("Extracting failed: {}", e))?;
            eprintln!("Extracted {} pages into {}", count, directory.display());
            Ok(0)
        }

        Commands::Process {
            archive,
            pipeline,
            naming,
            garbage,
        } => {
            let naming: NamingMode = naming.parse().map_err(|e| format!("{}", e))?;
            require_file(archive)?;
            process_archive(archive, pipeline, naming, &garbage.sanitizer(), args.verbose)?;
            Ok(0)
        }
    }
}

fn run_pipeline(directory: &Path, pipeline: &PipelineArgs, verbose: bool) -> Result<PathBuf, String> {
    let action = if pipeline.trim_count > 0 { "Trimming" } else { "Resizing" };
    eprintln!("  {} images in {}", action, directory.display());
    let progress = CliProgress::new(verbose);
    trim_all(
        directory,
        &pipeline.options(),
        &pipeline.converter(),
        Some(&progress),
    )
    .map_err(|e| format!("Pipeline failed: {}", e))
}

/// Sanitize, extract, trim and repack one archive.
///
/// The packed archive is written next to the source as
/// `<name><suffix>.<extension>`. Pages are extracted into a new `<name>`
/// directory, which must not exist yet and is removed afterwards.
fn process_archive(
    archive: &Path,
    pipeline: &PipelineArgs,
    naming: NamingMode,
    sanitizer: &Sanitizer,
    verbose: bool,
) -> Result<PathBuf, String> {
    eprintln!("Processing {}", archive.display());
    let report = sanitizer
        .sanitize(archive)
        .map_err(|e| format!("Sanitizing failed: {}", e))?;
    if verbose {
        eprintln!("  Sanitized: {:?}", report);
    }

    let unknown = sanitizer
        .unknown_entries(archive)
        .map_err(|e| format!("Inspecting failed: {}", e))?;
    for entry in &unknown {
        eprintln!("  Warning: not a page image: {}", entry);
    }

    // Fails if the directory exists, so only a directory made here is removed below
    let directory = paths::create_sibling_directory_with_appendix(archive, "")
        .map_err(|e| format!("Extracting failed: {}", e))?;
    let result = extract_archive(archive, &directory)
        .map_err(|e| format!("Extracting failed: {}", e))
        .and_then(|_| run_pipeline(&directory, pipeline, verbose))
        .and_then(|pages| {
            let packed = paths::sibling_with_appendix(archive, &pipeline.suffix)
                .map_err(|e| e.to_string())?;
            let count = pack_directory(&pages, &packed, naming)
                .map_err(|e| format!("Packing failed: {}", e))?;
            eprintln!("  Packed {} pages into {}", count, packed.display());
            Ok(packed)
        });

    if let Err(e) = paths::remove_directory(&directory) {
        eprintln!("  Warning: {}", e);
    }
    result
}
