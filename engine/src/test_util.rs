//! Archive fixtures shared by the engine's unit tests.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Write a zip at `path`. Names ending in `/` become directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("Failed to create zip");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).expect("Failed to add directory");
        } else {
            zip.start_file(*name, options).expect("Failed to start file");
            zip.write_all(content).expect("Failed to write entry");
        }
    }
    zip.finish().expect("Failed to finish zip");
}

/// Entry names of the zip at `path`, in archive order.
pub fn entry_names(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).expect("Failed to open zip");
    let zip = ZipArchive::new(file).expect("Failed to read zip");
    (0..zip.len())
        .map(|i| zip.name_for_index(i).expect("Missing entry name").to_string())
        .collect()
}

/// Content of one entry of the zip at `path`.
pub fn entry_content(path: &Path, name: &str) -> Vec<u8> {
    let file = fs::File::open(path).expect("Failed to open zip");
    let mut zip = ZipArchive::new(file).expect("Failed to read zip");
    let mut entry = zip.by_name(name).expect("Missing entry");
    let mut content = Vec::new();
    entry.read_to_end(&mut content).expect("Failed to read entry");
    content
}
