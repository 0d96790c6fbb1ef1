//! Bundle fixtures for unit tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A minimal JAR whose manifest declares `bsn` at `version`.
pub fn bundle_bytes(bsn: &str, version: &str) -> Vec<u8> {
    build(bsn, version, &[])
}

/// Same identity as [`bundle_bytes`] with one extra entry, so the bytes differ.
pub fn bundle_with_entry(bsn: &str, version: &str, name: &str, data: &[u8]) -> Vec<u8> {
    build(bsn, version, &[(name, data)])
}

fn build(bsn: &str, version: &str, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let manifest = format!(
        "Manifest-Version: 1.0\r\nBundle-ManifestVersion: 2\r\nBundle-SymbolicName: {bsn}\r\nBundle-Version: {version}\r\nBundle-Name: {bsn} bundle\r\n\r\n"
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
