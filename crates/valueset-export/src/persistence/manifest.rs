//! Manifest file for a directory of exported value sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{ExportError, ExportResult};

/// Manifest file for a directory of exported value sets.
///
/// Tracks which value sets were exported, when, and the artifacts written
/// for each one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    /// Timestamp when the manifest was created.
    pub created_at: DateTime<Utc>,
    /// Version of the exporting tool.
    pub exporter_version: String,
    /// Per-value-set entries.
    pub value_sets: Vec<ExportEntry>,
}

/// Entry for a single exported value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Canonical URL of the value set.
    pub url: String,
    /// Number of codes in the resolved set.
    pub code_count: u64,
    /// Distinct code systems in the resolved set.
    pub systems: Vec<String>,
    /// Membership file name (relative to the manifest).
    pub membership_filename: String,
    /// Serialized filter size in bytes.
    pub membership_size_bytes: u64,
    /// CSV file name (relative to the manifest).
    pub rows_filename: String,
    /// Hex SHA-256 of the membership payload.
    pub checksum: String,
    /// Timestamp of the export.
    pub exported_at: DateTime<Utc>,
}

impl ExportManifest {
    /// Creates a new empty manifest.
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            exporter_version: env!("CARGO_PKG_VERSION").to_string(),
            value_sets: Vec::new(),
        }
    }

    /// Adds an entry, replacing any earlier entry for the same URL.
    pub fn add_entry(&mut self, entry: ExportEntry) {
        self.value_sets.retain(|e| e.url != entry.url);
        self.value_sets.push(entry);
    }

    /// Returns the number of value sets in the manifest.
    pub fn count(&self) -> usize {
        self.value_sets.len()
    }

    /// Returns the total number of codes across all value sets.
    pub fn total_codes(&self) -> u64 {
        self.value_sets.iter().map(|e| e.code_count).sum()
    }

    /// Returns the total size of all membership payloads.
    pub fn total_size_bytes(&self) -> u64 {
        self.value_sets.iter().map(|e| e.membership_size_bytes).sum()
    }

    /// Finds an entry by value-set URL.
    pub fn get_entry(&self, url: &str) -> Option<&ExportEntry> {
        self.value_sets.iter().find(|e| e.url == url)
    }

    /// Saves the manifest to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ExportError::io_error(path, e))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ExportError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Loads a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ExportError::io_error(path, e))?;
        let reader = BufReader::new(file);
        let manifest: Self = serde_json::from_reader(reader)
            .map_err(|e| ExportError::DeserializationError(e.to_string()))?;
        Ok(manifest)
    }
}

impl Default for ExportManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExportManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Export Manifest")?;
        writeln!(f, "  Created:         {}", self.created_at)?;
        writeln!(f, "  Exporter:        {}", self.exporter_version)?;
        writeln!(f, "  Value Sets:      {}", self.count())?;
        writeln!(f, "  Total Codes:     {}", self.total_codes())?;
        writeln!(
            f,
            "  Filter Size:     {} KB",
            self.total_size_bytes() / 1024
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(url: &str, code_count: u64) -> ExportEntry {
        ExportEntry {
            url: url.to_string(),
            code_count,
            systems: vec!["http://loinc.org".to_string()],
            membership_filename: "vs.msf".to_string(),
            membership_size_bytes: 2048,
            rows_filename: "vs.csv".to_string(),
            checksum: "00".repeat(32),
            exported_at: Utc::now(),
        }
    }

    #[test]
    fn test_manifest_creation() {
        let manifest = ExportManifest::new();
        assert_eq!(manifest.count(), 0);
        assert_eq!(manifest.exporter_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_add_entry_replaces_same_url() {
        let mut manifest = ExportManifest::new();
        manifest.add_entry(entry("http://example.org/vs/a", 10));
        manifest.add_entry(entry("http://example.org/vs/b", 5));
        manifest.add_entry(entry("http://example.org/vs/a", 12));

        assert_eq!(manifest.count(), 2);
        assert_eq!(manifest.total_codes(), 17);
        assert_eq!(manifest.total_size_bytes(), 4096);
        assert_eq!(manifest.get_entry("http://example.org/vs/a").unwrap().code_count, 12);
        assert!(manifest.get_entry("http://example.org/vs/c").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let mut manifest = ExportManifest::new();
        manifest.add_entry(entry("http://example.org/vs/a", 10));

        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        manifest.save(&path).unwrap();
        let loaded = ExportManifest::load(&path).unwrap();

        assert_eq!(loaded.count(), 1);
        assert_eq!(loaded.value_sets[0], manifest.value_sets[0]);
        assert_eq!(loaded.created_at, manifest.created_at);
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ExportManifest::load(&path),
            Err(ExportError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_display() {
        let mut manifest = ExportManifest::new();
        manifest.add_entry(entry("http://example.org/vs/a", 10));
        let text = manifest.to_string();
        assert!(text.contains("Value Sets:      1"));
        assert!(text.contains("Total Codes:     10"));
    }
}
