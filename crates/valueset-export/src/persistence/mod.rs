//! Save/load membership filters to/from disk.
//!
//! Membership files let a validator check codes against a value set without
//! the concept database. They are written once after resolution and loaded
//! on every subsequent run.
//!
//! # File Format
//!
//! The membership file format (`.msf`) is a binary format:
//!
//! ```text
//! [4 bytes]  Magic: "VSMF"
//! [4 bytes]  Version (u32 LE)
//! [4 bytes]  Value set URL length (u32 LE)
//! [var]      Value set URL (UTF-8)
//! [8 bytes]  Element count (u64 LE)
//! [32 bytes] SHA-256 hash of the payload
//! [8 bytes]  Payload length (u64 LE)
//! [var]      Serialized membership filter
//! ```
//!
//! # Example
//!
//! ```ignore
//! use valueset_export::{build_membership_filter, MembershipFile};
//!
//! let filter = build_membership_filter(&codes);
//! MembershipFile::new(url, &filter)?.save("hl7_org_fhir_ValueSet_example.msf")?;
//!
//! let (meta, filter) = MembershipFile::load("hl7_org_fhir_ValueSet_example.msf")?;
//! ```

mod manifest;

pub use manifest::{ExportEntry, ExportManifest};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use valueset_model::CodeSet;

use crate::error::{ExportError, ExportResult};
use crate::membership::{build_membership_filter, MembershipFilter};
use crate::rows::{export_file_stem, write_rows_csv};

/// Magic bytes for membership files.
const MEMBERSHIP_MAGIC: &[u8; 4] = b"VSMF";

/// Current membership file format version.
const MEMBERSHIP_VERSION: u32 = 1;

/// File extension for membership files.
pub const MEMBERSHIP_EXTENSION: &str = "msf";

/// File extension for flat row exports.
pub const ROWS_EXTENSION: &str = "csv";

/// A serialized membership filter with metadata.
#[derive(Debug)]
pub struct MembershipFile {
    /// Canonical URL of the exported value set.
    pub value_set_url: String,
    /// Number of codes in the filter.
    pub element_count: u64,
    /// SHA-256 hash of the payload.
    pub checksum: [u8; 32],
    /// Serialized filter.
    payload: Vec<u8>,
}

impl MembershipFile {
    /// Creates a membership file from a filter.
    pub fn new(value_set_url: &str, filter: &MembershipFilter) -> ExportResult<Self> {
        let payload = filter.serialize()?;
        Ok(Self {
            value_set_url: value_set_url.to_string(),
            element_count: filter.len(),
            checksum: Self::hash_payload(&payload),
            payload,
        })
    }

    fn hash_payload(payload: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.finalize().into()
    }

    /// Size of the serialized filter in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Saves the membership file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ExportError::io_error(path, e))?;
        let mut writer = BufWriter::new(file);
        let url_bytes = self.value_set_url.as_bytes();

        let sections: [&[u8]; 8] = [
            MEMBERSHIP_MAGIC,
            &MEMBERSHIP_VERSION.to_le_bytes(),
            &(url_bytes.len() as u32).to_le_bytes(),
            url_bytes,
            &self.element_count.to_le_bytes(),
            &self.checksum,
            &(self.payload.len() as u64).to_le_bytes(),
            &self.payload,
        ];
        for section in sections {
            writer
                .write_all(section)
                .map_err(|e| ExportError::io_error(path, e))?;
        }
        writer.flush().map_err(|e| ExportError::io_error(path, e))?;

        debug!(path = %path.display(), bytes = self.payload.len(), "saved membership file");
        Ok(())
    }

    /// Loads a membership file and deserializes its filter.
    ///
    /// Fails with [`ExportError::HashMismatch`] if the payload does not match
    /// the recorded checksum.
    pub fn load<P: AsRef<Path>>(path: P) -> ExportResult<(Self, MembershipFilter)> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ExportError::io_error(path, e))?;
        let mut reader = BufReader::new(file);

        let magic: [u8; 4] = read_array(&mut reader, path)?;
        if &magic != MEMBERSHIP_MAGIC {
            return Err(ExportError::invalid_format("Invalid magic bytes"));
        }

        let version = u32::from_le_bytes(read_array(&mut reader, path)?);
        if version != MEMBERSHIP_VERSION {
            return Err(ExportError::invalid_format(format!(
                "Unsupported version: {} (expected {})",
                version, MEMBERSHIP_VERSION
            )));
        }

        let url_len = u32::from_le_bytes(read_array(&mut reader, path)?) as usize;
        let url_bytes = read_vec(&mut reader, path, url_len)?;
        let value_set_url = String::from_utf8(url_bytes)
            .map_err(|_| ExportError::invalid_format("Value set URL is not UTF-8"))?;

        let element_count = u64::from_le_bytes(read_array(&mut reader, path)?);
        let checksum: [u8; 32] = read_array(&mut reader, path)?;

        let payload_len = u64::from_le_bytes(read_array(&mut reader, path)?);
        let payload_len = usize::try_from(payload_len)
            .map_err(|_| ExportError::invalid_format("Payload length overflows"))?;
        let payload = read_vec(&mut reader, path, payload_len)?;

        let computed = Self::hash_payload(&payload);
        if computed != checksum {
            return Err(ExportError::HashMismatch {
                expected: hex::encode(&checksum),
                actual: hex::encode(&computed),
            });
        }

        let filter = MembershipFilter::deserialize(&payload)?;
        if filter.len() != element_count {
            return Err(ExportError::invalid_format(format!(
                "Element count mismatch: expected {}, got {}",
                element_count,
                filter.len()
            )));
        }

        let metadata = Self {
            value_set_url,
            element_count,
            checksum,
            payload,
        };
        Ok((metadata, filter))
    }

    /// Returns the payload checksum as a hex string.
    pub fn checksum_hex(&self) -> String {
        hex::encode(&self.checksum)
    }
}

fn read_array<const N: usize>(reader: &mut impl Read, path: &Path) -> ExportResult<[u8; N]> {
    let mut buf = [0u8; N];
    reader
        .read_exact(&mut buf)
        .map_err(|e| ExportError::io_error(path, e))?;
    Ok(buf)
}

fn read_vec(reader: &mut impl Read, path: &Path, len: usize) -> ExportResult<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| ExportError::io_error(path, e))?;
    if buf.len() != len {
        return Err(ExportError::invalid_format(format!(
            "Truncated file: expected {} bytes, found {}",
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

/// Writes the membership file and CSV rows for one value set into `dir` and
/// records them in `manifest`.
///
/// Both files are named after [`export_file_stem`] of `url`. Returns the
/// manifest entry that was added.
pub fn export_value_set(
    url: &str,
    set: &CodeSet,
    dir: impl AsRef<Path>,
    manifest: &mut ExportManifest,
) -> ExportResult<ExportEntry> {
    let dir = dir.as_ref();
    let stem = export_file_stem(url)?;

    let filter = build_membership_filter(set);
    let membership_filename = format!("{stem}.{MEMBERSHIP_EXTENSION}");
    let membership = MembershipFile::new(url, &filter)?;
    membership.save(dir.join(&membership_filename))?;

    let rows_filename = format!("{stem}.{ROWS_EXTENSION}");
    write_rows_csv(set, dir.join(&rows_filename))?;

    let entry = ExportEntry {
        url: url.to_string(),
        code_count: set.len() as u64,
        systems: set.systems().into_iter().map(str::to_string).collect(),
        membership_filename,
        membership_size_bytes: membership.payload_size() as u64,
        rows_filename,
        checksum: membership.checksum_hex(),
        exported_at: chrono::Utc::now(),
    };
    manifest.add_entry(entry.clone());

    info!(url, codes = set.len(), dir = %dir.display(), "exported value set");
    Ok(entry)
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use valueset_model::Code;

    const URL: &str = "http://hl7.org/fhir/ValueSet/observation-category";

    fn categories() -> CodeSet {
        CodeSet::from_codes(
            "http://terminology.hl7.org/CodeSystem/observation-category",
            ["social-history", "vital-signs", "imaging", "laboratory"],
        )
    }

    #[test]
    fn test_save_and_load() {
        let set = categories();
        let filter = build_membership_filter(&set);
        let file = MembershipFile::new(URL, &filter).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.msf");
        file.save(&path).unwrap();

        let (meta, loaded) = MembershipFile::load(&path).unwrap();
        assert_eq!(meta.value_set_url, URL);
        assert_eq!(meta.element_count, 4);
        assert_eq!(meta.checksum_hex(), file.checksum_hex());
        assert_eq!(meta.checksum_hex().len(), 64);
        assert!(set.iter().all(|code| loaded.might_contain(code)));
    }

    #[test]
    fn test_invalid_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.msf");
        std::fs::write(&path, b"BAAD\x01\x00\x00\x00").unwrap();

        let result = MembershipFile::load(&path);
        assert!(matches!(result, Err(ExportError::InvalidFormat { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.msf");
        std::fs::write(&path, b"VSMF\x09\x00\x00\x00").unwrap();

        let result = MembershipFile::load(&path);
        assert!(matches!(result, Err(ExportError::InvalidFormat { .. })));
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let filter = build_membership_filter(&categories());
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.msf");
        MembershipFile::new(URL, &filter).unwrap().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let result = MembershipFile::load(&path);
        assert!(matches!(result, Err(ExportError::HashMismatch { .. })));
    }

    #[test]
    fn test_truncated_file() {
        let filter = build_membership_filter(&categories());
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.msf");
        MembershipFile::new(URL, &filter).unwrap().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let result = MembershipFile::load(&path);
        assert!(matches!(result, Err(ExportError::InvalidFormat { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = MembershipFile::load("/nonexistent/dir/vs.msf");
        assert!(matches!(result, Err(ExportError::IoError { .. })));
    }

    #[test]
    fn test_export_value_set_writes_both_artifacts() {
        let dir = tempdir().unwrap();
        let mut manifest = ExportManifest::new();
        let mut set = categories();
        set.insert(Code::new("http://loinc.org", "8867-4"));

        let entry = export_value_set(URL, &set, dir.path(), &mut manifest).unwrap();

        assert_eq!(entry.membership_filename, "hl7_org_fhir_ValueSet_observation-category.msf");
        assert_eq!(entry.rows_filename, "hl7_org_fhir_ValueSet_observation-category.csv");
        assert_eq!(entry.code_count, 5);
        assert_eq!(entry.systems.len(), 2);
        assert_eq!(manifest.count(), 1);

        let (_, filter) = MembershipFile::load(dir.path().join(&entry.membership_filename)).unwrap();
        assert!(filter.might_contain_code("http://loinc.org", "8867-4"));

        let rows = crate::rows::read_rows_csv(dir.path().join(&entry.rows_filename)).unwrap();
        assert_eq!(rows, set);
    }

    #[test]
    fn test_export_empty_value_set() {
        let dir = tempdir().unwrap();
        let mut manifest = ExportManifest::new();

        let entry = export_value_set(URL, &CodeSet::new(), dir.path(), &mut manifest).unwrap();
        assert_eq!(entry.code_count, 0);

        let (meta, filter) = MembershipFile::load(dir.path().join(&entry.membership_filename)).unwrap();
        assert_eq!(meta.element_count, 0);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_export_rejects_urn() {
        let dir = tempdir().unwrap();
        let mut manifest = ExportManifest::new();
        let result = export_value_set("urn:oid:1.2.3", &categories(), dir.path(), &mut manifest);

        assert!(matches!(result, Err(ExportError::InvalidUrl { .. })));
        assert_eq!(manifest.count(), 0);
    }
}
