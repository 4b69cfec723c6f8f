//! Flat `(system, code)` exports.

#[cfg(feature = "csv")]
use std::path::Path;

#[cfg(feature = "csv")]
use tracing::debug;
use url::Url;
#[cfg(feature = "csv")]
use valueset_model::Code;
use valueset_model::CodeSet;

use crate::error::{ExportError, ExportResult};

/// Flattens a set into `(system, code)` rows. Row order is unspecified.
pub fn to_rows(set: &CodeSet) -> Vec<(String, String)> {
    set.iter()
        .map(|code| (code.system.clone(), code.code.clone()))
        .collect()
}

/// Writes a set as a two-column CSV file without a header row.
///
/// Rows are sorted so repeated exports of the same set are byte-identical.
#[cfg(feature = "csv")]
pub fn write_rows_csv(set: &CodeSet, path: impl AsRef<Path>) -> ExportResult<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| ExportError::csv(path, e))?;

    for code in set.to_sorted_vec() {
        writer
            .write_record([code.system.as_str(), code.code.as_str()])
            .map_err(|e| ExportError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ExportError::io_error(path, e))?;

    debug!(path = %path.display(), rows = set.len(), "wrote value set rows");
    Ok(())
}

/// Reads a file written by [`write_rows_csv`] back into a set.
#[cfg(feature = "csv")]
pub fn read_rows_csv(path: impl AsRef<Path>) -> ExportResult<CodeSet> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| ExportError::csv(path, e))?;

    let mut set = CodeSet::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExportError::csv(path, e))?;
        match (record.get(0), record.get(1), record.len()) {
            (Some(system), Some(code), 2) => {
                set.insert(Code::new(system, code));
            }
            _ => {
                return Err(ExportError::Csv {
                    path: path.to_path_buf(),
                    message: format!("expected 2 columns, found {}", record.len()),
                })
            }
        }
    }
    Ok(set)
}

/// Derives an artifact file stem from a value-set URL.
///
/// The host and path are joined and every `.` and `/` becomes `_`:
/// `http://hl7.org/fhir/ValueSet/example` becomes
/// `hl7_org_fhir_ValueSet_example`.
pub fn export_file_stem(url: &str) -> ExportResult<String> {
    let parsed = Url::parse(url).map_err(|e| ExportError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| ExportError::InvalidUrl {
        url: url.to_string(),
        message: "no host".to_string(),
    })?;

    Ok(format!("{host}{}", parsed.path())
        .chars()
        .map(|c| if c == '.' || c == '/' { '_' } else { c })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use valueset_model::Code;

    fn sample() -> CodeSet {
        let mut set = CodeSet::from_codes("http://loinc.org", ["8867-4", "8310-5"]);
        set.insert(Code::new("http://snomed.info/sct", "73211009"));
        set.insert(Code::new("", "no-system"));
        set
    }

    #[test]
    fn test_to_rows() {
        let set = sample();
        let mut rows = to_rows(&set);
        rows.sort();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], ("".to_string(), "no-system".to_string()));
        assert!(rows.contains(&("http://loinc.org".to_string(), "8867-4".to_string())));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let set = sample();

        write_rows_csv(&set, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("http://loinc.org,8310-5"));

        assert_eq!(read_rows_csv(&path).unwrap(), set);
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_csv_quotes_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let set = CodeSet::from_codes("urn:ietf:bcp:13", ["text/plain; charset=a,b"]);

        write_rows_csv(&set, &path).unwrap();
        assert_eq!(read_rows_csv(&path).unwrap(), set);
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_read_wrong_column_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "http://loinc.org,8867-4,extra\n").unwrap();

        assert!(matches!(read_rows_csv(&path), Err(ExportError::Csv { .. })));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_read_missing_file() {
        let result = read_rows_csv("/nonexistent/rows.csv");
        assert!(matches!(result, Err(ExportError::Csv { .. })));
    }

    #[test]
    fn test_export_file_stem() {
        assert_eq!(
            export_file_stem("http://hl7.org/fhir/ValueSet/example").unwrap(),
            "hl7_org_fhir_ValueSet_example"
        );
        assert_eq!(
            export_file_stem("http://hl7.org/fhir/us/core/ValueSet/us-core-condition-code")
                .unwrap(),
            "hl7_org_fhir_us_core_ValueSet_us-core-condition-code"
        );
        assert_eq!(
            export_file_stem("https://example.org/vs?version=1.0").unwrap(),
            "example_org_vs"
        );
    }

    #[test]
    fn test_export_file_stem_rejects_non_urls() {
        assert!(matches!(
            export_file_stem("not a url"),
            Err(ExportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            export_file_stem("urn:oid:2.16.840.1"),
            Err(ExportError::InvalidUrl { .. })
        ));
    }
}
