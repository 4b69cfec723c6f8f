//! Fixed mappings between FHIR code systems and the concept database.
//!
//! UMLS source abbreviations: <https://www.nlm.nih.gov/research/umls/sourcereleasedocs/index.html>
//!
//! UMLS attribute names: <https://www.nlm.nih.gov/research/umls/knowledge_sources/metathesaurus/release/attribute_names.html>

use std::fmt;

/// Code-system URI to vocabulary abbreviation.
const VOCABULARIES: &[(&str, &str)] = &[
    ("http://www.nlm.nih.gov/research/umls/rxnorm", "RXNORM"),
    ("http://loinc.org", "LNC"),
    ("http://snomed.info/sct", "SNOMEDCT_US"),
    ("http://www.icd10data.com/icd10pcs", "ICD10PCS"),
    ("http://hl7.org/fhir/sid/icd-10-cm", "ICD10CM"),
    ("http://hl7.org/fhir/sid/icd-9-cm", "ICD9CM"),
    ("http://unitsofmeasure.org", "NCI_UCUM"),
    ("http://nucc.org/provider-taxonomy", "NUCCPT"),
    ("http://www.ama-assn.org/go/cpt", "CPT"),
    ("urn:oid:2.16.840.1.113883.6.285", "HCPCS"),
];

/// Filter property to attribute-table attribute name.
const ATTRIBUTES: &[(&str, &str)] = &[
    ("CLASSTYPE", "LCN"),
    ("DOC", "Doc"),
    ("SCALE_TYP", "LOINC_SCALE_TYP"),
];

/// Looks up the vocabulary abbreviation for a code-system URI.
pub fn vocabulary_for(system: &str) -> Option<&'static str> {
    VOCABULARIES
        .iter()
        .find(|(uri, _)| *uri == system)
        .map(|(_, sab)| *sab)
}

/// Looks up the attribute-table name for a filter property.
pub fn attribute_for(property: &str) -> Option<&'static str> {
    ATTRIBUTES
        .iter()
        .find(|(prop, _)| *prop == property)
        .map(|(_, atn)| *atn)
}

/// All mapped code-system URIs.
pub fn mapped_systems() -> impl Iterator<Item = &'static str> {
    VOCABULARIES.iter().map(|(uri, _)| *uri)
}

/// Concept-table columns a filter may compare against.
///
/// Column identifiers cannot be bound as query parameters, so filter
/// properties are only ever turned into SQL through this allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConceptColumn {
    /// Concept unique identifier.
    Cui,
    /// Language of the term.
    Lat,
    /// Term status.
    Ts,
    /// Lexical unique identifier.
    Lui,
    /// String type.
    Stt,
    /// String unique identifier.
    Sui,
    /// Preferred atom flag.
    Ispref,
    /// Atom unique identifier.
    Aui,
    /// Source atom identifier.
    Saui,
    /// Source concept identifier.
    Scui,
    /// Source descriptor identifier.
    Sdui,
    /// Term type in source.
    Tty,
    /// Source code.
    Code,
    /// Term string.
    Str,
    /// Source restriction level.
    Srl,
    /// Suppressible flag.
    Suppress,
    /// Content view flag.
    Cvf,
}

impl ConceptColumn {
    const ALL: [ConceptColumn; 17] = [
        ConceptColumn::Cui,
        ConceptColumn::Lat,
        ConceptColumn::Ts,
        ConceptColumn::Lui,
        ConceptColumn::Stt,
        ConceptColumn::Sui,
        ConceptColumn::Ispref,
        ConceptColumn::Aui,
        ConceptColumn::Saui,
        ConceptColumn::Scui,
        ConceptColumn::Sdui,
        ConceptColumn::Tty,
        ConceptColumn::Code,
        ConceptColumn::Str,
        ConceptColumn::Srl,
        ConceptColumn::Suppress,
        ConceptColumn::Cvf,
    ];

    /// Maps a filter property to a column, ignoring ASCII case.
    pub fn from_property(property: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_sql().eq_ignore_ascii_case(property))
    }

    /// Column identifier as it appears in SQL.
    pub fn as_sql(self) -> &'static str {
        match self {
            ConceptColumn::Cui => "CUI",
            ConceptColumn::Lat => "LAT",
            ConceptColumn::Ts => "TS",
            ConceptColumn::Lui => "LUI",
            ConceptColumn::Stt => "STT",
            ConceptColumn::Sui => "SUI",
            ConceptColumn::Ispref => "ISPREF",
            ConceptColumn::Aui => "AUI",
            ConceptColumn::Saui => "SAUI",
            ConceptColumn::Scui => "SCUI",
            ConceptColumn::Sdui => "SDUI",
            ConceptColumn::Tty => "TTY",
            ConceptColumn::Code => "CODE",
            ConceptColumn::Str => "STR",
            ConceptColumn::Srl => "SRL",
            ConceptColumn::Suppress => "SUPPRESS",
            ConceptColumn::Cvf => "CVF",
        }
    }
}

impl fmt::Display for ConceptColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}
