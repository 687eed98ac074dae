use std::fmt;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Normalizes a raw cluster identifier.
///
/// Identifiers starting with `BGC` (MIBiG accessions, or file names derived
/// from them) are cut at the first `.`, so `BGC0000001.1` and
/// `BGC0000001.gbk` both become `BGC0000001`. Everything else is returned
/// verbatim. The result never contains a `.` for `BGC` identifiers, which
/// keeps the function idempotent.
///
/// Multi-dot names lose every suffix: `BGC0000001.1.region001` becomes
/// `BGC0000001`, where a cut at the last `.` would give `BGC0000001.1`.
pub fn canonical_id(raw: &str) -> &str {
    if !raw.starts_with("BGC") {
        return raw;
    }
    match raw.split_once('.') {
        Some((head, _)) => head,
        None => raw,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    Antismash,
    Gecco,
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::Antismash => write!(f, "antismash"),
            RecordFormat::Gecco => write!(f, "gecco"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Coding,
    Reverse,
}

/// The record a gene was extracted from. Shared between all genes of one
/// record; the parsed record itself is dropped after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRecord {
    pub name: String,
    pub format: RecordFormat,
    pub archive: Utf8PathBuf,
}

impl SourceRecord {
    pub fn cluster_id(&self) -> &str {
        canonical_id(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub start: i64,
    pub end: i64,
    pub library: String,
    pub pvalue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Protein {
    pub id: String,
    pub sequence: String,
    pub domains: Vec<Domain>,
}

impl Protein {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            domains: Vec::new(),
        }
    }

    pub fn with_domains(&self, domains: Vec<Domain>) -> Self {
        Self {
            id: self.id.clone(),
            sequence: self.sequence.clone(),
            domains,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub id: String,
    pub source: Arc<SourceRecord>,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
    pub protein: Protein,
}

impl Gene {
    pub fn with_protein(self, protein: Protein) -> Self {
        Self { protein, ..self }
    }

    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.protein.domains.iter().map(|domain| domain.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub genes: Vec<Gene>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, genes: Vec<Gene>) -> Self {
        Self {
            id: id.into(),
            genes,
        }
    }

    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.genes.iter().flat_map(Gene::domain_names)
    }
}
