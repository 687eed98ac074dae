use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CompositionError {
    #[error("CDS feature without locus_tag, protein_id or gene qualifier in record {record}: {feature}")]
    MissingGeneIdentifier { record: String, feature: String },

    #[error("CDS feature {gene} in record {record} has no translation")]
    MissingTranslation { record: String, gene: String },

    #[error("cluster {0} is not listed in the label table")]
    UnlabeledCluster(String),

    #[error("failed to read label table at {0}")]
    LabelTableRead(PathBuf),

    #[error("failed to parse label table: {0}")]
    LabelTableParse(String),

    #[error("label table is missing required column: {0}")]
    MissingColumn(String),

    #[error("failed to parse record from {path}: {message}")]
    RecordParse { path: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid relabel rule: {0}")]
    InvalidRelabel(String),

    #[error("profile library not found: {0}")]
    MissingLibrary(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("domain search failed: {0}")]
    DomainSearch(String),

    #[error("failed to parse domain table: {0}")]
    DomainTableParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
