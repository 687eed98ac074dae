use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::RecordFormat;
use crate::error::CompositionError;

pub const DEFAULT_CONFIG_FILE: &str = "bgc-comp.json";
pub const DEFAULT_CPUS: usize = 32;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub sources: Option<SourcesEntry>,
    #[serde(default)]
    pub cpus: Option<usize>,
    #[serde(default)]
    pub hmmsearch: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SourcesEntry {
    #[serde(default)]
    pub antismash: Option<Vec<Utf8PathBuf>>,
    #[serde(default)]
    pub gecco: Option<Vec<Utf8PathBuf>>,
}

/// Record archives grouped by format family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    pub antismash: Vec<Utf8PathBuf>,
    pub gecco: Vec<Utf8PathBuf>,
}

impl SourceSet {
    /// Families in reading order: antiSMASH regions first, then GECCO clusters.
    pub fn families(&self) -> [(RecordFormat, &[Utf8PathBuf]); 2] {
        [
            (RecordFormat::Antismash, self.antismash.as_slice()),
            (RecordFormat::Gecco, self.gecco.as_slice()),
        ]
    }

    pub fn len(&self) -> usize {
        self.antismash.len() + self.gecco.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            antismash: default_antismash_sources(),
            gecco: default_gecco_sources(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub sources: SourceSet,
    pub cpus: usize,
    pub hmmsearch: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `bgc-comp.json` from the current directory when it
    /// exists, falling back to the built-in defaults otherwise.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CompositionError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CompositionError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CompositionError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CompositionError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(CompositionError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let sources = config.sources.unwrap_or_default();
        let sources = SourceSet {
            antismash: sources.antismash.unwrap_or_else(default_antismash_sources),
            gecco: sources.gecco.unwrap_or_else(default_gecco_sources),
        };

        let cpus = config.cpus.unwrap_or(DEFAULT_CPUS);
        if cpus == 0 {
            return Err(CompositionError::ConfigParse(
                "cpus must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            sources,
            cpus,
            hmmsearch: config.hmmsearch,
        })
    }
}

pub fn default_antismash_sources() -> Vec<Utf8PathBuf> {
    vec![
        Utf8PathBuf::from("mibig2.gbk"),
        Utf8PathBuf::from(
            "/g/scb2/zeller/SHARED/DATA/bgc_predictions/antismash-v5.1.2/progenomes2-gut-motus3/regions.relabeled.gbk",
        ),
        Utf8PathBuf::from(
            "/g/scb2/zeller/SHARED/DATA/bgc_predictions/antismash-v5.1.2/Almeida_2020_combined_set/regions.relabeled.gbk",
        ),
    ]
}

pub fn default_gecco_sources() -> Vec<Utf8PathBuf> {
    vec![
        Utf8PathBuf::from(
            "/g/scb2/zeller/SHARED/DATA/bgc_predictions/gecco-v0.9.2/progenomes2-gut-motus3/clusters.gbk",
        ),
        Utf8PathBuf::from(
            "/g/scb2/zeller/SHARED/DATA/bgc_predictions/gecco-v0.9.2/Almeida_2020_combined_set/clusters.gbk",
        ),
    ]
}
