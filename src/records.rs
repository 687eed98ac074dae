use std::sync::Arc;

use camino::Utf8Path;
use gb_io::seq::{Feature, Seq};

use crate::domain::{Cluster, Gene, Protein, RecordFormat, SourceRecord, Strand, canonical_id};
use crate::error::CompositionError;

const GENE_ID_QUALIFIERS: [&str; 3] = ["locus_tag", "protein_id", "gene"];

impl RecordFormat {
    /// Canonical cluster identifier for a raw record name.
    ///
    /// antiSMASH archives include MIBiG entries whose names carry a version
    /// suffix (`BGC0000001.1`); GECCO cluster names pass through unchanged.
    /// Both go through [`canonical_id`] so ingestion and regrouping agree.
    pub fn cluster_id(self, name: &str) -> &str {
        canonical_id(name)
    }

    /// Normalizes a record named `name`, keyed by its canonical identifier.
    pub fn to_cluster(
        self,
        record: &Seq,
        name: &str,
        archive: &Utf8Path,
    ) -> Result<Cluster, CompositionError> {
        let source = Arc::new(SourceRecord {
            name: name.to_string(),
            format: self,
            archive: archive.to_path_buf(),
        });

        let genes = record
            .features
            .iter()
            .filter(|feature| &*feature.kind == "CDS")
            .map(|feature| cds_to_gene(feature, &source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Cluster::new(self.cluster_id(name), genes))
    }
}

fn qualifier<'a>(feature: &'a Feature, key: &'a str) -> Option<&'a str> {
    feature.qualifier_values(key.into()).next()
}

fn cds_to_gene(feature: &Feature, source: &Arc<SourceRecord>) -> Result<Gene, CompositionError> {
    let id = GENE_ID_QUALIFIERS
        .iter()
        .find_map(|key| qualifier(feature, key))
        .ok_or_else(|| CompositionError::MissingGeneIdentifier {
            record: source.name.clone(),
            feature: format!("{} {:?}", feature.kind, feature.location),
        })?
        .to_string();

    let sequence = qualifier(feature, "translation")
        .map(|translation| {
            translation
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect::<String>()
        })
        .ok_or_else(|| CompositionError::MissingTranslation {
            record: source.name.clone(),
            gene: id.clone(),
        })?;

    let (start, end) = feature
        .location
        .find_bounds()
        .map_err(|err| CompositionError::RecordParse {
            path: source.archive.to_string(),
            message: format!("invalid location for {id} in {}: {err:?}", source.name),
        })?;

    Ok(Gene {
        protein: Protein::new(id.clone(), sequence),
        id,
        source: Arc::clone(source),
        start,
        end,
        strand: Strand::Coding,
    })
}
