use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotate::{DomainLibrary, DomainSearch, annotate, check_libraries};
use crate::config::SourceSet;
use crate::error::CompositionError;
use crate::labels::LabelTable;
use crate::matrix::{CompositionMatrix, CompositionMode, missing_representatives};
use crate::merge::merge_sources;
use crate::progress::{ProgressSink, phase};
use crate::regroup::{PVALUE_THRESHOLD, filter_domains, flatten, regroup};
use crate::store::{ArtifactStore, Artifacts};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Tab-separated label table with representative and family columns.
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    /// Libraries in application order.
    pub libraries: Vec<DomainLibrary>,
    pub sources: SourceSet,
    pub composition: CompositionMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub clusters: usize,
    pub domains: usize,
    pub missing: usize,
    pub composition: CompositionMode,
    pub artifacts: Artifacts,
}

pub struct App<S: DomainSearch> {
    engine: S,
}

impl<S: DomainSearch> App<S> {
    pub fn new(engine: S) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &S {
        &self.engine
    }

    pub fn run(
        &self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, CompositionError> {
        check_libraries(&options.libraries)?;

        phase(sink, "Loading", format!("label table from {:?}", options.input));
        let labels = LabelTable::from_path(options.input.as_std_path())?;
        let representatives = labels.representatives();
        info!(representatives = representatives.len(), "label table loaded");

        let clusters = merge_sources(&options.sources, &representatives, sink)?;
        let genes = flatten(clusters);

        phase(
            sink,
            "Annotating",
            format!(
                "{} proteins with {} libraries",
                genes.len(),
                options.libraries.len()
            ),
        );
        let genes = annotate(genes, &options.libraries, &self.engine, sink)?;
        let genes = filter_domains(genes, PVALUE_THRESHOLD);
        let clusters = regroup(genes);

        phase(
            sink,
            "Building",
            format!("{} compositions of {} clusters", options.composition, clusters.len()),
        );
        let matrix = CompositionMatrix::build(clusters, &labels, options.composition)?;

        phase(sink, "Writing", format!("artifacts to {:?}", options.output));
        let artifacts = ArtifactStore::new(options.output.clone()).write_all(&matrix)?;

        let missing = missing_representatives(&representatives, matrix.cluster_ids());
        if !missing.is_empty() {
            warn!("Missing compositions for {} BGCs", missing.len());
            debug!(ids = ?missing, "representatives without composition");
        }

        Ok(RunSummary {
            clusters: matrix.labels.len(),
            domains: matrix.vocabulary.len(),
            missing: missing.len(),
            composition: matrix.mode,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;

    use super::*;
    use crate::annotate::DomainHit;
    use crate::domain::Protein;
    use crate::progress::{ProgressEvent, Task};

    struct NoopSink;

    impl ProgressSink for NoopSink {
        fn event(&self, _event: ProgressEvent) {}
    }

    struct NoHits;

    impl DomainSearch for NoHits {
        fn search(
            &self,
            _library: &DomainLibrary,
            _proteins: &[&Protein],
            _progress: &Task<'_>,
        ) -> Result<Vec<DomainHit>, CompositionError> {
            Ok(Vec::new())
        }
    }

    fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn no_archives_reports_every_representative_missing() {
        let (_temp, root) = workspace();
        let input = root.join("labels.tsv");
        fs::write(&input, "gcf_representative\tgcf_id\nA.1\t1\nBGC0000001\t2\n").unwrap();
        let options = RunOptions {
            input,
            output: root.join("out"),
            libraries: Vec::new(),
            sources: SourceSet {
                antismash: Vec::new(),
                gecco: Vec::new(),
            },
            composition: CompositionMode::Counts,
        };

        let summary = App::new(NoHits).run(&options, &NoopSink).unwrap();

        assert_eq!(summary.clusters, 0);
        assert_eq!(summary.missing, 2);
        assert_eq!(fs::read_to_string(&summary.artifacts.labels).unwrap(), "");
    }

    #[test]
    fn missing_library_fails_before_reading_anything() {
        let (_temp, root) = workspace();
        let library = DomainLibrary::new("Pfam", "35.0", root.join("Pfam.hmm"), 1, None).unwrap();
        let options = RunOptions {
            input: root.join("absent.tsv"),
            output: root.join("out"),
            libraries: vec![library],
            sources: SourceSet::default(),
            composition: CompositionMode::Counts,
        };

        let err = App::new(NoHits).run(&options, &NoopSink).unwrap_err();
        assert_matches!(err, CompositionError::MissingLibrary(_));
        assert!(!root.join("out").exists());
    }
}
