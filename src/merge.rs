use std::collections::HashSet;

use camino::Utf8Path;
use gb_io::seq::Seq;
use tracing::{debug, warn};

use crate::config::SourceSet;
use crate::domain::{Cluster, RecordFormat};
use crate::error::CompositionError;
use crate::progress::{ProgressSink, ProgressUnit, Task, phase};
use crate::reader::{archive_size, open_archive};

/// Normalizes every record of `records` whose canonical identifier is a
/// representative. Records are pulled one at a time.
pub fn extract_clusters<I>(
    records: I,
    format: RecordFormat,
    archive: &Utf8Path,
    representatives: &HashSet<String>,
) -> Result<Vec<Cluster>, CompositionError>
where
    I: IntoIterator<Item = Result<Seq, CompositionError>>,
{
    let mut clusters = Vec::new();
    let mut seen = 0usize;
    for record in records {
        let record = record?;
        seen += 1;
        let Some(name) = record.name.as_deref() else {
            warn!(archive = %archive, "skipping record without a name");
            continue;
        };
        if representatives.contains(format.cluster_id(name)) {
            clusters.push(format.to_cluster(&record, name, archive)?);
        }
    }
    debug!(
        archive = %archive,
        %format,
        records = seen,
        kept = clusters.len(),
        "extracted representatives"
    );
    Ok(clusters)
}

/// Streams one archive from disk and extracts its representative clusters.
pub fn extract_archive(
    path: &Utf8Path,
    format: RecordFormat,
    representatives: &HashSet<String>,
    sink: &dyn ProgressSink,
) -> Result<Vec<Cluster>, CompositionError> {
    phase(sink, "Extracting", format!("representatives from {path:?}"));
    let size = archive_size(path)?;
    let task = Task::start(sink, "Reading", ProgressUnit::Bytes, Some(size));
    let clusters = {
        let records = open_archive(path, &task)?;
        extract_clusters(records, format, path, representatives)?
    };
    task.finish();
    Ok(clusters)
}

/// Reads every archive of every format family, in configuration order.
pub fn merge_sources(
    sources: &SourceSet,
    representatives: &HashSet<String>,
    sink: &dyn ProgressSink,
) -> Result<Vec<Cluster>, CompositionError> {
    let mut clusters = Vec::new();
    for (format, archives) in sources.families() {
        for archive in archives {
            clusters.extend(extract_archive(archive, format, representatives, sink)?);
        }
    }
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RecordStream;

    fn record(name: &str, locus_tag: &str) -> String {
        format!(
            "LOCUS       {name:<24} 30 bp    DNA     linear   UNK 01-JAN-1980\n\
             FEATURES             Location/Qualifiers\n\
             \x20    CDS             1..30\n\
             \x20                    /locus_tag=\"{locus_tag}\"\n\
             \x20                    /translation=\"MKV\"\n\
             ORIGIN\n\
             \x20       1 atgaaagtta aaaaaaaaaa aaaaaaaaaa\n\
             //\n"
        )
    }

    #[test]
    fn keeps_only_representatives() {
        let text = [
            record("BGC0000001.1", "a1"),
            record("BGC0000002.1", "b1"),
            record("A.1", "c1"),
        ]
        .concat();
        let representatives: HashSet<String> =
            ["BGC0000001", "A.1", "Z.9"].into_iter().map(String::from).collect();

        let clusters = extract_clusters(
            RecordStream::from_reader(text.as_bytes(), "regions.gbk"),
            RecordFormat::Antismash,
            Utf8Path::new("regions.gbk"),
            &representatives,
        )
        .unwrap();

        let ids: Vec<_> = clusters.iter().map(|cluster| cluster.id.as_str()).collect();
        assert_eq!(ids, vec!["BGC0000001", "A.1"]);
        assert_eq!(clusters[0].genes[0].source.name, "BGC0000001.1");
    }

    #[test]
    fn empty_representative_set_keeps_nothing() {
        let text = record("A.1", "c1");
        let clusters = extract_clusters(
            RecordStream::from_reader(text.as_bytes(), "clusters.gbk"),
            RecordFormat::Gecco,
            Utf8Path::new("clusters.gbk"),
            &HashSet::new(),
        )
        .unwrap();
        assert!(clusters.is_empty());
    }
}
