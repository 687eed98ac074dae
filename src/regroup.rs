use crate::domain::{Cluster, Gene};

/// Domains at or above this p-value are discarded before building the matrix.
pub const PVALUE_THRESHOLD: f64 = 1e-5;

/// Keeps, for every gene, only the domains with a p-value strictly below
/// `threshold`, in their original order.
pub fn filter_domains(genes: Vec<Gene>, threshold: f64) -> Vec<Gene> {
    genes
        .into_iter()
        .map(|gene| {
            let kept = gene
                .protein
                .domains
                .iter()
                .filter(|domain| domain.pvalue < threshold)
                .cloned()
                .collect();
            let protein = gene.protein.with_domains(kept);
            gene.with_protein(protein)
        })
        .collect()
}

/// Rebuilds clusters from a flat gene list, keyed by the canonical
/// identifier of each gene's source record. Genes keep their relative order
/// inside a cluster; clusters come out sorted by identifier.
pub fn regroup(genes: Vec<Gene>) -> Vec<Cluster> {
    let mut genes = genes;
    genes.sort_by(|a, b| a.source.cluster_id().cmp(b.source.cluster_id()));

    let mut clusters: Vec<Cluster> = Vec::new();
    for gene in genes {
        match clusters.last_mut() {
            Some(cluster) if cluster.id == gene.source.cluster_id() => cluster.genes.push(gene),
            _ => {
                let id = gene.source.cluster_id().to_string();
                clusters.push(Cluster::new(id, vec![gene]));
            }
        }
    }
    clusters
}

/// Flattens clusters into their genes, preserving order.
pub fn flatten(clusters: Vec<Cluster>) -> Vec<Gene> {
    clusters
        .into_iter()
        .flat_map(|cluster| cluster.genes)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::{Domain, Protein, RecordFormat, SourceRecord, Strand};

    fn source(name: &str) -> Arc<SourceRecord> {
        Arc::new(SourceRecord {
            name: name.to_string(),
            format: RecordFormat::Antismash,
            archive: Utf8PathBuf::from("regions.gbk"),
        })
    }

    fn gene(source: &Arc<SourceRecord>, id: &str, domains: &[(&str, f64)]) -> Gene {
        let domains = domains
            .iter()
            .map(|(name, pvalue)| Domain {
                name: name.to_string(),
                start: 1,
                end: 2,
                library: "Pfam".to_string(),
                pvalue: *pvalue,
            })
            .collect();
        Gene {
            id: id.to_string(),
            source: Arc::clone(source),
            start: 0,
            end: 30,
            strand: Strand::Coding,
            protein: Protein::new(id, "MKV").with_domains(domains),
        }
    }

    #[test]
    fn filter_keeps_strictly_significant_domains_in_order() {
        let src = source("A.1");
        let genes = vec![gene(
            &src,
            "g1",
            &[("PF3", 1e-7), ("PF1", 1e-5), ("PF2", 1e-4), ("PF4", 9.9e-6)],
        )];
        let before: Vec<String> = genes[0].domain_names().map(String::from).collect();

        let filtered = filter_domains(genes, PVALUE_THRESHOLD);
        let after: Vec<&str> = filtered[0].domain_names().collect();

        assert_eq!(after, vec!["PF3", "PF4"]);
        assert!(after.iter().all(|name| before.iter().any(|b| b == name)));
        assert!(filtered[0].protein.domains.iter().all(|d| d.pvalue < PVALUE_THRESHOLD));
    }

    #[test]
    fn regroup_merges_by_canonical_source_id() {
        let mibig = source("BGC0000001.1");
        let other = source("A.1");
        let genes = vec![
            gene(&other, "a1", &[]),
            gene(&mibig, "m1", &[]),
            gene(&other, "a2", &[]),
            gene(&mibig, "m2", &[]),
        ];

        let clusters = regroup(genes);

        let ids: Vec<_> = clusters.iter().map(|cluster| cluster.id.as_str()).collect();
        assert_eq!(ids, vec!["A.1", "BGC0000001"]);
        let members: Vec<Vec<&str>> = clusters
            .iter()
            .map(|cluster| cluster.genes.iter().map(|gene| gene.id.as_str()).collect())
            .collect();
        assert_eq!(members, vec![vec!["a1", "a2"], vec!["m1", "m2"]]);
    }

    #[test]
    fn regroup_round_trips_ingestion_grouping() {
        let first = source("BGC0000002.1");
        let second = source("GUT_cluster_1");
        let original = vec![
            Cluster::new("GUT_cluster_1", vec![gene(&second, "s1", &[]), gene(&second, "s2", &[])]),
            Cluster::new("BGC0000002", vec![gene(&first, "f1", &[])]),
        ];

        let mut regrouped = regroup(flatten(original.clone()));
        regrouped.sort_by(|a, b| a.id.cmp(&b.id));
        let mut expected = original;
        expected.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(regrouped, expected);
    }

    #[test]
    fn regroup_of_nothing_is_empty() {
        assert!(regroup(Vec::new()).is_empty());
    }
}
