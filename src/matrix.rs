use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Cluster;
use crate::error::CompositionError;
use crate::labels::{LabelTable, compare_groups};

/// How a cluster's domain occurrences become matrix values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompositionMode {
    /// Number of occurrences of the domain over all genes of the cluster.
    #[default]
    Counts,
    /// 1 when the domain occurs at least once.
    Presence,
    /// Occurrences divided by the cluster's total number of domains.
    Frequency,
}

impl fmt::Display for CompositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionMode::Counts => write!(f, "counts"),
            CompositionMode::Presence => write!(f, "presence"),
            CompositionMode::Frequency => write!(f, "frequency"),
        }
    }
}

/// Compressed sparse row matrix of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pub rows: usize,
    pub cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f64>,
}

impl CsrMatrix {
    pub fn from_rows(cols: usize, rows: &[BTreeMap<usize, f64>]) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in rows {
            for (&col, &value) in row {
                if value != 0.0 {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }
        Self {
            rows: rows.len(),
            cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Dense copy of row `i`, zeros included.
    pub fn row(&self, i: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.cols];
        for k in self.indptr[i]..self.indptr[i + 1] {
            dense[self.indices[k]] = self.data[k];
        }
        dense
    }
}

/// Labels, vocabulary and composition matrix of one run, aligned row by row
/// and column by column.
#[derive(Debug, Clone)]
pub struct CompositionMatrix {
    /// `(cluster id, group id)` per row.
    pub labels: Vec<(String, String)>,
    pub vocabulary: Vec<String>,
    pub matrix: CsrMatrix,
    pub mode: CompositionMode,
}

impl CompositionMatrix {
    pub fn build(
        clusters: Vec<Cluster>,
        labels: &LabelTable,
        mode: CompositionMode,
    ) -> Result<Self, CompositionError> {
        let mut rows = clusters
            .into_iter()
            .map(|cluster| match labels.group_of(&cluster.id) {
                Some(group) => Ok((group.to_string(), cluster)),
                None => Err(CompositionError::UnlabeledCluster(cluster.id)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by(|(a, _), (b, _)| compare_groups(a, b));

        let vocabulary = vocabulary(rows.iter().map(|(_, cluster)| cluster));
        let columns: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), index))
            .collect();

        let compositions: Vec<BTreeMap<usize, f64>> = rows
            .iter()
            .map(|(_, cluster)| composition(cluster, &columns, mode))
            .collect();
        let matrix = CsrMatrix::from_rows(vocabulary.len(), &compositions);

        Ok(Self {
            labels: rows
                .into_iter()
                .map(|(group, cluster)| (cluster.id, group))
                .collect(),
            vocabulary,
            matrix,
            mode,
        })
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|(id, _)| id.as_str())
    }
}

/// Sorted, distinct domain names over all genes of all clusters.
pub fn vocabulary<'a>(clusters: impl IntoIterator<Item = &'a Cluster>) -> Vec<String> {
    clusters
        .into_iter()
        .flat_map(Cluster::domain_names)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

fn composition(
    cluster: &Cluster,
    columns: &HashMap<&str, usize>,
    mode: CompositionMode,
) -> BTreeMap<usize, f64> {
    let mut counts = BTreeMap::new();
    let mut total = 0.0;
    for name in cluster.domain_names() {
        if let Some(&column) = columns.get(name) {
            *counts.entry(column).or_insert(0.0) += 1.0;
            total += 1.0;
        }
    }
    match mode {
        CompositionMode::Counts => {}
        CompositionMode::Presence => counts.values_mut().for_each(|value| *value = 1.0),
        CompositionMode::Frequency => counts.values_mut().for_each(|value| *value /= total),
    }
    counts
}

/// Representatives with no row in the final matrix.
pub fn missing_representatives<'a>(
    representatives: &HashSet<String>,
    cluster_ids: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    let present: HashSet<&str> = cluster_ids.into_iter().collect();
    representatives
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect()
}
