use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::CompositionError;

pub const REPRESENTATIVE_COLUMN: &str = "gcf_representative";
pub const GROUP_COLUMN: &str = "gcf_id";

/// Mapping from representative cluster identifier to its gene cluster family.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    groups: HashMap<String, String>,
}

impl LabelTable {
    pub fn from_path(path: &Path) -> Result<Self, CompositionError> {
        let file = std::fs::File::open(path)
            .map_err(|_| CompositionError::LabelTableRead(path.to_path_buf()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CompositionError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|err| CompositionError::LabelTableParse(err.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| CompositionError::MissingColumn(name.to_string()))
        };
        let representative = column(REPRESENTATIVE_COLUMN)?;
        let group = column(GROUP_COLUMN)?;

        let mut groups = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|err| CompositionError::LabelTableParse(err.to_string()))?;
            let (Some(id), Some(gcf)) = (record.get(representative), record.get(group)) else {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                return Err(CompositionError::LabelTableParse(format!(
                    "line {line} has fewer columns than the header"
                )));
            };
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            groups.insert(id.to_string(), gcf.trim().to_string());
        }

        Ok(Self { groups })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            groups: pairs
                .into_iter()
                .map(|(id, gcf)| (id.into(), gcf.into()))
                .collect(),
        }
    }

    pub fn representatives(&self) -> HashSet<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn group_of(&self, cluster_id: &str) -> Option<&str> {
        self.groups.get(cluster_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Sort key for family identifiers: integers order numerically and come
/// first, anything else orders lexicographically after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey<'a> {
    Numeric(i64, &'a str),
    Text(&'a str),
}

impl<'a> GroupKey<'a> {
    pub fn new(group: &'a str) -> Self {
        match group.parse::<i64>() {
            Ok(value) => GroupKey::Numeric(value, group),
            Err(_) => GroupKey::Text(group),
        }
    }
}

pub fn compare_groups(a: &str, b: &str) -> Ordering {
    GroupKey::new(a).cmp(&GroupKey::new(b))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_table_and_skips_comments() {
        let table = "# generated by bigslice\n\
                     gcf_id\tgcf_representative\tmembers\n\
                     12\tBGC0000001\t4\n\
                     # trailing comment\n\
                     7\tA.1\t1\n";
        let labels = LabelTable::from_reader(table.as_bytes()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.group_of("BGC0000001"), Some("12"));
        assert_eq!(labels.group_of("A.1"), Some("7"));
        assert_eq!(labels.group_of("B.2"), None);
        assert!(labels.representatives().contains("A.1"));
    }

    #[test]
    fn missing_column_is_reported() {
        let table = "gcf_id\tmembers\n1\t2\n";
        let err = LabelTable::from_reader(table.as_bytes()).unwrap_err();
        assert_matches!(err, CompositionError::MissingColumn(column) if column == GROUP_COLUMN || column == REPRESENTATIVE_COLUMN);
    }

    #[test]
    fn short_rows_are_rejected() {
        let table = "gcf_representative\tgcf_id\nA.1\n";
        let err = LabelTable::from_reader(table.as_bytes()).unwrap_err();
        assert_matches!(err, CompositionError::LabelTableParse(_));
    }

    #[test]
    fn numeric_groups_sort_numerically() {
        let mut groups = vec!["10", "9", "GCF_b", "100", "GCF_a"];
        groups.sort_by(|a, b| compare_groups(a, b));
        assert_eq!(groups, vec!["9", "10", "100", "GCF_a", "GCF_b"]);
    }
}
