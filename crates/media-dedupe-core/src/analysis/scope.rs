use crate::model::MediaRecord;
use std::collections::BTreeMap;

/// A slice of the record universe that is grouped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub index: u32,
    /// `None` for the unscoped partition.
    pub key: Option<String>,
    /// Ascending positions into the record slice.
    pub members: Vec<usize>,
}

impl Partition {
    pub fn label(&self) -> &str {
        self.key.as_deref().unwrap_or("<all>")
    }
}

/// Split records by `directory_key` when scoping is on; otherwise one partition.
///
/// Partition indices follow the sorted key order. Records without a key share
/// the first partition.
pub fn partition_records(records: &[MediaRecord], scoped: bool) -> Vec<Partition> {
    if records.is_empty() {
        return Vec::new();
    }
    if !scoped {
        return vec![Partition {
            index: 0,
            key: None,
            members: (0..records.len()).collect(),
        }];
    }

    let mut by_key: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
    for (pos, record) in records.iter().enumerate() {
        by_key
            .entry(record.directory_key.as_deref())
            .or_default()
            .push(pos);
    }

    by_key
        .into_iter()
        .enumerate()
        .map(|(index, (key, members))| Partition {
            index: index as u32,
            key: key.map(str::to_string),
            members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, dir: Option<&str>) -> MediaRecord {
        let record = MediaRecord::new(id, format!("{id}.jpg"));
        match dir {
            Some(d) => record.with_directory(d),
            None => record,
        }
    }

    #[test]
    fn test_unscoped_is_single_partition() {
        let records = vec![rec("a", Some("/x")), rec("b", Some("/y"))];
        let parts = partition_records(&records, false);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].members, vec![0, 1]);
        assert_eq!(parts[0].label(), "<all>");
    }

    #[test]
    fn test_scoped_partitions_sorted_by_key() {
        let records = vec![
            rec("a", Some("/y")),
            rec("b", Some("/x")),
            rec("c", None),
            rec("d", Some("/y")),
        ];
        let parts = partition_records(&records, true);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].key, None);
        assert_eq!(parts[0].members, vec![2]);
        assert_eq!(parts[1].key.as_deref(), Some("/x"));
        assert_eq!(parts[2].key.as_deref(), Some("/y"));
        assert_eq!(parts[2].members, vec![0, 3]);
        assert_eq!(parts[2].index, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(partition_records(&[], true).is_empty());
        assert!(partition_records(&[], false).is_empty());
    }
}
