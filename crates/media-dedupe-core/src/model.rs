use crate::config::PhaseSpec;
use crate::hasher::HashKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Secondary ranking signal, compared field by field (larger wins).
///
/// Records loaded from the scanner table use the file size and the capture
/// timestamp in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct QualityHint {
    pub primary: u64,
    pub secondary: i64,
}

impl QualityHint {
    pub fn new(primary: u64, secondary: i64) -> Self {
        Self { primary, secondary }
    }
}

/// One catalogued file, with every hash already computed by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: String,
    pub content_hash: Option<String>,
    pub perceptual_hashes: BTreeMap<HashKind, String>,
    pub directory_key: Option<String>,
    pub filename: String,
    pub quality_hint: Option<QualityHint>,
}

impl MediaRecord {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_hash: None,
            perceptual_hashes: BTreeMap::new(),
            directory_key: None,
            filename: filename.into(),
            quality_hint: None,
        }
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_hash(mut self, kind: HashKind, raw: impl Into<String>) -> Self {
        self.perceptual_hashes.insert(kind, raw.into());
        self
    }

    pub fn with_directory(mut self, key: impl Into<String>) -> Self {
        self.directory_key = Some(key.into());
        self
    }

    pub fn with_quality(mut self, hint: QualityHint) -> Self {
        self.quality_hint = Some(hint);
        self
    }
}

/// Group identifier: the scope partition plus the group's rank inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupId {
    pub partition: u32,
    pub sequence: u32,
}

impl GroupId {
    pub fn new(partition: u32, sequence: u32) -> Self {
        Self {
            partition,
            sequence,
        }
    }

    /// Single integer form for storage; preserves ordering.
    pub fn as_i64(&self) -> i64 {
        (i64::from(self.partition) << 32) | i64::from(self.sequence)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.partition, self.sequence)
    }
}

/// Which kind of edge joined the members of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkBasis {
    /// Singleton group.
    #[default]
    Unlinked,
    Exact,
    Perceptual,
    ExactAndPerceptual,
}

impl LinkBasis {
    pub fn merge(self, other: LinkBasis) -> LinkBasis {
        use LinkBasis::*;
        match (self, other) {
            (Unlinked, x) | (x, Unlinked) => x,
            (Exact, Exact) => Exact,
            (Perceptual, Perceptual) => Perceptual,
            _ => ExactAndPerceptual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkBasis::Unlinked => "unlinked",
            LinkBasis::Exact => "exact",
            LinkBasis::Perceptual => "perceptual",
            LinkBasis::ExactAndPerceptual => "exact+perceptual",
        }
    }
}

/// Audit tag describing how a group was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodTag {
    pub phases: Vec<PhaseSpec>,
    pub exact_content: bool,
    pub linked_by: LinkBasis,
}

impl MethodTag {
    /// `phash:3` for a single pass, `dhash:5>phash:3` for coarse then fine.
    pub fn label(&self) -> String {
        let phases: Vec<String> = self.phases.iter().map(|p| p.to_string()).collect();
        let mut label = phases.join(">");
        if self.exact_content {
            label.push_str("+exact");
        }
        label
    }

    pub fn phase_label(&self, index: usize) -> Option<String> {
        self.phases.get(index).map(|p| p.to_string())
    }
}

/// A finalized duplicate group. Members are sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub group_id: GroupId,
    pub member_ids: Vec<String>,
    pub representative_id: String,
    pub method: MethodTag,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    pub fn is_duplicate(&self) -> bool {
        self.member_ids.len() > 1
    }
}

/// One line of the output feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub record_id: String,
    pub group_id: GroupId,
    pub is_representative: bool,
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_integer_form_keeps_order() {
        let a = GroupId::new(0, 7);
        let b = GroupId::new(1, 0);
        assert!(a < b);
        assert!(a.as_i64() < b.as_i64());
        assert_eq!(b.as_i64(), 1 << 32);
        assert_eq!(b.to_string(), "1-0");
    }

    #[test]
    fn test_link_basis_merge() {
        assert_eq!(LinkBasis::Unlinked.merge(LinkBasis::Exact), LinkBasis::Exact);
        assert_eq!(LinkBasis::Exact.merge(LinkBasis::Exact), LinkBasis::Exact);
        assert_eq!(
            LinkBasis::Exact.merge(LinkBasis::Perceptual),
            LinkBasis::ExactAndPerceptual
        );
    }

    #[test]
    fn test_method_label() {
        let tag = MethodTag {
            phases: vec![
                PhaseSpec::new(HashKind::DHash, 5),
                PhaseSpec::new(HashKind::PHash, 3),
            ],
            exact_content: true,
            linked_by: LinkBasis::Perceptual,
        };
        assert_eq!(tag.label(), "dhash:5>phash:3+exact");
        assert_eq!(tag.phase_label(1).as_deref(), Some("phash:3"));
        assert_eq!(tag.phase_label(2), None);
    }
}
