pub mod code;

pub use code::{BitCode, CodecError, HashEncoding, MAX_CODE_BITS};

use crate::error::Error;
use crate::model::MediaRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Perceptual hash algorithms produced by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    AHash,
    DHash,
    PHash,
    WHash,
    CHash,
}

impl HashKind {
    pub const ALL: [HashKind; 5] = [
        HashKind::AHash,
        HashKind::DHash,
        HashKind::PHash,
        HashKind::WHash,
        HashKind::CHash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashKind::AHash => "ahash",
            HashKind::DHash => "dhash",
            HashKind::PHash => "phash",
            HashKind::WHash => "whash",
            HashKind::CHash => "chash",
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownHashKind(s.to_string()))
    }
}

/// One hash kind decoded for a whole batch, aligned with the record slice.
#[derive(Debug, Clone)]
pub struct DecodedColumn {
    pub kind: HashKind,
    /// Common width of every decoded code, `None` when no record carries this kind.
    pub width: Option<u32>,
    pub codes: Vec<Option<BitCode>>,
    pub missing: usize,
    pub malformed: usize,
    pub off_width: usize,
}

impl DecodedColumn {
    pub fn present(&self) -> usize {
        self.codes.iter().filter(|c| c.is_some()).count()
    }

    pub fn excluded(&self) -> usize {
        self.malformed + self.off_width
    }
}

/// Parse one hash kind for every record.
///
/// Malformed values become "no signal" for that record. The batch width is
/// `declared_width` when given, else the most common decoded width (the smaller
/// one on a tie); values of any other width are excluded the same way.
pub fn decode_column(
    records: &[MediaRecord],
    kind: HashKind,
    encoding: HashEncoding,
    declared_width: Option<u32>,
) -> DecodedColumn {
    let parsed: Vec<Option<Result<BitCode, CodecError>>> = records
        .par_iter()
        .map(|record| {
            record
                .perceptual_hashes
                .get(&kind)
                .map(|raw| BitCode::parse(raw, encoding))
        })
        .collect();

    let mut width_counts: BTreeMap<u32, usize> = BTreeMap::new();
    for code in parsed.iter().flatten().flatten() {
        *width_counts.entry(code.bits()).or_insert(0) += 1;
    }
    let width = declared_width.or_else(|| {
        width_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(bits, _)| *bits)
    });
    if declared_width.is_none() && width_counts.len() > 1 {
        warn!(
            "Mixed {} widths {:?}; comparing at {:?} bits",
            kind,
            width_counts.keys().collect::<Vec<_>>(),
            width
        );
    }

    let mut codes = Vec::with_capacity(records.len());
    let mut missing = 0usize;
    let mut malformed = 0usize;
    let mut off_width = 0usize;

    for (record, entry) in records.iter().zip(parsed) {
        match entry {
            None => {
                missing += 1;
                codes.push(None);
            }
            Some(Err(e)) => {
                warn!("Record '{}': {} excluded from {} comparisons", record.id, e, kind);
                malformed += 1;
                codes.push(None);
            }
            Some(Ok(code)) => match width {
                Some(expected) if code.bits() != expected => {
                    warn!(
                        "Record '{}': {} is {} bits, expected {}; excluded",
                        record.id,
                        kind,
                        code.bits(),
                        expected
                    );
                    off_width += 1;
                    codes.push(None);
                }
                _ => codes.push(Some(code)),
            },
        }
    }

    debug!(
        "Decoded {}: width={:?}, missing={}, malformed={}, off_width={}",
        kind, width, missing, malformed, off_width
    );

    DecodedColumn {
        kind,
        width,
        codes,
        missing,
        malformed,
        off_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, kind: HashKind, raw: &str) -> MediaRecord {
        MediaRecord::new(id, format!("{id}.jpg")).with_hash(kind, raw)
    }

    #[test]
    fn test_hash_kind_round_trip_names() {
        for kind in HashKind::ALL {
            assert_eq!(kind.as_str().parse::<HashKind>().unwrap(), kind);
        }
        assert_eq!("PHash".parse::<HashKind>().unwrap(), HashKind::PHash);
        assert!("bhash".parse::<HashKind>().is_err());
    }

    #[test]
    fn test_decode_column_isolates_bad_values() {
        let records = vec![
            record("a", HashKind::PHash, "0f0f"),
            record("b", HashKind::PHash, "nothex!"),
            MediaRecord::new("c", "c.jpg"),
            record("d", HashKind::PHash, "f0f0"),
        ];
        let column = decode_column(&records, HashKind::PHash, HashEncoding::Hex, None);
        assert_eq!(column.width, Some(16));
        assert_eq!(column.present(), 2);
        assert_eq!(column.malformed, 1);
        assert_eq!(column.missing, 1);
        assert!(column.codes[1].is_none());
    }

    #[test]
    fn test_decode_column_majority_width_wins() {
        let records = vec![
            record("a", HashKind::DHash, "0f0f0f0f"),
            record("b", HashKind::DHash, "f0f0f0f"),
            record("c", HashKind::DHash, "00ff00ff"),
        ];
        let column = decode_column(&records, HashKind::DHash, HashEncoding::Hex, None);
        assert_eq!(column.width, Some(32));
        assert_eq!(column.off_width, 1);
        assert!(column.codes[1].is_none());
        assert_eq!(column.present(), 2);
    }

    #[test]
    fn test_decode_column_width_tie_prefers_smaller() {
        let records = vec![
            record("a", HashKind::DHash, "0f0f0f0f"),
            record("b", HashKind::DHash, "0f0f"),
        ];
        let column = decode_column(&records, HashKind::DHash, HashEncoding::Hex, None);
        assert_eq!(column.width, Some(16));
        assert!(column.codes[0].is_none());
        assert!(column.codes[1].is_some());
    }

    #[test]
    fn test_decode_column_declared_width_excludes_outliers() {
        let records = vec![
            record("a", HashKind::DHash, "0f0f"),
            record("b", HashKind::DHash, "0f0f0f0f"),
        ];
        let column =
            decode_column(&records, HashKind::DHash, HashEncoding::Hex, Some(16));
        assert_eq!(column.width, Some(16));
        assert_eq!(column.off_width, 1);
        assert!(column.codes[0].is_some());
        assert!(column.codes[1].is_none());
    }
}
