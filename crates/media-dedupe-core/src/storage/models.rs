use crate::hasher::HashKind;
use crate::model::{MediaRecord, QualityHint};
use chrono::{DateTime, NaiveDateTime};

/// Timestamp layout the scanner writes into the `date` column.
pub const SCANNER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of a scanner media table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRow {
    pub file_path: String,
    pub file_name: String,
    pub file_directory: String,
    pub file_type: String,
    pub file_size: i64,
    pub blake3: Option<String>,
    pub ahash: Option<String>,
    pub dhash: Option<String>,
    pub phash: Option<String>,
    pub whash: Option<String>,
    pub chash: Option<String>,
    pub date: Option<String>,
}

impl MediaRow {
    pub fn hash(&self, kind: HashKind) -> Option<&str> {
        let value = match kind {
            HashKind::AHash => &self.ahash,
            HashKind::DHash => &self.dhash,
            HashKind::PHash => &self.phash,
            HashKind::WHash => &self.whash,
            HashKind::CHash => &self.chash,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Id is the path, content hash is blake3, scope is the directory, and the
    /// quality hint is file size then capture time.
    pub fn to_record(&self) -> MediaRecord {
        let mut record = MediaRecord::new(self.file_path.clone(), self.file_name.clone());
        if let Some(blake3) = self.blake3.as_deref().filter(|v| !v.trim().is_empty()) {
            record = record.with_content_hash(blake3);
        }
        for kind in HashKind::ALL {
            if let Some(raw) = self.hash(kind) {
                record = record.with_hash(kind, raw);
            }
        }
        if !self.file_directory.is_empty() {
            record = record.with_directory(self.file_directory.clone());
        }
        let captured = self.date.as_deref().and_then(parse_scanner_date).unwrap_or(0);
        record.with_quality(QualityHint::new(self.file_size.max(0) as u64, captured))
    }
}

/// Unix seconds for a scanner timestamp. Accepts the scanner layout and RFC 3339.
pub fn parse_scanner_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, SCANNER_DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.timestamp()))
        .ok()
}

/// Per-directory counts from an output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySummary {
    pub directory: String,
    pub total_files: i64,
    pub representatives: i64,
}

impl DirectorySummary {
    pub fn redundant(&self) -> i64 {
        self.total_files - self.representatives
    }
}

/// One entry of the run log.
#[derive(Debug, Clone)]
pub struct DedupeRun {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub source_table: String,
    pub target_table: String,
    pub plan: String,
    pub records: i64,
    pub group_count: i64,
    pub duplicate_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_record() {
        let row = MediaRow {
            file_path: "/media/alice/20231009_154612_C1x2.jpg".to_string(),
            file_name: "20231009_154612_C1x2.jpg".to_string(),
            file_directory: "alice".to_string(),
            file_type: "image".to_string(),
            file_size: 2048,
            blake3: Some("ab12".to_string()),
            phash: Some("0f0f".to_string()),
            dhash: Some("  ".to_string()),
            date: Some("2023-10-09 15:46:12".to_string()),
            ..Default::default()
        };
        let record = row.to_record();
        assert_eq!(record.id, row.file_path);
        assert_eq!(record.content_hash.as_deref(), Some("ab12"));
        assert_eq!(record.directory_key.as_deref(), Some("alice"));
        assert_eq!(record.perceptual_hashes.len(), 1);
        assert_eq!(
            record.quality_hint,
            Some(QualityHint::new(2048, 1_696_866_372))
        );
    }

    #[test]
    fn test_parse_scanner_date() {
        assert_eq!(parse_scanner_date("1970-01-01 00:01:00"), Some(60));
        assert_eq!(parse_scanner_date("1970-01-01T00:01:00+00:00"), Some(60));
        assert_eq!(parse_scanner_date("yesterday"), None);
    }
}
