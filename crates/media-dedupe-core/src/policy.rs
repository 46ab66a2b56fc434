//! Pluggable ranking inputs for representative selection.
//!
//! The engine only sees [`SelectionPolicy`]. Filename conventions live in
//! classifiers such as [`TimestampTokenClassifier`], which callers may swap out.

use crate::model::{MediaRecord, QualityHint};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Filename priority classes, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    /// `YYYYMMDD_HHMMSS_token.ext`, the downloader's own naming.
    Canonical,
    /// Starts with `YYYYMMDD_HHMMSS_token`.
    Timestamped,
    /// `…YYYYMMDD_HHMMSS_token_N.ext`, a numbered item of a multi-image post.
    TimestampedCounter,
    /// Carries an `_owner-token_` style unique token.
    Tokenized,
    Generic,
    /// `name (1).jpg` or `name 2.jpg`: a copy made by a file manager.
    DuplicateMarked,
}

pub trait FilenameClassifier: Send + Sync {
    fn classify(&self, filename: &str) -> PriorityClass;
}

impl<F> FilenameClassifier for F
where
    F: Fn(&str) -> PriorityClass + Send + Sync,
{
    fn classify(&self, filename: &str) -> PriorityClass {
        self(filename)
    }
}

/// Everything the representative selector needs to rank a record.
pub trait SelectionPolicy: Send + Sync {
    fn priority_class(&self, record: &MediaRecord) -> PriorityClass;

    fn quality(&self, record: &MediaRecord) -> Option<QualityHint> {
        record.quality_hint
    }
}

lazy_static! {
    static ref CANONICAL: Regex = Regex::new(r"^\d{8}_\d{6}_\w+\.\w+$").unwrap();
    static ref TIMESTAMPED: Regex = Regex::new(r"^\d{8}_\d{6}_\w+").unwrap();
    static ref TIMESTAMPED_COUNTER: Regex = Regex::new(r"^.*\d{8}_\d{6}_\w+_\d+\.\w+$").unwrap();
    static ref TOKENIZED: Regex = Regex::new(r"_\w+-\w+_").unwrap();
    static ref PAREN_COUNTER: Regex = Regex::new(r"\(\d+\)\.\w+$").unwrap();
    static ref SPACE_COUNTER: Regex = Regex::new(r"^.+\s\d{1,2}\.\w+$").unwrap();
}

/// Recognizes timestamp+shortcode names and file-manager copy markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTokenClassifier;

impl FilenameClassifier for TimestampTokenClassifier {
    fn classify(&self, filename: &str) -> PriorityClass {
        if CANONICAL.is_match(filename) {
            PriorityClass::Canonical
        } else if TIMESTAMPED.is_match(filename) {
            PriorityClass::Timestamped
        } else if TIMESTAMPED_COUNTER.is_match(filename) {
            PriorityClass::TimestampedCounter
        } else if PAREN_COUNTER.is_match(filename) || SPACE_COUNTER.is_match(filename) {
            PriorityClass::DuplicateMarked
        } else if TOKENIZED.is_match(filename) {
            PriorityClass::Tokenized
        } else {
            PriorityClass::Generic
        }
    }
}

/// Ranks by a filename classifier, then by the record's own quality hint.
#[derive(Debug, Clone, Default)]
pub struct FilenamePolicy<C> {
    classifier: C,
    use_quality: bool,
}

impl<C: FilenameClassifier> FilenamePolicy<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            use_quality: true,
        }
    }

    /// Skip the quality hint so ties go straight to the id.
    pub fn without_quality(mut self) -> Self {
        self.use_quality = false;
        self
    }
}

impl<C: FilenameClassifier> SelectionPolicy for FilenamePolicy<C> {
    fn priority_class(&self, record: &MediaRecord) -> PriorityClass {
        self.classifier.classify(&record.filename)
    }

    fn quality(&self, record: &MediaRecord) -> Option<QualityHint> {
        if self.use_quality {
            record.quality_hint
        } else {
            None
        }
    }
}

pub fn default_policy() -> FilenamePolicy<TimestampTokenClassifier> {
    FilenamePolicy::new(TimestampTokenClassifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> PriorityClass {
        TimestampTokenClassifier.classify(name)
    }

    #[test]
    fn test_class_order() {
        assert!(PriorityClass::Canonical < PriorityClass::Timestamped);
        assert!(PriorityClass::Generic < PriorityClass::DuplicateMarked);
    }

    #[test]
    fn test_timestamp_patterns() {
        assert_eq!(class("20231009_154612_C1x2Yz3AbC.jpg"), PriorityClass::Canonical);
        assert_eq!(class("20231009_154612_ABCDEF-x.jpg"), PriorityClass::Timestamped);
        assert_eq!(
            class("IMG_20231009_154612_something_2.jpg"),
            PriorityClass::TimestampedCounter
        );
    }

    #[test]
    fn test_duplicate_markers() {
        assert_eq!(class("holiday (1).jpg"), PriorityClass::DuplicateMarked);
        assert_eq!(class("holiday 2.jpg"), PriorityClass::DuplicateMarked);
        assert_eq!(class("holiday.jpg"), PriorityClass::Generic);
    }

    #[test]
    fn test_year_suffix_is_not_a_copy_marker() {
        assert_eq!(class("Paris 2019.jpg"), PriorityClass::Generic);
        assert_eq!(class("Paris 2019 (1).jpg"), PriorityClass::DuplicateMarked);
    }

    #[test]
    fn test_tokenized_names() {
        assert_eq!(class("post_user-abc123_1.jpg"), PriorityClass::Tokenized);
    }

    #[test]
    fn test_closure_classifier() {
        let policy = FilenamePolicy::new(|name: &str| {
            if name.starts_with("keep") {
                PriorityClass::Canonical
            } else {
                PriorityClass::Generic
            }
        });
        let record = MediaRecord::new("1", "keep-me.png");
        assert_eq!(policy.priority_class(&record), PriorityClass::Canonical);
    }

    #[test]
    fn test_without_quality_hides_hint() {
        let record = MediaRecord::new("1", "a.jpg").with_quality(QualityHint::new(10, 0));
        assert_eq!(default_policy().quality(&record), Some(QualityHint::new(10, 0)));
        assert_eq!(default_policy().without_quality().quality(&record), None);
    }
}
