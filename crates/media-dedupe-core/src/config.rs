use crate::error::Error;
use crate::hasher::{HashEncoding, HashKind, MAX_CODE_BITS};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupeMode {
    Single,
    #[serde(alias = "twophase", alias = "two_phase")]
    TwoPhase,
    Both,
}

impl DedupeMode {
    pub fn runs_single(&self) -> bool {
        matches!(self, DedupeMode::Single | DedupeMode::Both)
    }

    pub fn runs_two_phase(&self) -> bool {
        matches!(self, DedupeMode::TwoPhase | DedupeMode::Both)
    }
}

/// A hash kind and the largest Hamming distance still counted as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub kind: HashKind,
    pub threshold: u32,
}

impl PhaseSpec {
    pub fn new(kind: HashKind, threshold: u32) -> Self {
        Self { kind, threshold }
    }

    /// Refuse thresholds that would match every pair of codes of `width` bits.
    pub fn check_width(&self, width: u32) -> Result<(), Error> {
        if self.threshold >= width {
            return Err(Error::InvalidThreshold {
                kind: self.kind,
                threshold: self.threshold,
                width,
            });
        }
        Ok(())
    }
}

impl fmt::Display for PhaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    pub mode: DedupeMode,
    /// Kind and threshold for single-phase grouping.
    pub single: PhaseSpec,
    /// First pass of two-phase grouping: cheap hash, loose threshold.
    pub coarse: PhaseSpec,
    /// Second pass, run inside each coarse group.
    pub fine: PhaseSpec,
    /// Equal content hashes always land in the same group.
    pub exact_content: bool,
    /// Group each `directory_key` independently.
    pub directory_scoping: bool,
    pub encoding: HashEncoding,
    /// Optional declared bit width per kind name, e.g. `phash = 64`.
    pub widths: BTreeMap<String, u32>,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            mode: DedupeMode::Both,
            single: PhaseSpec::new(HashKind::PHash, 3),
            coarse: PhaseSpec::new(HashKind::DHash, 5),
            fine: PhaseSpec::new(HashKind::PHash, 3),
            exact_content: true,
            directory_scoping: true,
            encoding: HashEncoding::Hex,
            widths: BTreeMap::new(),
        }
    }
}

impl DedupeConfig {
    pub fn declared_width(&self, kind: HashKind) -> Option<u32> {
        self.widths
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(kind.as_str()))
            .map(|(_, width)| *width)
    }

    /// Phases the configured mode will execute, in execution order, deduplicated.
    pub fn active_phases(&self) -> Vec<PhaseSpec> {
        let mut phases = Vec::new();
        if self.mode.runs_single() {
            phases.push(self.single);
        }
        if self.mode.runs_two_phase() {
            phases.push(self.coarse);
            phases.push(self.fine);
        }
        phases.dedup();
        phases
    }

    /// Configuration-level checks. Runs before any record is touched.
    pub fn validate(&self) -> Result<(), Error> {
        let mut declared: BTreeMap<HashKind, u32> = BTreeMap::new();
        for (name, width) in &self.widths {
            let kind: HashKind = name.parse()?;
            if *width == 0 || *width as usize > MAX_CODE_BITS {
                return Err(Error::Other(format!(
                    "declared width {} for {} is outside 1..={}",
                    width, kind, MAX_CODE_BITS
                )));
            }
            // Keys differing only in case name the same kind.
            if let Some(previous) = declared.insert(kind, *width) {
                if previous != *width {
                    let mut widths = vec![previous, *width];
                    widths.sort_unstable();
                    return Err(Error::InconsistentWidth { kind, widths });
                }
            }
        }

        if self.mode.runs_two_phase() && self.coarse.kind == self.fine.kind {
            return Err(Error::Other(format!(
                "coarse and fine phases both use {}",
                self.coarse.kind
            )));
        }

        for phase in self.active_phases() {
            let width = self
                .declared_width(phase.kind)
                .unwrap_or(MAX_CODE_BITS as u32);
            phase.check_width(width)?;
        }
        Ok(())
    }
}

/// Load `Config.toml` (optional) and `DEDUPE__*` environment overrides.
pub fn load_configuration() -> Result<DedupeConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("DEDUPE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<DedupeConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_scanner_pipeline() {
        let config = DedupeConfig::default();
        assert_eq!(config.mode, DedupeMode::Both);
        assert_eq!(config.single.to_string(), "phash:3");
        assert_eq!(config.coarse.to_string(), "dhash:5");
        assert_eq!(config.fine.to_string(), "phash:3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_active_phases_per_mode() {
        let mut config = DedupeConfig {
            mode: DedupeMode::Single,
            ..Default::default()
        };
        assert_eq!(config.active_phases(), vec![config.single]);

        config.mode = DedupeMode::TwoPhase;
        assert_eq!(config.active_phases(), vec![config.coarse, config.fine]);
    }

    #[test]
    fn test_threshold_must_be_below_declared_width() {
        let mut config = DedupeConfig::default();
        config.widths.insert("phash".to_string(), 64);
        config.single.threshold = 64;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidThreshold {
                kind: HashKind::PHash,
                threshold: 64,
                width: 64
            })
        ));

        config.single.threshold = 63;
        config.fine.threshold = 63;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_same_kind_two_phase_rejected() {
        let mut config = DedupeConfig::default();
        config.coarse = PhaseSpec::new(HashKind::PHash, 6);
        assert!(matches!(config.validate(), Err(Error::Other(_))));

        config.mode = DedupeMode::Single;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_width_kind_rejected() {
        let mut config = DedupeConfig::default();
        config.widths.insert("bhash".to_string(), 64);
        assert!(matches!(config.validate(), Err(Error::UnknownHashKind(_))));
    }

    #[test]
    fn test_conflicting_width_declarations_rejected() {
        let mut config = DedupeConfig::default();
        config.widths.insert("phash".to_string(), 64);
        config.widths.insert("PHash".to_string(), 256);
        assert!(matches!(
            config.validate(),
            Err(Error::InconsistentWidth {
                kind: HashKind::PHash,
                ..
            })
        ));

        config.widths.insert("PHash".to_string(), 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut config = DedupeConfig::default();
        config.widths.insert("dhash".to_string(), 0);
        assert!(matches!(config.validate(), Err(Error::Other(_))));
    }

    #[test]
    fn test_mode_aliases_deserialize() {
        let built = Config::builder()
            .set_override("mode", "twophase")
            .unwrap()
            .build()
            .unwrap();
        let config: DedupeConfig = built.try_deserialize().unwrap();
        assert_eq!(config.mode, DedupeMode::TwoPhase);
        assert!(config.exact_content);
    }
}
