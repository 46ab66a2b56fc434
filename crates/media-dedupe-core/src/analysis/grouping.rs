use super::similarity::find_near_pairs;
use super::union_find::DisjointSet;
use crate::config::PhaseSpec;
use crate::hasher::{DecodedColumn, HashKind};
use crate::model::{LinkBasis, MethodTag};
use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Decoded signals for the whole batch, aligned with the id-sorted record slice.
#[derive(Debug, Clone, Default)]
pub struct BatchSignals {
    pub columns: BTreeMap<HashKind, DecodedColumn>,
    /// Normalized content hashes; `None` means no exact-match signal.
    pub content: Vec<Option<String>>,
}

impl BatchSignals {
    pub fn normalize_content_hash(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_ascii_lowercase())
        }
    }
}

/// What to run over each partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingPlan {
    Single(PhaseSpec),
    TwoPhase { coarse: PhaseSpec, fine: PhaseSpec },
}

impl GroupingPlan {
    pub fn phases(&self) -> Vec<PhaseSpec> {
        match self {
            GroupingPlan::Single(phase) => vec![*phase],
            GroupingPlan::TwoPhase { coarse, fine } => vec![*coarse, *fine],
        }
    }

    pub fn method_tag(&self, exact_content: bool, linked_by: LinkBasis) -> MethodTag {
        MethodTag {
            phases: self.phases(),
            exact_content,
            linked_by,
        }
    }

    /// Short name used for output table names.
    pub fn slug(&self) -> String {
        self.phases()
            .iter()
            .map(|p| p.kind.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    SinglePhaseComplete,
    Phase1Complete,
    Phase2Complete,
}

/// A group before its representative is chosen. Members are ascending record positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalGroup {
    pub members: Vec<usize>,
    pub linked_by: LinkBasis,
}

#[derive(Debug, Default)]
struct EdgeCounters {
    perceptual: AtomicUsize,
    exact: AtomicUsize,
    verified: AtomicUsize,
    width_mismatches: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeStats {
    pub perceptual_edges: usize,
    pub exact_edges: usize,
    pub verified_pairs: usize,
    pub width_mismatches: usize,
}

impl EdgeStats {
    pub fn add(&mut self, other: &EdgeStats) {
        self.perceptual_edges += other.perceptual_edges;
        self.exact_edges += other.exact_edges;
        self.verified_pairs += other.verified_pairs;
        self.width_mismatches += other.width_mismatches;
    }
}

/// Runs a [`GroupingPlan`] over one partition.
pub struct PartitionGrouper<'a> {
    signals: &'a BatchSignals,
    exact_content: bool,
    state: RunState,
    counters: EdgeCounters,
}

impl<'a> PartitionGrouper<'a> {
    pub fn new(signals: &'a BatchSignals, exact_content: bool) -> Self {
        Self {
            signals,
            exact_content,
            state: RunState::NotStarted,
            counters: EdgeCounters::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn edge_stats(&self) -> EdgeStats {
        EdgeStats {
            perceptual_edges: self.counters.perceptual.load(Ordering::Relaxed),
            exact_edges: self.counters.exact.load(Ordering::Relaxed),
            verified_pairs: self.counters.verified.load(Ordering::Relaxed),
            width_mismatches: self.counters.width_mismatches.load(Ordering::Relaxed),
        }
    }

    /// Groups ordered by smallest member; they partition `members`.
    pub fn run(&mut self, plan: GroupingPlan, members: &[usize]) -> Vec<ProvisionalGroup> {
        match plan {
            GroupingPlan::Single(phase) => {
                let groups = self.group_once(members, phase);
                self.state = RunState::SinglePhaseComplete;
                groups
            }
            GroupingPlan::TwoPhase { coarse, fine } => {
                let provisional = self.group_once(members, coarse);
                self.state = RunState::Phase1Complete;
                trace!("Phase 1 produced {} groups", provisional.len());

                let this = &*self;
                // Refinement never looks outside its own coarse group.
                let mut refined: Vec<ProvisionalGroup> = provisional
                    .into_par_iter()
                    .flat_map_iter(|group| {
                        if group.members.len() < 2 {
                            vec![group]
                        } else {
                            this.group_once(&group.members, fine)
                        }
                    })
                    .collect();
                refined.sort_unstable_by_key(|g| g.members[0]);
                self.state = RunState::Phase2Complete;
                refined
            }
        }
    }

    /// One index + union-find pass over `members` with one hash kind.
    fn group_once(&self, members: &[usize], phase: PhaseSpec) -> Vec<ProvisionalGroup> {
        let mut set = DisjointSet::new(members.len());

        let perceptual_pairs = match self.signals.columns.get(&phase.kind) {
            Some(column) => {
                let entries: Vec<(usize, &_)> = members
                    .iter()
                    .enumerate()
                    .filter_map(|(local, &pos)| column.codes[pos].as_ref().map(|c| (local, c)))
                    .collect();
                let scan = find_near_pairs(&entries, phase.threshold);
                self.counters
                    .verified
                    .fetch_add(scan.verified, Ordering::Relaxed);
                self.counters
                    .width_mismatches
                    .fetch_add(scan.width_mismatches, Ordering::Relaxed);
                scan.pairs
            }
            None => Vec::new(),
        };

        let exact_pairs = if self.exact_content {
            self.exact_pairs(members)
        } else {
            Vec::new()
        };

        self.counters
            .perceptual
            .fetch_add(perceptual_pairs.len(), Ordering::Relaxed);
        self.counters
            .exact
            .fetch_add(exact_pairs.len(), Ordering::Relaxed);

        for &(a, b) in perceptual_pairs.iter().chain(exact_pairs.iter()) {
            set.union(a, b);
        }

        let mut basis = vec![LinkBasis::Unlinked; members.len()];
        for &(a, _) in &perceptual_pairs {
            let root = set.find(a);
            basis[root] = basis[root].merge(LinkBasis::Perceptual);
        }
        for &(a, _) in &exact_pairs {
            let root = set.find(a);
            basis[root] = basis[root].merge(LinkBasis::Exact);
        }

        set.components()
            .into_iter()
            .map(|locals| {
                let root = set.find(locals[0]);
                ProvisionalGroup {
                    members: locals.iter().map(|&l| members[l]).collect(),
                    linked_by: basis[root],
                }
            })
            .collect()
    }

    /// Star edges from the first holder of each content hash to every later holder.
    fn exact_pairs(&self, members: &[usize]) -> Vec<(usize, usize)> {
        let mut first_seen: AHashMap<&str, usize> = AHashMap::new();
        let mut pairs = Vec::new();
        for (local, &pos) in members.iter().enumerate() {
            if let Some(hash) = self.signals.content[pos].as_deref() {
                match first_seen.get(hash) {
                    Some(&first) => pairs.push((first, local)),
                    None => {
                        first_seen.insert(hash, local);
                    }
                }
            }
        }
        pairs
    }
}
