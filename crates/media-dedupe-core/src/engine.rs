use crate::analysis::grouping::{BatchSignals, EdgeStats, GroupingPlan, PartitionGrouper};
use crate::analysis::representative::finalize_groups;
use crate::analysis::scope::{partition_records, Partition};
use crate::config::{DedupeConfig, PhaseSpec};
use crate::error::Error;
use crate::hasher::{decode_column, HashKind};
use crate::model::{DuplicateGroup, MediaRecord, OutputRow};
use crate::policy::SelectionPolicy;
use crate::progress::ProgressReporter;
use ahash::AHashSet;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct DedupeEngine {
    config: DedupeConfig,
    cancelled: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Records covered by the emitted groups.
    pub records: usize,
    pub groups: usize,
    /// Groups with two or more members.
    pub duplicate_groups: usize,
    /// Non-representative members of duplicate groups.
    pub redundant_records: usize,
    /// Hash values dropped as malformed or off-width for the kinds this plan used.
    pub excluded_hash_values: usize,
    pub completed_partitions: usize,
    pub abandoned_partitions: usize,
    pub edges: EdgeStats,
    pub elapsed: Duration,
}

/// Output of one grouping plan over the whole batch.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub plan: GroupingPlan,
    /// Ordered by group id.
    pub groups: Vec<DuplicateGroup>,
    /// Labels of partitions skipped after cancellation.
    pub abandoned: Vec<String>,
    pub stats: RunStats,
}

impl ResultSet {
    /// `phash` for single-phase runs, `dhash_phash` for coarse then fine.
    pub fn label(&self) -> String {
        self.plan.slug()
    }

    /// One row per record, ordered by group then member id.
    pub fn rows(&self) -> impl Iterator<Item = OutputRow> + '_ {
        self.groups.iter().flat_map(|group| {
            let method = group.method.label();
            group.member_ids.iter().map(move |id| OutputRow {
                record_id: id.clone(),
                group_id: group.group_id,
                is_representative: *id == group.representative_id,
                method: method.clone(),
            })
        })
    }

    pub fn representatives(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.representative_id.as_str())
    }

    /// Group lookup by member id.
    pub fn group_of(&self, record_id: &str) -> Option<&DuplicateGroup> {
        self.groups
            .iter()
            .find(|g| g.member_ids.iter().any(|id| id == record_id))
    }
}

#[derive(Debug, Clone)]
pub struct DedupeOutcome {
    pub single: Option<ResultSet>,
    pub two_phase: Option<ResultSet>,
    /// Records received, before repeated ids were dropped.
    pub input_records: usize,
    pub dropped_duplicate_ids: usize,
    pub partitions: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl DedupeOutcome {
    pub fn result_sets(&self) -> impl Iterator<Item = &ResultSet> {
        self.single.iter().chain(self.two_phase.iter())
    }
}

impl DedupeEngine {
    pub fn new(config: DedupeConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns a clone of the cancellation token.
    /// Set it to `true` to stop before the next partition starts.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    fn plans(&self) -> Vec<GroupingPlan> {
        let mut plans = Vec::new();
        if self.config.mode.runs_single() {
            plans.push(GroupingPlan::Single(self.config.single));
        }
        if self.config.mode.runs_two_phase() {
            plans.push(GroupingPlan::TwoPhase {
                coarse: self.config.coarse,
                fine: self.config.fine,
            });
        }
        plans
    }

    /// Run the configured plans over one batch of records:
    /// 1. Drop repeated ids and sort by id
    /// 2. Decode every hash kind the plans use; off-width values carry no signal
    /// 3. Split into scope partitions
    /// 4. Group and pick representatives per partition, per plan
    pub fn run<I>(
        &self,
        records: I,
        policy: &dyn SelectionPolicy,
        reporter: &dyn ProgressReporter,
    ) -> Result<DedupeOutcome, Error>
    where
        I: IntoIterator<Item = MediaRecord>,
    {
        let start = Instant::now();
        let (records, input_records, dropped_duplicate_ids) = prepare_records(records);
        info!(
            "Deduplicating {} records ({} repeated ids dropped)",
            records.len(),
            dropped_duplicate_ids
        );

        let signals = self.decode_signals(&records)?;
        let partitions = partition_records(&records, self.config.directory_scoping);
        debug!("{} scope partitions", partitions.len());
        reporter.on_run_start(records.len(), partitions.len());

        let plans = self.plans();
        let run_plan = |plan: GroupingPlan| {
            self.run_plan(plan, &records, &signals, &partitions, policy, reporter)
        };
        let (single, two_phase) = match plans.as_slice() {
            [single @ GroupingPlan::Single(_), two @ GroupingPlan::TwoPhase { .. }] => {
                let (a, b) = rayon::join(|| run_plan(*single), || run_plan(*two));
                (Some(a), Some(b))
            }
            [plan @ GroupingPlan::Single(_)] => (Some(run_plan(*plan)), None),
            [plan @ GroupingPlan::TwoPhase { .. }] => (None, Some(run_plan(*plan))),
            _ => (None, None),
        };

        let cancelled = single
            .iter()
            .chain(two_phase.iter())
            .any(|set| !set.abandoned.is_empty());
        let elapsed = start.elapsed();
        if cancelled {
            warn!("Run cancelled; unfinished partitions were not grouped");
        }
        info!("Dedupe finished in {:.2}s", elapsed.as_secs_f64());
        reporter.on_run_complete(cancelled, elapsed.as_secs_f64());

        Ok(DedupeOutcome {
            single,
            two_phase,
            input_records,
            dropped_duplicate_ids,
            partitions: partitions.len(),
            cancelled,
            elapsed,
        })
    }

    fn decode_signals(&self, records: &[MediaRecord]) -> Result<BatchSignals, Error> {
        let phases = self.config.active_phases();
        let kinds: Vec<HashKind> = phases
            .iter()
            .map(|p| p.kind)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = BTreeMap::new();
        for kind in kinds {
            let column = decode_column(
                records,
                kind,
                self.config.encoding,
                self.config.declared_width(kind),
            );
            if let Some(width) = column.width {
                for phase in phases.iter().filter(|p| p.kind == kind) {
                    phase.check_width(width)?;
                }
            }
            columns.insert(kind, column);
        }

        let content = if self.config.exact_content {
            records
                .iter()
                .map(|r| {
                    r.content_hash
                        .as_deref()
                        .and_then(BatchSignals::normalize_content_hash)
                })
                .collect()
        } else {
            vec![None; records.len()]
        };

        Ok(BatchSignals { columns, content })
    }

    fn run_plan(
        &self,
        plan: GroupingPlan,
        records: &[MediaRecord],
        signals: &BatchSignals,
        partitions: &[Partition],
        policy: &dyn SelectionPolicy,
        reporter: &dyn ProgressReporter,
    ) -> ResultSet {
        let start = Instant::now();
        let label = plan.slug();
        let exact_content = self.config.exact_content;

        let outcomes: Vec<Option<(Vec<DuplicateGroup>, EdgeStats)>> = partitions
            .par_iter()
            .map(|partition| {
                if self.cancelled.load(Ordering::Relaxed) {
                    reporter.on_partition_abandoned(&label, partition.label());
                    return None;
                }
                reporter.on_partition_start(&label, partition.label(), partition.members.len());

                let mut grouper = PartitionGrouper::new(signals, exact_content);
                let provisional = grouper.run(plan, &partition.members);
                let groups = finalize_groups(
                    records,
                    partition.index,
                    provisional,
                    plan,
                    exact_content,
                    policy,
                );

                reporter.on_partition_complete(&label, partition.label(), groups.len());
                Some((groups, grouper.edge_stats()))
            })
            .collect();

        let mut groups = Vec::new();
        let mut abandoned = Vec::new();
        let mut stats = RunStats::default();
        for (partition, outcome) in partitions.iter().zip(outcomes) {
            match outcome {
                Some((partition_groups, edges)) => {
                    stats.completed_partitions += 1;
                    stats.edges.add(&edges);
                    groups.extend(partition_groups);
                }
                None => {
                    stats.abandoned_partitions += 1;
                    abandoned.push(partition.label().to_string());
                }
            }
        }

        stats.groups = groups.len();
        stats.records = groups.iter().map(|g| g.len()).sum();
        stats.duplicate_groups = groups.iter().filter(|g| g.is_duplicate()).count();
        stats.redundant_records = groups
            .iter()
            .filter(|g| g.is_duplicate())
            .map(|g| g.len() - 1)
            .sum();
        stats.excluded_hash_values = excluded_for(&plan.phases(), signals);
        stats.elapsed = start.elapsed();

        debug!(
            "Plan {}: {} groups ({} with duplicates) in {:.2}s, {} perceptual + {} exact edges",
            label,
            stats.groups,
            stats.duplicate_groups,
            stats.elapsed.as_secs_f64(),
            stats.edges.perceptual_edges,
            stats.edges.exact_edges,
        );
        reporter.on_result_set_complete(&label, stats.groups, stats.elapsed.as_secs_f64());

        ResultSet {
            plan,
            groups,
            abandoned,
            stats,
        }
    }
}

fn excluded_for(phases: &[PhaseSpec], signals: &BatchSignals) -> usize {
    let mut seen = AHashSet::new();
    phases
        .iter()
        .filter(|p| seen.insert(p.kind))
        .filter_map(|p| signals.columns.get(&p.kind))
        .map(|c| c.excluded())
        .sum()
}

/// Keep the first record per id, then order by id.
fn prepare_records<I>(records: I) -> (Vec<MediaRecord>, usize, usize)
where
    I: IntoIterator<Item = MediaRecord>,
{
    let mut seen: AHashSet<String> = AHashSet::new();
    let mut kept = Vec::new();
    let mut received = 0usize;
    for record in records {
        received += 1;
        if seen.insert(record.id.clone()) {
            kept.push(record);
        } else {
            warn!("Duplicate record id '{}' dropped", record.id);
        }
    }
    kept.sort_by(|a, b| a.id.cmp(&b.id));
    let dropped = received - kept.len();
    (kept, received, dropped)
}
