use crate::hasher::BitCode;
use ahash::AHashMap;
use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// How a scan enumerated its candidate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Threshold 0: records sharing an identical code.
    Equality,
    /// Pigeonhole split into `blocks` ranges, verification inside shared buckets only.
    MultiIndex { blocks: u32 },
    /// Every pair checked. Used when the code is too narrow to split.
    Exhaustive,
}

#[derive(Debug, Clone)]
pub struct PairScan {
    /// Unordered pairs of caller positions, `(low, high)`, sorted and unique.
    pub pairs: Vec<(usize, usize)>,
    pub strategy: ScanStrategy,
    /// Exact distance computations performed.
    pub verified: usize,
    /// Entries skipped because their width differs from the first entry's.
    pub width_mismatches: usize,
}

impl PairScan {
    fn empty(strategy: ScanStrategy) -> Self {
        Self {
            pairs: Vec::new(),
            strategy,
            verified: 0,
            width_mismatches: 0,
        }
    }
}

/// All pairs of `entries` whose Hamming distance is at most `threshold`.
///
/// Each entry is `(position, code)`; the returned pairs refer to positions.
/// If two codes are within distance `t`, splitting them into `t + 1` ranges leaves
/// at least one range identical, so only records sharing a range value are compared.
pub fn find_near_pairs(entries: &[(usize, &BitCode)], threshold: u32) -> PairScan {
    let (entries, width_mismatches) = split_off_width_outliers(entries);
    let Some(width) = entries.first().map(|(_, code)| code.bits()) else {
        return PairScan::empty(ScanStrategy::Equality);
    };

    let mut scan = if threshold == 0 {
        equality_scan(&entries)
    } else if threshold + 1 > width {
        exhaustive_scan(&entries, threshold)
    } else {
        multi_index_scan(&entries, threshold, width, threshold + 1)
    };
    scan.width_mismatches = width_mismatches;

    debug!(
        "Pair scan: {} entries, {:?}, {} verified, {} pairs",
        entries.len(),
        scan.strategy,
        scan.verified,
        scan.pairs.len()
    );
    scan
}

fn split_off_width_outliers<'a>(
    entries: &[(usize, &'a BitCode)],
) -> (Vec<(usize, &'a BitCode)>, usize) {
    let Some(width) = entries.first().map(|(_, code)| code.bits()) else {
        return (Vec::new(), 0);
    };
    let mut kept = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for &(pos, code) in entries {
        if code.bits() == width {
            kept.push((pos, code));
        } else {
            warn!(
                "Entry {} has a {}-bit code, index width is {}; skipped",
                pos,
                code.bits(),
                width
            );
            skipped += 1;
        }
    }
    (kept, skipped)
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn finish(mut pairs: Vec<(usize, usize)>, strategy: ScanStrategy, verified: usize) -> PairScan {
    pairs.sort_unstable();
    pairs.dedup();
    PairScan {
        pairs,
        strategy,
        verified,
        width_mismatches: 0,
    }
}

fn equality_scan(entries: &[(usize, &BitCode)]) -> PairScan {
    let mut buckets: AHashMap<&BitCode, Vec<usize>> = AHashMap::new();
    for &(pos, code) in entries {
        buckets.entry(code).or_default().push(pos);
    }

    let mut pairs = Vec::new();
    for positions in buckets.values().filter(|p| p.len() > 1) {
        for (i, &a) in positions.iter().enumerate() {
            for &b in &positions[i + 1..] {
                pairs.push(ordered(a, b));
            }
        }
    }
    finish(pairs, ScanStrategy::Equality, 0)
}

fn exhaustive_scan(entries: &[(usize, &BitCode)], threshold: u32) -> PairScan {
    let verified = AtomicUsize::new(0);
    let pairs: Vec<(usize, usize)> = (0..entries.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let (a_pos, a) = entries[i];
            let verified = &verified;
            entries[i + 1..].iter().filter_map(move |&(b_pos, b)| {
                verified.fetch_add(1, Ordering::Relaxed);
                match a.distance(b) {
                    Ok(d) if d <= threshold => Some(ordered(a_pos, b_pos)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Skipping pair ({}, {}): {}", a_pos, b_pos, e);
                        None
                    }
                }
            })
        })
        .collect();
    finish(pairs, ScanStrategy::Exhaustive, verified.into_inner())
}

fn multi_index_scan(
    entries: &[(usize, &BitCode)],
    threshold: u32,
    width: u32,
    blocks: u32,
) -> PairScan {
    let bounds = |block: u32| (block * width / blocks, (block + 1) * width / blocks);

    // (block, block value) -> slots into `entries`
    let buckets: DashMap<(u32, u64), Vec<usize>> = DashMap::new();
    entries.par_iter().enumerate().for_each(|(slot, (_, code))| {
        for block in 0..blocks {
            let (lo, hi) = bounds(block);
            buckets
                .entry((block, code.block_key(lo, hi)))
                .or_default()
                .push(slot);
        }
    });

    let shared: Vec<(u32, Vec<usize>)> = buckets
        .into_iter()
        .filter(|(_, slots)| slots.len() > 1)
        .map(|((block, _), slots)| (block, slots))
        .collect();

    let verified = AtomicUsize::new(0);
    let pairs: Vec<(usize, usize)> = shared
        .into_par_iter()
        .flat_map_iter(|(block, mut slots)| {
            slots.sort_unstable();
            let (lo, hi) = bounds(block);
            let mut found = Vec::new();
            for (i, &sa) in slots.iter().enumerate() {
                let (a_pos, a) = entries[sa];
                for &sb in &slots[i + 1..] {
                    let (b_pos, b) = entries[sb];
                    // Wide ranges are digested, so confirm the range really matches.
                    if !a.block_eq(b, lo, hi) {
                        continue;
                    }
                    // The first matching range owns the pair.
                    if (0..block).any(|earlier| {
                        let (elo, ehi) = bounds(earlier);
                        a.block_eq(b, elo, ehi)
                    }) {
                        continue;
                    }
                    verified.fetch_add(1, Ordering::Relaxed);
                    match a.distance(b) {
                        Ok(d) if d <= threshold => found.push(ordered(a_pos, b_pos)),
                        Ok(_) => {}
                        Err(e) => warn!("Skipping pair ({}, {}): {}", a_pos, b_pos, e),
                    }
                }
            }
            found
        })
        .collect();

    finish(
        pairs,
        ScanStrategy::MultiIndex { blocks },
        verified.into_inner(),
    )
}
