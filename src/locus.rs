//! Primary-locus assignment and locus grouping.
//!
//! Each aligned contig is pinned to the one reference sequence that its
//! strongest alignments agree on; contigs whose locus intervals overlap on
//! the same reference then form the competition groups for the tournament.

use crate::contig::{ContigSummary, Verdict};
use crate::sequence_index::{ContigHandle, ContigIndex, TargetHandle};
use crate::store::AlignmentStore;
use log::debug;

/// Alignments per target below which the percentile rule degenerates to max.
const PERCENTILE_MIN_SAMPLE: usize = 10;

/// A maximal overlap-connected cluster of contigs on one reference sequence.
#[derive(Debug, Clone)]
pub struct Locus {
    pub target: TargetHandle,
    /// Members in deterministic order (locus start, then id)
    pub members: Vec<ContigHandle>,
}

/// Nearest-rank 90th percentile of alignment scores; max for small samples.
///
/// Using a high percentile rather than the single best alignment keeps one
/// spurious high-scoring block from capturing the locus assignment.
fn score_percentile(scores: &mut Vec<i32>) -> i32 {
    scores.sort_unstable();
    if scores.len() < PERCENTILE_MIN_SAMPLE {
        scores.last().copied().unwrap_or(0)
    } else {
        let rank = (0.9 * scores.len() as f64).ceil() as usize;
        scores[rank - 1]
    }
}

/// Assigns every aligned contig its primary target and locus interval.
///
/// The winning target maximises the per-target score percentile; ties break
/// by greater summed block length, then lexicographically smaller target
/// name. The locus interval is the convex hull of the contig's alignments
/// on the winner.
pub fn assign_primary_loci(
    store: &AlignmentStore,
    contigs: &ContigIndex,
    summaries: &mut [ContigSummary],
) {
    let mut assigned = 0usize;
    for contig in contigs.handles() {
        let summary = &mut summaries[contig.index()];
        if summary.verdict != Verdict::Pending {
            continue;
        }
        let ids = store.for_query(contig);
        if ids.is_empty() {
            summary.verdict = Verdict::UnalignedPending;
            continue;
        }

        // Partition this contig's alignments by target.
        let mut by_target: Vec<(TargetHandle, Vec<u32>)> = Vec::new();
        for &id in ids {
            let target = store.alignment(id).target;
            match by_target.iter_mut().find(|(t, _)| *t == target) {
                Some((_, list)) => list.push(id),
                None => by_target.push((target, vec![id])),
            }
        }

        let mut best: Option<(i32, u64, TargetHandle, usize)> = None;
        for (slot, (target, list)) in by_target.iter().enumerate() {
            let mut scores: Vec<i32> = list.iter().map(|&id| store.alignment(id).score).collect();
            let percentile = score_percentile(&mut scores);
            let block_sum: u64 = list
                .iter()
                .map(|&id| store.alignment(id).block_len as u64)
                .sum();
            let better = match &best {
                None => true,
                Some((best_pct, best_blocks, best_target, _)) => {
                    (percentile, block_sum).cmp(&(*best_pct, *best_blocks))
                        == std::cmp::Ordering::Greater
                        || (percentile == *best_pct
                            && block_sum == *best_blocks
                            && store.targets().name(*target) < store.targets().name(*best_target))
                }
            };
            if better {
                best = Some((percentile, block_sum, *target, slot));
            }
        }

        let Some((_, _, target, slot)) = best else {
            continue;
        };
        let list = &by_target[slot].1;
        let locus_start = list
            .iter()
            .map(|&id| store.alignment(id).target_start)
            .min()
            .unwrap_or(0);
        let locus_end = list
            .iter()
            .map(|&id| store.alignment(id).target_end)
            .max()
            .unwrap_or(0);

        summary.primary_target = Some(target);
        summary.locus_start = locus_start;
        summary.locus_end = locus_end;
        assigned += 1;
    }
    debug!("assigned primary loci to {assigned} contigs");
}

/// Groups contigs sharing a primary target into overlap-connected loci.
///
/// Two locus intervals are connected when they overlap by at least
/// `min_overlap` bases; loci are the transitive closure of that relation,
/// found with a union-find over the start-sorted interval sweep.
pub fn build_loci(
    summaries: &[ContigSummary],
    contigs: &ContigIndex,
    min_overlap: u32,
) -> Vec<Locus> {
    // (target, start, end, contig), sorted for a per-target sweep. Only
    // contigs still pending compete; exclusions and demotions stay out.
    let mut intervals: Vec<(TargetHandle, u32, u32, ContigHandle)> = contigs
        .handles()
        .filter_map(|c| {
            let s = &summaries[c.index()];
            if s.verdict != Verdict::Pending {
                return None;
            }
            s.primary_target.map(|t| (t, s.locus_start, s.locus_end, c))
        })
        .collect();
    intervals.sort_by_key(|&(t, start, end, c)| (t, start, end, c));

    let mut parent: Vec<usize> = (0..intervals.len()).collect();
    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cur = i;
        while parent[cur] != root {
            let next = parent[cur];
            parent[cur] = root;
            cur = next;
        }
        root
    }

    // Sweep each target's intervals; `active` holds candidates whose ends
    // can still reach the required overlap with later starts.
    let mut active: Vec<usize> = Vec::new();
    let mut prev_target: Option<TargetHandle> = None;
    for i in 0..intervals.len() {
        let (target, start, end, _) = intervals[i];
        if prev_target != Some(target) {
            active.clear();
            prev_target = Some(target);
        }
        active.retain(|&j| intervals[j].2 >= start.saturating_add(min_overlap.max(1)));
        for &j in &active {
            let overlap = intervals[j].2.min(end).saturating_sub(start);
            if overlap >= min_overlap.max(1) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a] = b;
                }
            }
        }
        active.push(i);
    }

    let mut loci: Vec<Locus> = Vec::new();
    let mut root_to_locus: Vec<Option<usize>> = vec![None; intervals.len()];
    for i in 0..intervals.len() {
        let root = find(&mut parent, i);
        let slot = match root_to_locus[root] {
            Some(slot) => slot,
            None => {
                loci.push(Locus {
                    target: intervals[i].0,
                    members: Vec::new(),
                });
                root_to_locus[root] = Some(loci.len() - 1);
                loci.len() - 1
            }
        };
        loci[slot].members.push(intervals[i].3);
    }
    debug!("grouped {} contigs into {} loci", intervals.len(), loci.len());
    loci
}
