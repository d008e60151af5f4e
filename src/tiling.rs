//! Greedy interval tiling of a contig's alignments on its primary target.
//!
//! Alignments are visited best-score-first; one is accepted only when its
//! target interval adds new territory, i.e. it overlaps every already
//! accepted interval by at most `min_overlap` bases. The surviving set is
//! pairwise disjoint (up to the tolerance) and yields the contig's
//! normalised score.

use crate::contig::{ContigSummary, Verdict};
use crate::sequence_index::ContigHandle;
use crate::store::AlignmentStore;

/// The non-redundant alignment set of one contig on its primary target.
#[derive(Debug, Clone, Default)]
pub struct TiledSet {
    /// Accepted alignment ids, ordered by target start
    pub alignment_ids: Vec<u32>,
    /// Score-mass per query base: Σ(score × matches) / query length
    pub normalized_score: f64,
}

/// Tiles one contig and writes its normalised score into the summary.
///
/// Contigs whose tiling comes out empty are demoted to
/// [`Verdict::UnalignedPending`] with a zero score.
pub fn tile_contig(
    store: &AlignmentStore,
    contig: ContigHandle,
    summary: &mut ContigSummary,
    min_overlap: u32,
) -> TiledSet {
    let Some(target) = summary.primary_target else {
        return TiledSet::default();
    };

    let mut candidates: Vec<u32> = store
        .for_query(contig)
        .iter()
        .copied()
        .filter(|&id| store.alignment(id).target == target)
        .collect();
    // Best score first; position and input order settle exact ties so the
    // tiling is reproducible.
    candidates.sort_by_key(|&id| {
        let a = store.alignment(id);
        (
            std::cmp::Reverse(a.score),
            a.target_start,
            a.target_end,
            id,
        )
    });

    let mut accepted: Vec<u32> = Vec::new();
    'next: for &id in &candidates {
        let candidate = store.alignment(id);
        for &kept in &accepted {
            if candidate.target_overlap(store.alignment(kept)) > min_overlap {
                continue 'next;
            }
        }
        accepted.push(id);
    }
    accepted.sort_by_key(|&id| store.alignment(id).target_start);

    if accepted.is_empty() {
        summary.normalized_score = Some(0.0);
        summary.verdict = Verdict::UnalignedPending;
        return TiledSet::default();
    }

    let mass: f64 = accepted
        .iter()
        .map(|&id| {
            let a = store.alignment(id);
            a.score as f64 * a.matches as f64
        })
        .sum();
    let normalized = mass / summary.length as f64;
    summary.normalized_score = Some(normalized);

    TiledSet {
        alignment_ids: accepted,
        normalized_score: normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paf::PafRecord;
    use crate::sequence_index::ContigIndex;
    use pretty_assertions::assert_eq;

    fn paf(ts: u32, te: u32, score: i32, matches: u32) -> PafRecord {
        PafRecord {
            query_name: "ctgA".to_string(),
            query_len: 1000,
            query_start: 0,
            query_end: (te - ts).min(1000),
            strand: '+',
            target_name: "chr1".to_string(),
            target_len: 100_000,
            target_start: ts,
            target_end: te,
            matches,
            block_len: te - ts,
            mapping_quality: 60,
            score,
        }
    }

    fn tile(records: &[PafRecord], min_overlap: u32) -> (TiledSet, ContigSummary, AlignmentStore) {
        let contigs = ContigIndex::from_entries([("ctgA", 1000u32)]).unwrap();
        let store = AlignmentStore::build(records, &contigs, 0).unwrap();
        let mut summary = ContigSummary::new(1000);
        crate::locus::assign_primary_loci(&store, &contigs, std::slice::from_mut(&mut summary));
        let contig = contigs.handle("ctgA").unwrap();
        let set = tile_contig(&store, contig, &mut summary, min_overlap);
        (set, summary, store)
    }

    #[test]
    fn keeps_disjoint_alignments() {
        let records = vec![paf(0, 500, 900, 480), paf(600, 1000, 800, 380)];
        let (set, summary, _) = tile(&records, 1);
        assert_eq!(set.alignment_ids.len(), 2);
        let expected = (900.0 * 480.0 + 800.0 * 380.0) / 1000.0;
        assert!((summary.normalized_score.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn rejects_heavy_overlap_with_better_alignment() {
        // Second alignment overlaps the first by 300 bases; only the
        // higher-scoring one survives.
        let records = vec![paf(0, 500, 900, 480), paf(200, 700, 700, 450)];
        let (set, _, store) = tile(&records, 1);
        assert_eq!(set.alignment_ids.len(), 1);
        assert_eq!(store.alignment(set.alignment_ids[0]).score, 900);
    }

    #[test]
    fn overlap_tolerance_is_respected() {
        // 10-base overlap: rejected at tolerance 1, accepted at 10.
        let records = vec![paf(0, 500, 900, 480), paf(490, 900, 800, 390)];
        let (set, _, _) = tile(&records, 1);
        assert_eq!(set.alignment_ids.len(), 1);
        let (set, _, _) = tile(&records, 10);
        assert_eq!(set.alignment_ids.len(), 2);
    }

    #[test]
    fn output_is_pairwise_disjoint_and_position_sorted() {
        let records = vec![
            paf(800, 1200, 500, 380),
            paf(0, 400, 700, 390),
            paf(350, 850, 600, 480),
            paf(1150, 1500, 400, 340),
        ];
        let (set, _, store) = tile(&records, 1);
        for pair in set.alignment_ids.windows(2) {
            let a = store.alignment(pair[0]);
            let b = store.alignment(pair[1]);
            assert!(a.target_start <= b.target_start);
            assert!(a.target_overlap(b) <= 1);
        }
    }
}
