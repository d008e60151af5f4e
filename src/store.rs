//! In-memory table of quality-filtered alignments.
//!
//! Records are compact (40 bytes) and keyed by interned handles; the two
//! multimaps answer "alignments of this contig" and "alignments on this
//! reference sequence" without re-hashing names.

use crate::error::{PurgaError, Result};
use crate::paf::PafRecord;
use crate::sequence_index::{ContigHandle, ContigIndex, TargetHandle, TargetIndex};
use log::{debug, warn};

/// Maximum unknown identifiers quoted in an [`PurgaError::InputConsistency`].
const MAX_REPORTED_IDS: usize = 10;

/// One filtered alignment, fully interned.
///
/// Intervals are 0-based half-open; `query_start < query_end` and
/// `target_start < target_end` are enforced at parse time. Sequence
/// lengths live in the id registries, not here.
#[derive(Debug, Clone, Copy)]
pub struct Alignment {
    pub query: ContigHandle,
    pub target: TargetHandle,
    pub query_start: u32,
    pub query_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub matches: u32,
    pub block_len: u32,
    /// Aligner score from the `AS:i:` tag; the primary ranking signal
    pub score: i32,
    pub mapping_quality: u8,
    /// True when the query aligns on the reverse strand
    pub reverse: bool,
}

impl Alignment {
    /// Overlap in bases between this alignment's target interval and another's.
    pub fn target_overlap(&self, other: &Alignment) -> u32 {
        let start = self.target_start.max(other.target_start);
        let end = self.target_end.min(other.target_end);
        end.saturating_sub(start)
    }
}

/// Alignments surviving the mapping-quality filter, indexed both ways.
#[derive(Debug, Default)]
pub struct AlignmentStore {
    alignments: Vec<Alignment>,
    by_query: Vec<Vec<u32>>,
    by_target: Vec<Vec<u32>>,
    targets: TargetIndex,
    dropped_low_mq: usize,
}

impl AlignmentStore {
    /// Builds the store from parsed PAF rows.
    ///
    /// Rows below `min_mapping_quality` are dropped. Query ids must exist
    /// in the FASTA index; unknown ids abort the build with a bounded list
    /// of offenders.
    pub fn build(
        records: &[PafRecord],
        contigs: &ContigIndex,
        min_mapping_quality: u8,
    ) -> Result<Self> {
        let mut store = AlignmentStore {
            by_query: vec![Vec::new(); contigs.len()],
            ..Default::default()
        };
        let mut unknown: Vec<String> = Vec::new();
        let mut unknown_count = 0usize;

        for record in records {
            let Some(query) = contigs.handle(&record.query_name) else {
                unknown_count += 1;
                if !unknown.contains(&record.query_name) && unknown.len() < MAX_REPORTED_IDS {
                    unknown.push(record.query_name.clone());
                }
                continue;
            };
            if record.query_len != contigs.length(query) {
                warn!(
                    "PAF query length {} for {} disagrees with FASTA index length {}",
                    record.query_len,
                    record.query_name,
                    contigs.length(query)
                );
            }
            if record.mapping_quality < min_mapping_quality {
                store.dropped_low_mq += 1;
                continue;
            }
            let target = store.targets.intern(&record.target_name, record.target_len);
            let id = store.alignments.len() as u32;
            store.alignments.push(Alignment {
                query,
                target,
                query_start: record.query_start,
                query_end: record.query_end,
                target_start: record.target_start,
                target_end: record.target_end,
                matches: record.matches,
                block_len: record.block_len,
                score: record.score,
                mapping_quality: record.mapping_quality,
                reverse: record.strand == '-',
            });
            store.by_query[query.index()].push(id);
            if store.by_target.len() <= target.index() {
                store.by_target.resize(target.index() + 1, Vec::new());
            }
            store.by_target[target.index()].push(id);
        }

        if !unknown.is_empty() {
            return Err(PurgaError::InputConsistency {
                kind: "PAF",
                count: unknown_count,
                examples: unknown,
            });
        }

        for ids in &mut store.by_target {
            let alignments = &store.alignments;
            ids.sort_by_key(|&id| alignments[id as usize].target_start);
        }

        debug!(
            "alignment store: {} kept, {} below MQ, {} targets",
            store.alignments.len(),
            store.dropped_low_mq,
            store.targets.len()
        );
        Ok(store)
    }

    /// The alignment with the given id.
    pub fn alignment(&self, id: u32) -> &Alignment {
        &self.alignments[id as usize]
    }

    /// Ids of the alignments whose query is `contig`.
    pub fn for_query(&self, contig: ContigHandle) -> &[u32] {
        &self.by_query[contig.index()]
    }

    /// Ids of the alignments on `target`, sorted by target start.
    pub fn for_target(&self, target: TargetHandle) -> &[u32] {
        self.by_target
            .get(target.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates all retained alignments.
    pub fn iter(&self) -> impl Iterator<Item = &Alignment> {
        self.alignments.iter()
    }

    /// Number of retained alignments.
    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    /// True when nothing survived the quality filter.
    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    /// Alignments dropped for low mapping quality.
    pub fn dropped_low_mq(&self) -> usize {
        self.dropped_low_mq
    }

    /// The reference-sequence interner.
    pub fn targets(&self) -> &TargetIndex {
        &self.targets
    }

    /// Rough resident size, used by the memory pre-flight gate.
    pub fn estimated_bytes(&self) -> u64 {
        let record = std::mem::size_of::<Alignment>() as u64;
        let index_entries: usize = self.by_query.iter().map(Vec::len).sum::<usize>()
            + self.by_target.iter().map(Vec::len).sum::<usize>();
        self.alignments.len() as u64 * record + index_entries as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(query: &str, mq: u8, target: &str) -> PafRecord {
        PafRecord {
            query_name: query.to_string(),
            query_len: 1000,
            query_start: 0,
            query_end: 900,
            strand: '+',
            target_name: target.to_string(),
            target_len: 5000,
            target_start: 100,
            target_end: 1000,
            matches: 850,
            block_len: 900,
            mapping_quality: mq,
            score: 800,
        }
    }

    fn contigs() -> ContigIndex {
        ContigIndex::from_entries([("ctgA", 1000u32), ("ctgB", 1000u32)]).unwrap()
    }

    #[test]
    fn filters_by_mapping_quality() {
        let records = vec![record("ctgA", 60, "chr1"), record("ctgB", 5, "chr1")];
        let store = AlignmentStore::build(&records, &contigs(), 20).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.dropped_low_mq(), 1);
        let a = contigs().handle("ctgA").unwrap();
        assert_eq!(store.for_query(a).len(), 1);
    }

    #[test]
    fn unknown_query_id_is_inconsistency() {
        let records = vec![record("ghost", 60, "chr1")];
        let err = AlignmentStore::build(&records, &contigs(), 20).unwrap_err();
        assert!(matches!(err, PurgaError::InputConsistency { .. }));
    }

    #[test]
    fn target_lists_sorted_by_start() {
        let mut first = record("ctgA", 60, "chr1");
        first.target_start = 2000;
        first.target_end = 2900;
        let second = record("ctgB", 60, "chr1");
        let store = AlignmentStore::build(&[first, second], &contigs(), 20).unwrap();
        let chr1 = store.targets().len();
        assert_eq!(chr1, 1);
        let ids = store.for_target(crate::sequence_index::TargetHandle(0));
        let starts: Vec<u32> = ids.iter().map(|&i| store.alignment(i).target_start).collect();
        assert_eq!(starts, vec![100, 2000]);
    }

    #[test]
    fn alignment_record_stays_compact() {
        assert!(std::mem::size_of::<Alignment>() <= 64);
    }
}
