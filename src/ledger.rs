//! The decision ledger: one append-only record per contig.
//!
//! Every contig in the assembly ends up with exactly one terminal record;
//! a second write for the same contig is an internal invariant violation.
//! The ledger is the source of truth for reports and the kept set.

use crate::contig::Verdict;
use crate::error::{PurgaError, Result};
use crate::sequence_index::ContigHandle;

/// Why a contig received its verdict. Closed set; the tags appear
/// verbatim in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Excluded upstream by the GC pre-filter
    GcOutlier,
    /// Survived tiling and won (or never faced) its tournament
    Tiled,
    /// Within τ of a better champion
    SimilarityLoser,
    /// Kept despite a challenge, by the size safeguard
    SizeSafeguarded,
    /// Kept after its disqualifier was itself discarded
    OrphanRescued,
    /// Unaligned and not similar to anything kept
    UnalignedKept,
    /// Unaligned and within τ of a kept contig
    UnalignedSimilarToKept,
    /// Unaligned and the caller asked for aligned contigs only
    AlignedOnlyMode,
    /// Tournament hit the iteration cap with this contig still active
    IterationCap,
}

impl Reason {
    /// Report tag for this reason.
    pub fn as_tag(self) -> &'static str {
        match self {
            Reason::GcOutlier => "gc-outlier",
            Reason::Tiled => "tiled",
            Reason::SimilarityLoser => "similarity-loser",
            Reason::SizeSafeguarded => "size-safeguarded",
            Reason::OrphanRescued => "orphan-rescued",
            Reason::UnalignedKept => "unaligned-kept",
            Reason::UnalignedSimilarToKept => "unaligned-similar-to-kept",
            Reason::AlignedOnlyMode => "aligned-only-mode",
            Reason::IterationCap => "iteration-cap",
        }
    }
}

/// The terminal record for one contig.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub contig: ContigHandle,
    pub verdict: Verdict,
    pub reason: Reason,
    /// The contig whose win retired this one, when an opponent did
    pub disqualified_by: Option<ContigHandle>,
    /// Contigs this one was weighed against during the tournament
    pub opponents: Vec<ContigHandle>,
    /// Tournament round at which the verdict was fixed; 0 outside C6
    pub iteration: u64,
}

/// Verdict counts over the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub kept: usize,
    pub discarded: usize,
    pub unaligned_kept: usize,
    pub unaligned_discarded: usize,
}

impl LedgerSummary {
    /// Total recorded contigs.
    pub fn total(&self) -> usize {
        self.kept + self.discarded + self.unaligned_kept + self.unaligned_discarded
    }

    /// Contigs retained in the output set.
    pub fn total_kept(&self) -> usize {
        self.kept + self.unaligned_kept
    }
}

/// Append-only per-contig verdict store.
#[derive(Debug, Default)]
pub struct DecisionLedger {
    records: Vec<Option<DecisionRecord>>,
    order: Vec<ContigHandle>,
}

impl DecisionLedger {
    /// A ledger sized for a contig universe of `n`.
    pub fn new(n: usize) -> Self {
        DecisionLedger {
            records: vec![None; n],
            order: Vec::with_capacity(n),
        }
    }

    /// Appends a terminal record.
    ///
    /// # Errors
    /// [`PurgaError::InternalInvariant`] on a non-terminal verdict or a
    /// second write for the same contig.
    pub fn record(&mut self, record: DecisionRecord) -> Result<()> {
        if !record.verdict.is_terminal() {
            return Err(PurgaError::InternalInvariant(format!(
                "ledger write with non-terminal verdict {:?} for contig {:?}",
                record.verdict, record.contig
            )));
        }
        let slot = &mut self.records[record.contig.index()];
        if slot.is_some() {
            return Err(PurgaError::InternalInvariant(format!(
                "double ledger write for contig {:?}",
                record.contig
            )));
        }
        self.order.push(record.contig);
        *slot = Some(record);
        Ok(())
    }

    /// The record for a contig, if one was written.
    pub fn verdict(&self, contig: ContigHandle) -> Option<&DecisionRecord> {
        self.records[contig.index()].as_ref()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.order
            .iter()
            .filter_map(|&c| self.records[c.index()].as_ref())
    }

    /// Records with the given verdict, in insertion order.
    pub fn iter_by_verdict(&self, verdict: Verdict) -> impl Iterator<Item = &DecisionRecord> {
        self.iter().filter(move |r| r.verdict == verdict)
    }

    /// Number of records written.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Verdict counts.
    pub fn summarise(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for record in self.iter() {
            match record.verdict {
                Verdict::Kept => summary.kept += 1,
                Verdict::Discarded => summary.discarded += 1,
                Verdict::UnalignedKept => summary.unaligned_kept += 1,
                Verdict::UnalignedDiscarded => summary.unaligned_discarded += 1,
                Verdict::Pending | Verdict::UnalignedPending => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(contig: u32, verdict: Verdict, reason: Reason) -> DecisionRecord {
        DecisionRecord {
            contig: ContigHandle(contig),
            verdict,
            reason,
            disqualified_by: None,
            opponents: Vec::new(),
            iteration: 1,
        }
    }

    #[test]
    fn records_and_summarises() {
        let mut ledger = DecisionLedger::new(3);
        ledger.record(record(0, Verdict::Kept, Reason::Tiled)).unwrap();
        ledger
            .record(record(1, Verdict::Discarded, Reason::SimilarityLoser))
            .unwrap();
        ledger
            .record(record(2, Verdict::UnalignedKept, Reason::UnalignedKept))
            .unwrap();

        let summary = ledger.summarise();
        assert_eq!(summary.kept, 1);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.unaligned_kept, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.total_kept(), 2);
        assert_eq!(ledger.iter_by_verdict(Verdict::Kept).count(), 1);
    }

    #[test]
    fn double_write_is_internal_invariant() {
        let mut ledger = DecisionLedger::new(1);
        ledger.record(record(0, Verdict::Kept, Reason::Tiled)).unwrap();
        let err = ledger
            .record(record(0, Verdict::Discarded, Reason::SimilarityLoser))
            .unwrap_err();
        assert!(matches!(err, PurgaError::InternalInvariant(_)));
    }

    #[test]
    fn non_terminal_write_is_rejected() {
        let mut ledger = DecisionLedger::new(1);
        let err = ledger
            .record(record(0, Verdict::Pending, Reason::Tiled))
            .unwrap_err();
        assert!(matches!(err, PurgaError::InternalInvariant(_)));
    }
}
