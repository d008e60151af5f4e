//! Similarity screen for contigs without a primary locus.
//!
//! Unaligned contigs are folded into the output set unless they look like
//! a copy of something already kept: candidates are visited longest first,
//! and each is discarded when a kept contig (aligned or previously screened)
//! sits within τ. The `aligned_only` flag skips the screen and retires
//! every candidate outright.

use crate::config::Config;
use crate::contig::ContigSummary;
use crate::distance::DistanceIndex;
use crate::error::{PurgaError, Result};
use crate::ledger::Reason;
use crate::sequence_index::{ContigHandle, ContigIndex};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// Verdict for one screened contig.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    pub contig: ContigHandle,
    pub kept: bool,
    pub reason: Reason,
    pub disqualified_by: Option<ContigHandle>,
}

/// Screens every unaligned candidate against the retained set.
///
/// `kept` must hold the tournament's kept contigs; screened keepers are
/// added to it as they pass, so later (shorter) candidates are also
/// compared against them.
pub fn screen_unaligned(
    mut candidates: Vec<ContigHandle>,
    kept: &mut Vec<bool>,
    summaries: &[ContigSummary],
    distances: &DistanceIndex,
    contigs: &ContigIndex,
    config: &Config,
    tau: f64,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<ScreenOutcome>> {
    if config.aligned_only {
        debug!(
            "aligned-only mode: discarding {} unaligned contig(s)",
            candidates.len()
        );
        return Ok(candidates
            .into_iter()
            .map(|contig| ScreenOutcome {
                contig,
                kept: false,
                reason: Reason::AlignedOnlyMode,
                disqualified_by: None,
            })
            .collect());
    }

    // Longest first; name settles equal lengths.
    candidates.sort_by(|&a, &b| {
        summaries[b.index()]
            .length
            .cmp(&summaries[a.index()].length)
            .then_with(|| contigs.name(a).cmp(contigs.name(b)))
    });

    let mut outcomes = Vec::with_capacity(candidates.len());
    for contig in candidates {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(PurgaError::Cancelled);
            }
        }
        // Neighbours come back nearest-first, so the first kept hit is the
        // closest kept contig.
        let double = distances
            .neighbors(contig, tau)
            .find(|(neighbor, _)| kept[neighbor.index()]);
        match double {
            Some((neighbor, _)) => outcomes.push(ScreenOutcome {
                contig,
                kept: false,
                reason: Reason::UnalignedSimilarToKept,
                disqualified_by: Some(neighbor),
            }),
            None => {
                kept[contig.index()] = true;
                outcomes.push(ScreenOutcome {
                    contig,
                    kept: true,
                    reason: Reason::UnalignedKept,
                    disqualified_by: None,
                });
            }
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceEntry;
    use pretty_assertions::assert_eq;

    struct Fixture {
        contigs: ContigIndex,
        summaries: Vec<ContigSummary>,
        distances: DistanceIndex,
    }

    fn fixture(members: &[(&str, u32)], pairs: &[(&str, &str, f64)]) -> Fixture {
        let contigs = ContigIndex::from_entries(members.iter().copied()).unwrap();
        let summaries = members
            .iter()
            .map(|&(_, len)| ContigSummary::new(len))
            .collect();
        let entries: Vec<DistanceEntry> = pairs
            .iter()
            .map(|&(a, b, d)| DistanceEntry {
                a: contigs.handle(a).unwrap(),
                b: contigs.handle(b).unwrap(),
                distance: d,
            })
            .collect();
        let distances = DistanceIndex::build(&entries, &contigs);
        Fixture {
            contigs,
            summaries,
            distances,
        }
    }

    fn h(fx: &Fixture, name: &str) -> ContigHandle {
        fx.contigs.handle(name).unwrap()
    }

    #[test]
    fn unaligned_copy_of_kept_contig_is_discarded() {
        let fx = fixture(&[("H", 1000), ("U", 900)], &[("U", "H", 0.01)]);
        let mut kept = vec![true, false];
        let outcomes = screen_unaligned(
            vec![h(&fx, "U")],
            &mut kept,
            &fx.summaries,
            &fx.distances,
            &fx.contigs,
            &Config::default(),
            0.05,
            None,
        )
        .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].kept);
        assert_eq!(outcomes[0].reason, Reason::UnalignedSimilarToKept);
        assert_eq!(outcomes[0].disqualified_by, Some(h(&fx, "H")));
    }

    #[test]
    fn novel_unaligned_contig_is_kept() {
        let fx = fixture(&[("H", 1000), ("U", 900)], &[("U", "H", 0.40)]);
        let mut kept = vec![true, false];
        let outcomes = screen_unaligned(
            vec![h(&fx, "U")],
            &mut kept,
            &fx.summaries,
            &fx.distances,
            &fx.contigs,
            &Config::default(),
            0.05,
            None,
        )
        .unwrap();
        assert!(outcomes[0].kept);
        assert_eq!(outcomes[0].reason, Reason::UnalignedKept);
        assert!(kept[h(&fx, "U").index()]);
    }

    #[test]
    fn screened_keepers_shadow_later_candidates() {
        // U1 (longer) is novel and kept; U2 is a near-copy of U1 and must
        // be discarded against it, not against the aligned set.
        let fx = fixture(&[("U1", 1000), ("U2", 800)], &[("U1", "U2", 0.02)]);
        let mut kept = vec![false, false];
        let outcomes = screen_unaligned(
            vec![h(&fx, "U2"), h(&fx, "U1")],
            &mut kept,
            &fx.summaries,
            &fx.distances,
            &fx.contigs,
            &Config::default(),
            0.05,
            None,
        )
        .unwrap();
        assert_eq!(outcomes[0].contig, h(&fx, "U1"));
        assert!(outcomes[0].kept);
        assert!(!outcomes[1].kept);
        assert_eq!(outcomes[1].disqualified_by, Some(h(&fx, "U1")));
    }

    #[test]
    fn aligned_only_mode_discards_without_disqualifier() {
        let fx = fixture(&[("H", 1000), ("U", 900)], &[("U", "H", 0.01)]);
        let mut kept = vec![true, false];
        let config = Config::builder().aligned_only(true).build();
        let outcomes = screen_unaligned(
            vec![h(&fx, "U")],
            &mut kept,
            &fx.summaries,
            &fx.distances,
            &fx.contigs,
            &config,
            0.05,
            None,
        )
        .unwrap();
        assert!(!outcomes[0].kept);
        assert_eq!(outcomes[0].reason, Reason::AlignedOnlyMode);
        assert_eq!(outcomes[0].disqualified_by, None);
    }
}
