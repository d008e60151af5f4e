//! Pipeline driver: wires the selection stages together.
//!
//! Stage order: alignment store → primary loci → tiling → distance index →
//! threshold → locus tournaments → unaligned screen → ledger. Loci and
//! per-contig work run on a rayon pool sized by the configuration; the
//! ledger is written serially by the driver at the end, in FASTA-index
//! order, so equal inputs give byte-equal output at any thread count.

use crate::config::Config;
use crate::contig::{ContigSummary, Verdict};
use crate::distance::{DistanceEntry, DistanceIndex};
use crate::error::{PurgaError, Result};
use crate::ledger::{DecisionLedger, DecisionRecord, LedgerSummary, Reason};
use crate::locus;
use crate::paf::PafRecord;
use crate::screen::{screen_unaligned, ScreenOutcome};
use crate::sequence_index::{ContigHandle, ContigIndex, TargetIndex};
use crate::store::AlignmentStore;
use crate::threshold::{self, EstimatorStatus, ThresholdReport};
use crate::tiling::tile_contig;
use crate::tournament::{Tournament, TournamentOutcome};
use log::info;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Maximum unknown identifiers quoted in an [`PurgaError::InputConsistency`].
const MAX_REPORTED_IDS: usize = 10;

/// Everything the selection engine consumes.
///
/// Alignments and distances are parsed but not yet filtered; the GC
/// exclusion set and BUSCO table come from upstream collaborators and are
/// optional.
#[derive(Debug, Default)]
pub struct PurgeInputs {
    pub contigs: ContigIndex,
    pub alignments: Vec<PafRecord>,
    pub distances: Vec<DistanceEntry>,
    /// Contig ids excluded by the upstream GC pre-filter
    pub gc_excluded: Vec<String>,
    /// Per-contig GC fraction, reported only
    pub gc_content: HashMap<String, f64>,
    /// Per-contig BUSCO gene ids, reported only
    pub busco: HashMap<String, Vec<String>>,
}

impl PurgeInputs {
    /// Inputs over a contig universe, with everything else empty.
    pub fn new(contigs: ContigIndex) -> Self {
        PurgeInputs {
            contigs,
            ..Default::default()
        }
    }
}

/// Counters describing one selection run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionStats {
    pub alignments_kept: usize,
    pub alignments_dropped_low_mq: usize,
    pub loci: usize,
    pub capped_loci: usize,
    pub rescued: usize,
    pub rescue_passes: u64,
}

/// The outcome of a run: the kept set, the ledger behind it, and the
/// threshold decision.
#[derive(Debug)]
pub struct Selection {
    /// Kept contig ids in FASTA-index order
    pub kept: Vec<String>,
    pub ledger: DecisionLedger,
    pub threshold: ThresholdReport,
    pub summary: LedgerSummary,
    pub stats: SelectionStats,
    pub contigs: ContigIndex,
    pub targets: TargetIndex,
    pub summaries: Vec<ContigSummary>,
    pub busco: HashMap<String, Vec<String>>,
}

/// The staged pipeline behind [`crate::Purga`].
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    pub(crate) config: Config,
    pub(crate) cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub(crate) fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline {
            config,
            cancel: None,
        })
    }

    pub(crate) fn run(&self, inputs: PurgeInputs) -> Result<Selection> {
        let config = &self.config;
        let cancel = self.cancel.as_deref();
        let contigs = inputs.contigs;

        info!(
            "selection over {} contigs, {} alignments, {} distance rows",
            contigs.len(),
            inputs.alignments.len(),
            inputs.distances.len()
        );

        let store = AlignmentStore::build(&inputs.alignments, &contigs, config.min_mapping_quality)?;

        let mut summaries: Vec<ContigSummary> = contigs
            .handles()
            .map(|c| {
                let mut summary = ContigSummary::new(contigs.length(c));
                if let Some(&gc) = inputs.gc_content.get(contigs.name(c)) {
                    summary.gc_fraction = Some(gc);
                }
                summary
            })
            .collect();

        // GC pre-filter exclusions leave the run before any stage sees them.
        let mut excluded: Vec<ContigHandle> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();
        let mut unknown_count = 0usize;
        for name in &inputs.gc_excluded {
            match contigs.handle(name) {
                Some(handle) => {
                    summaries[handle.index()].verdict = Verdict::Discarded;
                    excluded.push(handle);
                }
                None => {
                    unknown_count += 1;
                    if !unknown.contains(name) && unknown.len() < MAX_REPORTED_IDS {
                        unknown.push(name.clone());
                    }
                }
            }
        }
        if !unknown.is_empty() {
            return Err(PurgaError::InputConsistency {
                kind: "GC pre-filter",
                count: unknown_count,
                examples: unknown,
            });
        }

        let distance_index = DistanceIndex::build(&inputs.distances, &contigs);

        if let Some(limit) = config.memory_limit {
            let estimated = store.estimated_bytes() + distance_index.estimated_bytes();
            if estimated > limit {
                return Err(PurgaError::MemoryLimitExceeded { estimated, limit });
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| PurgaError::InvalidConfig(format!("cannot build thread pool: {e}")))?;

        let (tournament_result, screen_outcomes, threshold_report, stats) = pool.install(|| {
            locus::assign_primary_loci(&store, &contigs, &mut summaries);

            summaries
                .par_iter_mut()
                .enumerate()
                .filter(|(_, s)| s.verdict == Verdict::Pending && s.primary_target.is_some())
                .for_each(|(i, summary)| {
                    tile_contig(&store, ContigHandle(i as u32), summary, config.min_overlap);
                });

            let threshold_report = match config.distance_threshold {
                Some(tau) => {
                    info!("distance threshold {tau} supplied by caller");
                    ThresholdReport {
                        tau,
                        sample_size: 0,
                        status: EstimatorStatus::UserSupplied,
                    }
                }
                None => {
                    let sample = threshold::collect_colocated_sample(&distance_index, &summaries);
                    let report = threshold::estimate(&sample)?;
                    info!(
                        "estimated distance threshold {:.5} from {} co-located pairs",
                        report.tau, report.sample_size
                    );
                    report
                }
            };
            let tau = threshold_report.tau;

            let loci = locus::build_loci(&summaries, &contigs, config.min_overlap);
            let tournament =
                Tournament::new(&summaries, &distance_index, &contigs, config, tau, cancel);
            let tournament_result = tournament.run(&loci)?;

            let mut kept: Vec<bool> = vec![false; contigs.len()];
            for outcome in &tournament_result.outcomes {
                kept[outcome.contig.index()] = outcome.kept;
            }
            let candidates: Vec<ContigHandle> = contigs
                .handles()
                .filter(|c| summaries[c.index()].verdict == Verdict::UnalignedPending)
                .collect();
            info!(
                "{} loci resolved; screening {} unaligned contig(s)",
                loci.len(),
                candidates.len()
            );
            let screen_outcomes = screen_unaligned(
                candidates,
                &mut kept,
                &summaries,
                &distance_index,
                &contigs,
                config,
                tau,
                cancel,
            )?;

            let stats = SelectionStats {
                alignments_kept: store.len(),
                alignments_dropped_low_mq: store.dropped_low_mq(),
                loci: loci.len(),
                capped_loci: tournament_result.capped_loci,
                rescued: tournament_result.rescued,
                rescue_passes: tournament_result.rescue_passes,
            };
            Ok::<_, PurgaError>((tournament_result, screen_outcomes, threshold_report, stats))
        })?;

        let selection = self.finalise(
            contigs,
            store,
            summaries,
            excluded,
            tournament_result.outcomes,
            screen_outcomes,
            threshold_report,
            stats,
            inputs.busco,
        )?;
        info!(
            "kept {} of {} contigs",
            selection.summary.total_kept(),
            selection.contigs.len()
        );
        Ok(selection)
    }

    /// Writes the ledger in FASTA-index order and freezes the summaries.
    #[allow(clippy::too_many_arguments)]
    fn finalise(
        &self,
        contigs: ContigIndex,
        store: AlignmentStore,
        mut summaries: Vec<ContigSummary>,
        excluded: Vec<ContigHandle>,
        tournament_outcomes: Vec<TournamentOutcome>,
        screen_outcomes: Vec<ScreenOutcome>,
        threshold: ThresholdReport,
        stats: SelectionStats,
        busco: HashMap<String, Vec<String>>,
    ) -> Result<Selection> {
        let mut tournament_by_contig: Vec<Option<TournamentOutcome>> = vec![None; contigs.len()];
        for outcome in tournament_outcomes {
            let idx = outcome.contig.index();
            tournament_by_contig[idx] = Some(outcome);
        }
        let mut screen_by_contig: Vec<Option<ScreenOutcome>> = vec![None; contigs.len()];
        for outcome in screen_outcomes {
            let idx = outcome.contig.index();
            screen_by_contig[idx] = Some(outcome);
        }
        let excluded_set: Vec<bool> = {
            let mut set = vec![false; contigs.len()];
            for handle in excluded {
                set[handle.index()] = true;
            }
            set
        };

        let mut ledger = DecisionLedger::new(contigs.len());
        for contig in contigs.handles() {
            let record = if excluded_set[contig.index()] {
                DecisionRecord {
                    contig,
                    verdict: Verdict::Discarded,
                    reason: Reason::GcOutlier,
                    disqualified_by: None,
                    opponents: Vec::new(),
                    iteration: 0,
                }
            } else if let Some(outcome) = tournament_by_contig[contig.index()].take() {
                DecisionRecord {
                    contig,
                    verdict: if outcome.kept {
                        Verdict::Kept
                    } else {
                        Verdict::Discarded
                    },
                    reason: outcome.reason,
                    disqualified_by: outcome.disqualified_by,
                    opponents: outcome.opponents,
                    iteration: outcome.iteration,
                }
            } else if let Some(outcome) = screen_by_contig[contig.index()].take() {
                DecisionRecord {
                    contig,
                    verdict: if outcome.kept {
                        Verdict::UnalignedKept
                    } else {
                        Verdict::UnalignedDiscarded
                    },
                    reason: outcome.reason,
                    disqualified_by: outcome.disqualified_by,
                    opponents: Vec::new(),
                    iteration: 0,
                }
            } else {
                return Err(PurgaError::InternalInvariant(format!(
                    "contig {:?} reached the ledger with no verdict",
                    contigs.name(contig)
                )));
            };
            let summary = &mut summaries[contig.index()];
            summary.verdict = record.verdict;
            summary.disqualified_by = record.disqualified_by;
            ledger.record(record)?;
        }

        let kept: Vec<String> = contigs
            .handles()
            .filter(|&c| summaries[c.index()].verdict.is_kept())
            .map(|c| contigs.name(c).to_string())
            .collect();
        let summary = ledger.summarise();
        Ok(Selection {
            kept,
            ledger,
            threshold,
            summary,
            stats,
            targets: store.targets().clone(),
            contigs,
            summaries,
            busco,
        })
    }
}
