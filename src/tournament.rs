//! The per-locus selection tournament.
//!
//! Within a locus, the best-scoring active contig is promoted each round
//! and challenges the rest: contigs within τ of the champion lose unless
//! the size safeguard holds, contigs farther than τ stay in play. After
//! every locus converges, a rescue sweep looks for discarded contigs whose
//! disqualifier later fell and which have no kept stand-in within τ; any
//! found are re-activated and their loci re-run. The iterative form exists
//! so one contig's loss never silently removes a genomic region from the
//! kept set.

use crate::config::Config;
use crate::contig::ContigSummary;
use crate::distance::DistanceIndex;
use crate::error::{PurgaError, Result};
use crate::ledger::Reason;
use crate::locus::Locus;
use crate::sequence_index::{ContigHandle, ContigIndex};
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-member tournament fate.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fate {
    Active,
    Kept {
        reason: Reason,
        round: u64,
    },
    Discarded {
        by: Option<ContigHandle>,
        reason: Reason,
        round: u64,
    },
}

#[derive(Debug, Clone)]
struct MemberState {
    fate: Fate,
    /// Survived at least one challenge through the size safeguard
    challenged: bool,
    /// Re-activated by the rescue sweep
    rescued: bool,
    opponents: Vec<ContigHandle>,
}

impl MemberState {
    fn new() -> Self {
        MemberState {
            fate: Fate::Active,
            challenged: false,
            rescued: false,
            opponents: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct LocusState {
    states: Vec<MemberState>,
    rounds: u64,
    capped: bool,
}

/// Final per-contig outcome of the tournament stage.
#[derive(Debug, Clone)]
pub struct TournamentOutcome {
    pub contig: ContigHandle,
    pub kept: bool,
    pub reason: Reason,
    pub disqualified_by: Option<ContigHandle>,
    pub opponents: Vec<ContigHandle>,
    pub iteration: u64,
}

/// Aggregate result over all loci.
#[derive(Debug, Default)]
pub struct TournamentResult {
    /// One outcome per locus member, in locus order then member order
    pub outcomes: Vec<TournamentOutcome>,
    /// Contigs re-activated by the rescue sweep
    pub rescued: usize,
    /// Rescue passes executed
    pub rescue_passes: u64,
    /// Loci that hit the iteration cap
    pub capped_loci: usize,
}

/// Runs the tournament over locus groups.
pub struct Tournament<'a> {
    summaries: &'a [ContigSummary],
    distances: &'a DistanceIndex,
    contigs: &'a ContigIndex,
    config: &'a Config,
    tau: f64,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Tournament<'a> {
    pub fn new(
        summaries: &'a [ContigSummary],
        distances: &'a DistanceIndex,
        contigs: &'a ContigIndex,
        config: &'a Config,
        tau: f64,
        cancel: Option<&'a AtomicBool>,
    ) -> Self {
        Tournament {
            summaries,
            distances,
            contigs,
            config,
            tau,
            cancel,
        }
    }

    /// Resolves every locus and runs the rescue sweep to a fixed point.
    ///
    /// Loci run in parallel; their contig sets are disjoint, and the
    /// distance index is read-only, so no synchronisation is needed until
    /// the rescue barrier.
    pub fn run(&self, loci: &[Locus]) -> Result<TournamentResult> {
        let mut states: Vec<LocusState> = loci
            .par_iter()
            .map(|locus| {
                let mut state = LocusState {
                    states: vec![MemberState::new(); locus.members.len()],
                    rounds: 0,
                    capped: false,
                };
                self.run_locus(locus, &mut state).map(|()| state)
            })
            .collect::<Result<Vec<_>>>()?;

        // Member lookup across loci, for resolving disqualifier fates.
        let mut slot_of: Vec<Option<(u32, u32)>> = vec![None; self.contigs.len()];
        for (li, locus) in loci.iter().enumerate() {
            for (mi, &member) in locus.members.iter().enumerate() {
                slot_of[member.index()] = Some((li as u32, mi as u32));
            }
        }

        let mut rescued_total = 0usize;
        let mut passes = 0u64;
        loop {
            if passes >= self.config.max_tournament_iterations {
                warn!(
                    "orphan rescue stopped at the {passes}-pass cap; accepting current kept set"
                );
                break;
            }
            let orphans = self.find_orphans(loci, &states, &slot_of);
            if orphans.is_empty() {
                break;
            }
            passes += 1;
            rescued_total += orphans.len();
            debug!("rescue pass {passes}: {} orphan(s)", orphans.len());

            let mut affected: Vec<usize> = Vec::new();
            for &(li, mi) in &orphans {
                let member = &mut states[li].states[mi];
                member.fate = Fate::Active;
                member.rescued = true;
                if !affected.contains(&li) {
                    affected.push(li);
                }
            }
            // Re-run the affected loci on owned state so they can go wide.
            let mut taken: Vec<(usize, LocusState)> = affected
                .into_iter()
                .map(|li| {
                    let placeholder = LocusState {
                        states: Vec::new(),
                        rounds: 0,
                        capped: false,
                    };
                    (li, std::mem::replace(&mut states[li], placeholder))
                })
                .collect();
            taken
                .par_iter_mut()
                .map(|(li, state)| self.run_locus(&loci[*li], state))
                .collect::<Result<Vec<()>>>()?;
            for (li, state) in taken {
                states[li] = state;
            }
        }

        let mut result = TournamentResult {
            rescued: rescued_total,
            rescue_passes: passes,
            ..Default::default()
        };
        for (li, locus) in loci.iter().enumerate() {
            if states[li].capped {
                result.capped_loci += 1;
            }
            for (mi, &member) in locus.members.iter().enumerate() {
                let state = &states[li].states[mi];
                let outcome = match &state.fate {
                    Fate::Kept { reason, round } => TournamentOutcome {
                        contig: member,
                        kept: true,
                        reason: *reason,
                        disqualified_by: None,
                        opponents: state.opponents.clone(),
                        iteration: *round,
                    },
                    Fate::Discarded { by, reason, round } => TournamentOutcome {
                        contig: member,
                        kept: false,
                        reason: *reason,
                        disqualified_by: *by,
                        opponents: state.opponents.clone(),
                        iteration: *round,
                    },
                    Fate::Active => {
                        return Err(PurgaError::InternalInvariant(format!(
                            "contig {:?} left active after tournament",
                            member
                        )))
                    }
                };
                result.outcomes.push(outcome);
            }
        }
        Ok(result)
    }

    /// One locus to convergence: rounds of champion promotion until no
    /// contig is active or the iteration cap fires.
    fn run_locus(&self, locus: &Locus, state: &mut LocusState) -> Result<()> {
        loop {
            if let Some(flag) = self.cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(PurgaError::Cancelled);
                }
            }

            let Some(champion_idx) = self.pick_champion(locus, state) else {
                return Ok(());
            };
            if state.rounds >= self.config.max_tournament_iterations {
                self.cap_locus(locus, state);
                return Ok(());
            }
            state.rounds += 1;
            let round = state.rounds;
            let champion = locus.members[champion_idx];
            let champion_summary = &self.summaries[champion.index()];

            let reason = if state.states[champion_idx].rescued {
                Reason::OrphanRescued
            } else if state.states[champion_idx].challenged {
                Reason::SizeSafeguarded
            } else {
                Reason::Tiled
            };
            state.states[champion_idx].fate = Fate::Kept { reason, round };

            for (idx, &other) in locus.members.iter().enumerate() {
                if idx == champion_idx || state.states[idx].fate != Fate::Active {
                    continue;
                }
                let Some(d) = self.distances.distance(champion, other) else {
                    continue;
                };
                if d > self.tau {
                    continue;
                }
                state.states[idx].opponents.push(champion);
                state.states[champion_idx].opponents.push(other);

                let other_summary = &self.summaries[other.index()];
                let safeguarded = other_summary.length as f64
                    >= self.config.size_safeguard_ratio * champion_summary.length as f64
                    && other_summary.score_or_zero()
                        >= self.config.score_safeguard_ratio * champion_summary.score_or_zero();
                if safeguarded {
                    state.states[idx].challenged = true;
                } else {
                    state.states[idx].fate = Fate::Discarded {
                        by: Some(champion),
                        reason: Reason::SimilarityLoser,
                        round,
                    };
                }
            }
        }
    }

    /// The active contig with the best (score, length, id) key, if any.
    fn pick_champion(&self, locus: &Locus, state: &LocusState) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, &member) in locus.members.iter().enumerate() {
            if state.states[idx].fate != Fate::Active {
                continue;
            }
            let better = match best {
                None => true,
                Some(best_idx) => {
                    let contender = locus.members[best_idx];
                    self.ranks_above(member, contender)
                }
            };
            if better {
                best = Some(idx);
            }
        }
        best
    }

    /// Total order on contigs: score, then length, then smaller id.
    fn ranks_above(&self, a: ContigHandle, b: ContigHandle) -> bool {
        let (sa, sb) = (&self.summaries[a.index()], &self.summaries[b.index()]);
        let key_a = (OrderedFloat(sa.score_or_zero()), sa.length);
        let key_b = (OrderedFloat(sb.score_or_zero()), sb.length);
        match key_a.cmp(&key_b) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.contigs.name(a) < self.contigs.name(b),
        }
    }

    /// Forced retirement of everything still active when the cap fires.
    fn cap_locus(&self, locus: &Locus, state: &mut LocusState) {
        warn!(
            "locus containing {} hit the {}-round cap with {} contig(s) unresolved",
            self.contigs.name(locus.members[0]),
            self.config.max_tournament_iterations,
            locus
                .members
                .iter()
                .enumerate()
                .filter(|(i, _)| state.states[*i].fate == Fate::Active)
                .count()
        );
        state.capped = true;
        let round = state.rounds;
        for member_state in &mut state.states {
            if member_state.fate == Fate::Active {
                member_state.fate = Fate::Discarded {
                    by: None,
                    reason: Reason::IterationCap,
                    round,
                };
            }
        }
    }

    /// Discarded contigs whose disqualifier later fell and which have no
    /// kept stand-in within τ in their locus.
    fn find_orphans(
        &self,
        loci: &[Locus],
        states: &[LocusState],
        slot_of: &[Option<(u32, u32)>],
    ) -> Vec<(usize, usize)> {
        let mut orphans = Vec::new();
        for (li, locus) in loci.iter().enumerate() {
            for (mi, &member) in locus.members.iter().enumerate() {
                let Fate::Discarded {
                    by: Some(disqualifier),
                    reason: Reason::SimilarityLoser,
                    ..
                } = states[li].states[mi].fate
                else {
                    continue;
                };
                let disqualifier_fell = slot_of[disqualifier.index()]
                    .map(|(dl, dm)| {
                        matches!(
                            states[dl as usize].states[dm as usize].fate,
                            Fate::Discarded { .. }
                        )
                    })
                    .unwrap_or(false);
                if !disqualifier_fell {
                    continue;
                }
                let covered = locus.members.iter().enumerate().any(|(ki, &kept)| {
                    matches!(states[li].states[ki].fate, Fate::Kept { .. })
                        && self
                            .distances
                            .distance(member, kept)
                            .is_some_and(|d| d <= self.tau)
                });
                if !covered {
                    orphans.push((li, mi));
                }
            }
        }
        orphans
    }
}
