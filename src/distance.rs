//! Sparse symmetric pairwise-distance index.
//!
//! Distances arrive as Mash-style `a b d` rows. Each unordered pair is
//! stored once; a per-contig adjacency list sorted by distance answers
//! neighbourhood queries. A missing pair means "unknown", which every
//! caller treats as farther than any threshold.

use crate::error::{PurgaError, Result};
use crate::sequence_index::{ContigHandle, ContigIndex};
use log::warn;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::io::BufRead;

/// Fraction of malformed rows above which a parse is aborted.
const MALFORMED_ABORT_PERCENT: f64 = 1.0;

/// Maximum unknown identifiers quoted in an [`PurgaError::InputConsistency`].
const MAX_REPORTED_IDS: usize = 10;

/// One parsed distance row, id-resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEntry {
    pub a: ContigHandle,
    pub b: ContigHandle,
    pub distance: f64,
}

/// Reads `a<TAB>b<TAB>d` rows, resolving ids against the FASTA index.
///
/// Self-pairs are skipped. Rows with an unparseable or out-of-range
/// distance fall under the 1% malformed-row policy; ids absent from the
/// index abort with [`PurgaError::InputConsistency`].
pub fn read_distances<R: BufRead>(reader: R, contigs: &ContigIndex) -> Result<Vec<DistanceEntry>> {
    let mut entries = Vec::new();
    let mut unknown: Vec<String> = Vec::new();
    let mut unknown_count = 0usize;
    let mut total = 0usize;
    let mut malformed = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        total += 1;
        let line_number = idx + 1;
        let mut fields = line.split('\t');
        let (Some(a_name), Some(b_name), Some(d_field)) =
            (fields.next(), fields.next(), fields.next())
        else {
            malformed += 1;
            warn!("skipping distance row {line_number}: expected 3 tab-separated columns");
            continue;
        };
        let distance: f64 = match d_field.parse() {
            Ok(d) if (0.0..=1.0).contains(&d) => d,
            _ => {
                malformed += 1;
                warn!("skipping distance row {line_number}: distance {d_field:?} not in [0, 1]");
                continue;
            }
        };
        if a_name == b_name {
            continue;
        }
        let mut resolve = |name: &str| {
            let handle = contigs.handle(name);
            if handle.is_none() {
                unknown_count += 1;
                let owned = name.to_string();
                if !unknown.contains(&owned) && unknown.len() < MAX_REPORTED_IDS {
                    unknown.push(owned);
                }
            }
            handle
        };
        let (a, b) = (resolve(a_name), resolve(b_name));
        if let (Some(a), Some(b)) = (a, b) {
            entries.push(DistanceEntry { a, b, distance });
        }
    }

    if !unknown.is_empty() {
        return Err(PurgaError::InputConsistency {
            kind: "distance",
            count: unknown_count,
            examples: unknown,
        });
    }
    if total > 0 && malformed as f64 * 100.0 > total as f64 * MALFORMED_ABORT_PERCENT {
        return Err(PurgaError::TooManyMalformedRows {
            kind: "distance",
            malformed,
            total,
            limit_percent: MALFORMED_ABORT_PERCENT,
        });
    }
    Ok(entries)
}

/// Symmetric pairwise distances with per-contig adjacency.
#[derive(Debug, Default)]
pub struct DistanceIndex {
    pairs: HashMap<(u32, u32), f64>,
    /// Per contig: neighbours sorted by distance, then name
    adjacency: Vec<Vec<(ContigHandle, f64)>>,
}

fn pair_key(a: ContigHandle, b: ContigHandle) -> (u32, u32) {
    if a <= b {
        (a.0, b.0)
    } else {
        (b.0, a.0)
    }
}

impl DistanceIndex {
    /// Builds the index. A pair appearing several times (Mash emits both
    /// orientations) keeps its last value.
    pub fn build(entries: &[DistanceEntry], contigs: &ContigIndex) -> Self {
        let mut pairs: HashMap<(u32, u32), f64> = HashMap::with_capacity(entries.len());
        for entry in entries {
            pairs.insert(pair_key(entry.a, entry.b), entry.distance);
        }

        let mut adjacency: Vec<Vec<(ContigHandle, f64)>> = vec![Vec::new(); contigs.len()];
        for (&(a, b), &d) in &pairs {
            adjacency[a as usize].push((ContigHandle(b), d));
            adjacency[b as usize].push((ContigHandle(a), d));
        }
        for list in &mut adjacency {
            list.sort_by(|(x, dx), (y, dy)| {
                OrderedFloat(*dx)
                    .cmp(&OrderedFloat(*dy))
                    .then_with(|| contigs.name(*x).cmp(contigs.name(*y)))
            });
        }

        DistanceIndex { pairs, adjacency }
    }

    /// The stored distance for an unordered pair, if any.
    pub fn distance(&self, a: ContigHandle, b: ContigHandle) -> Option<f64> {
        self.pairs.get(&pair_key(a, b)).copied()
    }

    /// All neighbours of `a` within `tau`, nearest first.
    pub fn neighbors(
        &self,
        a: ContigHandle,
        tau: f64,
    ) -> impl Iterator<Item = (ContigHandle, f64)> + '_ {
        self.adjacency[a.index()]
            .iter()
            .take_while(move |(_, d)| *d <= tau)
            .copied()
    }

    /// Iterates every stored unordered pair once.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (ContigHandle, ContigHandle, f64)> + '_ {
        self.pairs
            .iter()
            .map(|(&(a, b), &d)| (ContigHandle(a), ContigHandle(b), d))
    }

    /// Number of stored unordered pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no distances were supplied.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Rough resident size, used by the memory pre-flight gate.
    pub fn estimated_bytes(&self) -> u64 {
        let pair = (std::mem::size_of::<(u32, u32)>() + std::mem::size_of::<f64>()) as u64;
        let edge = std::mem::size_of::<(ContigHandle, f64)>() as u64;
        self.pairs.len() as u64 * (pair + 2 * edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contigs() -> ContigIndex {
        ContigIndex::from_entries([("A", 100u32), ("B", 100u32), ("C", 100u32)]).unwrap()
    }

    fn h(contigs: &ContigIndex, name: &str) -> ContigHandle {
        contigs.handle(name).unwrap()
    }

    #[test]
    fn parses_and_skips_self_pairs() {
        let text = "A\tB\t0.01\nA\tA\t0.0\nB\tC\t0.25\n";
        let contigs = contigs();
        let entries = read_distances(text.as_bytes(), &contigs).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn unknown_id_is_inconsistency() {
        let text = "A\tghost\t0.01\n";
        let contigs = contigs();
        assert!(matches!(
            read_distances(text.as_bytes(), &contigs),
            Err(PurgaError::InputConsistency { .. })
        ));
    }

    #[test]
    fn out_of_range_distance_is_malformed() {
        let mut text = String::from("A\tB\t1.5\n");
        for _ in 0..10 {
            text.push_str("A\tB\t0.5\n");
        }
        let contigs = contigs();
        // 1 malformed of 11 rows is over 1%: abort.
        assert!(matches!(
            read_distances(text.as_bytes(), &contigs),
            Err(PurgaError::TooManyMalformedRows { .. })
        ));
    }

    #[test]
    fn lookup_is_symmetric_and_missing_pairs_are_none() {
        let contigs = contigs();
        let entries = read_distances("A\tB\t0.01\n".as_bytes(), &contigs).unwrap();
        let index = DistanceIndex::build(&entries, &contigs);
        let (a, b, c) = (h(&contigs, "A"), h(&contigs, "B"), h(&contigs, "C"));
        assert_eq!(index.distance(a, b), Some(0.01));
        assert_eq!(index.distance(b, a), Some(0.01));
        assert_eq!(index.distance(a, c), None);
    }

    #[test]
    fn duplicate_pair_keeps_last_value() {
        let contigs = contigs();
        let entries = read_distances("A\tB\t0.01\nB\tA\t0.02\n".as_bytes(), &contigs).unwrap();
        let index = DistanceIndex::build(&entries, &contigs);
        assert_eq!(index.distance(h(&contigs, "A"), h(&contigs, "B")), Some(0.02));
    }

    #[test]
    fn neighbors_sorted_and_bounded_by_tau() {
        let contigs = contigs();
        let entries =
            read_distances("A\tC\t0.30\nA\tB\t0.05\n".as_bytes(), &contigs).unwrap();
        let index = DistanceIndex::build(&entries, &contigs);
        let a = h(&contigs, "A");
        let within: Vec<_> = index.neighbors(a, 0.1).collect();
        assert_eq!(within, vec![(h(&contigs, "B"), 0.05)]);
        let all: Vec<_> = index.neighbors(a, 1.0).map(|(n, _)| n).collect();
        assert_eq!(all, vec![h(&contigs, "B"), h(&contigs, "C")]);
    }
}
