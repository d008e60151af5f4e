//! # Purga: Reference-Guided Assembly Purging
//!
//! This library removes redundant contigs (alternate haplotigs, duplicated
//! sequences) from a highly duplicated de-novo genome assembly, using a
//! reference genome as a spatial guide and pairwise Mash-style distances
//! as a similarity guide.
//!
//! ## Overview
//!
//! Purga consumes three inputs:
//! - PAF alignments of the assembly against a reference (with `AS:i:`
//!   alignment scores)
//! - pairwise distances between contigs (`a<TAB>b<TAB>d`, d in [0, 1])
//! - a FASTA index giving every contig id and length
//!
//! and selects a non-redundant subset that maximises reference coverage
//! without keeping multiple contigs for the same locus:
//! 1. each contig is pinned to a primary reference locus,
//! 2. its alignments there are reduced to a non-redundant tiling and a
//!    normalised score,
//! 3. a distance threshold separating "same haplotype" from "distinct" is
//!    estimated (or taken from the caller),
//! 4. contigs competing for a locus fight an iterative tournament that
//!    retires similarity losers, protects near-equal pairs through a size
//!    safeguard, and rescues orphans,
//! 5. contigs with no locus are screened against the kept set.
//!
//! Every contig receives exactly one verdict in an append-only decision
//! ledger, the source of truth for the kept set and all reports.
//!
//! ## Example Usage
//!
//! ```no_run
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! use purga::{Config, Purga};
//! use std::path::Path;
//!
//! let purger = Purga::new(Config::default())?;
//! let selection = purger.run_files(
//!     Path::new("assembly_vs_ref.paf"),
//!     Path::new("pairwise.dist"),
//!     Path::new("assembly.fasta.fai"),
//! )?;
//!
//! for id in &selection.kept {
//!     println!("{id}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is structured in several modules:
//! - `paf`, `distance`, `sequence_index`: input parsing and id interning
//! - `store`: the filtered in-memory alignment table
//! - `locus`, `tiling`: locus assignment and alignment tiling
//! - `threshold`: the distance-threshold estimator
//! - `tournament`, `screen`: the selection engine proper
//! - `ledger`, `report`: decision records and report rendering
//! - `config`, `error`: configuration and error types
//!
//! ## Thread Safety
//!
//! A run parallelises over loci and contigs internally; the alignment
//! store and distance index are shared read-only, and results are
//! independent of the thread count.

pub mod config;
pub mod contig;
pub mod distance;
pub mod error;
pub mod ledger;
pub mod locus;
pub mod orchestrator;
pub mod paf;
pub mod report;
pub mod screen;
pub mod sequence_index;
pub mod store;
pub mod threshold;
pub mod tiling;
pub mod tournament;

use error::Result;
use orchestrator::Pipeline;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use config::Config;
pub use contig::{ContigSummary, Verdict};
pub use distance::{DistanceEntry, DistanceIndex};
pub use error::PurgaError;
pub use ledger::{DecisionLedger, DecisionRecord, LedgerSummary, Reason};
pub use orchestrator::{PurgeInputs, Selection, SelectionStats};
pub use paf::PafRecord;
pub use sequence_index::{ContigHandle, ContigIndex, TargetHandle, TargetIndex};
pub use threshold::{EstimatorStatus, ThresholdReport};

/// Main interface to the selection engine.
///
/// Holds a validated configuration and an optional cancellation flag; a
/// single instance can run any number of selections.
#[derive(Debug, Clone)]
pub struct Purga {
    pipeline: Pipeline,
}

impl Purga {
    /// Creates a new engine with the given configuration.
    ///
    /// # Errors
    /// Returns [`PurgaError::InvalidConfig`] for out-of-range parameters.
    ///
    /// # Example
    /// ```
    /// # use purga::{Config, Purga};
    /// let purger = Purga::new(
    ///     Config::builder().distance_threshold(0.05).build(),
    /// ).unwrap();
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        Ok(Purga {
            pipeline: Pipeline::new(config)?,
        })
    }

    /// Installs a cancellation flag.
    ///
    /// Setting the flag makes the run stop between tournament rounds and
    /// between screen candidates with [`PurgaError::Cancelled`]; no
    /// partial output is produced.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.pipeline.cancel = Some(flag);
        self
    }

    /// Runs selection over already-parsed inputs.
    pub fn run(&self, inputs: PurgeInputs) -> Result<Selection> {
        self.pipeline.run(inputs)
    }

    /// Runs selection from files on disk.
    ///
    /// # Arguments
    /// * `paf` - alignments of the assembly against the reference
    /// * `distances` - pairwise contig distances, three tab-separated columns
    /// * `fasta_index` - `samtools faidx`-style index of the assembly
    pub fn run_files(&self, paf: &Path, distances: &Path, fasta_index: &Path) -> Result<Selection> {
        let contigs = ContigIndex::from_reader(BufReader::new(File::open(fasta_index)?))?;
        let alignments = paf::read_paf(BufReader::new(File::open(paf)?))?;
        let distances = distance::read_distances(BufReader::new(File::open(distances)?), &contigs)?;
        let mut inputs = PurgeInputs::new(contigs);
        inputs.alignments = alignments;
        inputs.distances = distances;
        self.run(inputs)
    }
}
