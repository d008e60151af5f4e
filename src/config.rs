//! Configuration options for contig selection.
//!
//! This module provides a builder pattern for configuring selection
//! parameters, mirroring the tuning knobs of the purging pipeline.

use crate::error::{PurgaError, Result};

/// Configuration for a purging run.
///
/// Use the builder pattern to construct configurations with non-default
/// values, then pass the result to [`crate::Purga::new`].
///
/// # Default Values
/// - `min_mapping_quality`: 20
/// - `min_overlap`: 1 bp
/// - `size_safeguard_ratio`: 0.50
/// - `score_safeguard_ratio`: 0.90
/// - `distance_threshold`: None (estimated from the data)
/// - `aligned_only`: false
/// - `max_tournament_iterations`: 100,000
/// - `num_threads`: Number of CPU cores
/// - `memory_limit`: None (no gating)
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum mapping quality; alignments below this are dropped on load
    pub min_mapping_quality: u8,

    /// Minimum overlap in bases, used both to reject redundant alignments
    /// during tiling and to connect locus intervals into locus groups
    pub min_overlap: u32,

    /// A challenged contig survives if its length is at least this fraction
    /// of the champion's length (and the score safeguard also holds)
    pub size_safeguard_ratio: f64,

    /// A challenged contig survives if its normalised score is at least this
    /// fraction of the champion's (and the size safeguard also holds)
    pub score_safeguard_ratio: f64,

    /// Distance separating same-haplotype from distinct contig pairs.
    /// When unset, estimated from the co-located pair distribution.
    pub distance_threshold: Option<f64>,

    /// Skip the unaligned screen and discard every unaligned contig
    pub aligned_only: bool,

    /// Hard cap on tournament rounds per locus and on rescue passes
    pub max_tournament_iterations: u64,

    /// Number of worker threads; affects scheduling only, never results
    pub num_threads: usize,

    /// Memory gate in bytes; loading more than this is a pre-flight error
    pub memory_limit: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_mapping_quality: 20,
            min_overlap: 1,
            size_safeguard_ratio: 0.50,
            score_safeguard_ratio: 0.90,
            distance_threshold: None,
            aligned_only: false,
            max_tournament_iterations: 100_000,
            num_threads: num_cpus::get().max(1),
            memory_limit: None,
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Example
    /// ```
    /// use purga::Config;
    ///
    /// let config = Config::builder()
    ///     .min_mapping_quality(30)
    ///     .distance_threshold(0.05)
    ///     .num_threads(4)
    ///     .build();
    /// ```
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration before any input is read.
    ///
    /// # Errors
    /// Returns [`PurgaError::InvalidConfig`] for out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        if let Some(tau) = self.distance_threshold {
            if !(0.0..=1.0).contains(&tau) || !tau.is_finite() {
                return Err(PurgaError::InvalidConfig(format!(
                    "distance_threshold must be within [0, 1], got {tau}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.size_safeguard_ratio) {
            return Err(PurgaError::InvalidConfig(format!(
                "size_safeguard_ratio must be within [0, 1], got {}",
                self.size_safeguard_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.score_safeguard_ratio) {
            return Err(PurgaError::InvalidConfig(format!(
                "score_safeguard_ratio must be within [0, 1], got {}",
                self.score_safeguard_ratio
            )));
        }
        if self.max_tournament_iterations == 0 {
            return Err(PurgaError::InvalidConfig(
                "max_tournament_iterations must be positive".to_string(),
            ));
        }
        if self.num_threads == 0 {
            return Err(PurgaError::InvalidConfig(
                "num_threads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing Config instances.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the minimum mapping quality.
    ///
    /// Alignments with lower quality are dropped when the store is built.
    /// Default: 20
    pub fn min_mapping_quality(mut self, mq: u8) -> Self {
        self.config.min_mapping_quality = mq;
        self
    }

    /// Sets the minimum overlap in bases for tiling rejection and locus
    /// grouping.
    ///
    /// Default: 1
    pub fn min_overlap(mut self, bases: u32) -> Self {
        self.config.min_overlap = bases;
        self
    }

    /// Sets the size safeguard ratio.
    ///
    /// Default: 0.50
    pub fn size_safeguard_ratio(mut self, ratio: f64) -> Self {
        self.config.size_safeguard_ratio = ratio;
        self
    }

    /// Sets the score safeguard ratio.
    ///
    /// Default: 0.90
    pub fn score_safeguard_ratio(mut self, ratio: f64) -> Self {
        self.config.score_safeguard_ratio = ratio;
        self
    }

    /// Supplies a fixed distance threshold, bypassing estimation.
    ///
    /// Default: None (estimate from co-located pair distances)
    pub fn distance_threshold(mut self, tau: f64) -> Self {
        self.config.distance_threshold = Some(tau);
        self
    }

    /// Discard every contig without a primary locus instead of screening
    /// them against the kept set.
    ///
    /// Default: false
    pub fn aligned_only(mut self, enabled: bool) -> Self {
        self.config.aligned_only = enabled;
        self
    }

    /// Sets the hard cap on tournament rounds and rescue passes.
    ///
    /// Default: 100,000
    pub fn max_tournament_iterations(mut self, iters: u64) -> Self {
        self.config.max_tournament_iterations = iters;
        self
    }

    /// Sets the number of worker threads.
    ///
    /// Default: Number of CPU cores
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Sets the memory gate in bytes.
    ///
    /// Default: None
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.config.memory_limit = Some(bytes);
        self
    }

    /// Builds the final Config instance.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::builder()
            .min_mapping_quality(30)
            .min_overlap(50)
            .distance_threshold(0.05)
            .aligned_only(true)
            .num_threads(2)
            .build();

        assert_eq!(config.min_mapping_quality, 30);
        assert_eq!(config.min_overlap, 50);
        assert_eq!(config.distance_threshold, Some(0.05));
        assert!(config.aligned_only);
        assert_eq!(config.num_threads, 2);
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        let config = Config::builder().distance_threshold(1.5).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_iterations() {
        let config = Config::builder().max_tournament_iterations(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
