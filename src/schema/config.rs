//! Configuration types for coevolutionary filter search.

use serde::{Deserialize, Serialize};

fn default_max_generations() -> usize {
    50_000
}
fn default_log_interval() -> usize {
    20
}
fn default_baldwin_interval() -> usize {
    50
}
fn default_circuit_population() -> usize {
    8
}
fn default_archive_capacity() -> usize {
    10
}
fn default_pred_max_size() -> SizeSpec {
    SizeSpec(0.25)
}
fn default_pred_initial_size() -> SizeSpec {
    SizeSpec(0.1)
}
fn default_pred_mutation_rate() -> f64 {
    0.05
}
fn default_pred_population() -> usize {
    16
}
fn default_elite_fraction() -> f64 {
    0.25
}
fn default_crossover_fraction() -> f64 {
    0.5
}
fn default_circular_tries() -> usize {
    5
}

/// Top-level configuration for a coevolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoevolutionConfig {
    /// Evaluation strategy for the circuit population.
    #[serde(default)]
    pub algorithm: AlgorithmMode,
    /// Generation limit.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Stop early once the best true fitness reaches this value.
    #[serde(default)]
    pub target_fitness: Option<f64>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Circuit population settings.
    #[serde(default)]
    pub circuit: CircuitConfig,
    /// Predictor population settings.
    #[serde(default)]
    pub predictor: PredictorConfig,
    /// Generations between true-fitness syncs in baldwin mode.
    #[serde(default = "default_baldwin_interval")]
    pub baldwin_interval: usize,
    /// Generations between progress log lines.
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
}

impl Default for CoevolutionConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmMode::default(),
            max_generations: default_max_generations(),
            target_fitness: None,
            random_seed: None,
            circuit: CircuitConfig::default(),
            predictor: PredictorConfig::default(),
            baldwin_interval: default_baldwin_interval(),
            log_interval: default_log_interval(),
        }
    }
}

/// How circuit fitness is obtained each generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmMode {
    /// True fitness every generation, no predictors.
    Plain,
    /// Predicted fitness via the best predictor.
    #[default]
    Predictors,
    /// Predicted fitness with periodic true-fitness syncs that also adapt
    /// the predictor genome length.
    Baldwin,
}

/// Circuit population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Number of circuit chromosomes.
    #[serde(default = "default_circuit_population")]
    pub population_size: usize,
    /// Ring-buffer capacity of the solution archive.
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            population_size: default_circuit_population(),
            archive_capacity: default_archive_capacity(),
        }
    }
}

/// Predictor population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Maximum genome length, as a fraction of the sample domain or an
    /// absolute gene count (see [`SizeSpec`]).
    #[serde(default = "default_pred_max_size")]
    pub max_size: SizeSpec,
    /// Genome length used for fresh genomes, fraction or count.
    #[serde(default = "default_pred_initial_size")]
    pub initial_size: SizeSpec,
    /// Upper bound on the fraction of genes perturbed by one mutation.
    #[serde(default = "default_pred_mutation_rate")]
    pub mutation_rate: f64,
    /// Number of predictor chromosomes.
    #[serde(default = "default_pred_population")]
    pub population_size: usize,
    /// Fraction of slots reserved for elites each generation.
    #[serde(default = "default_elite_fraction")]
    pub elite_fraction: f64,
    /// Fraction of slots filled by crossover each generation.
    #[serde(default = "default_crossover_fraction")]
    pub crossover_fraction: f64,
    /// Genotype addressing mode.
    #[serde(default)]
    pub kind: PredictorGenomeKind,
    /// Subtype for the repeated genotype.
    #[serde(default)]
    pub subtype: RepeatedSubtype,
    /// Retry bound for duplicate collisions in circular derivation.
    #[serde(default = "default_circular_tries")]
    pub circular_tries: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_size: default_pred_max_size(),
            initial_size: default_pred_initial_size(),
            mutation_rate: default_pred_mutation_rate(),
            population_size: default_pred_population(),
            elite_fraction: default_elite_fraction(),
            crossover_fraction: default_crossover_fraction(),
            kind: PredictorGenomeKind::default(),
            subtype: RepeatedSubtype::default(),
            circular_tries: default_circular_tries(),
        }
    }
}

/// Predictor genotype addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorGenomeKind {
    /// Every gene is a distinct sample index.
    Permuted,
    /// Genes are stepped through periodically; duplicates may be dropped.
    #[default]
    Repeated,
}

/// Phenotype derivation subtype for the repeated genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatedSubtype {
    /// Derivation always starts at gene 0.
    #[default]
    Linear,
    /// Derivation starts at a mutable offset and retries on collisions.
    Circular,
}

/// A size given either as a fraction of the sample domain (values up to
/// [`SizeSpec::COUNT_THRESHOLD`]) or as an absolute count (values above it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeSpec(pub f64);

impl SizeSpec {
    /// Values at or below this threshold are fractions, values above it are
    /// absolute counts.
    pub const COUNT_THRESHOLD: f64 = 1.0;

    /// Resolve against a concrete domain size, clamped to `1..=domain_size`.
    pub fn resolve(self, domain_size: usize) -> usize {
        let count = if self.0 <= Self::COUNT_THRESHOLD {
            (self.0 * domain_size as f64).round() as usize
        } else {
            self.0.round() as usize
        };
        count.clamp(1, domain_size.max(1))
    }
}

/// Convert a target PSNR in decibels to a raw fitness value.
pub fn target_from_psnr_db(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

impl CoevolutionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_generations == 0 {
            return Err(ConfigError::ZeroGenerations);
        }
        if self.circuit.population_size == 0 {
            return Err(ConfigError::ZeroCircuitPopulation);
        }
        if self.circuit.archive_capacity == 0 {
            return Err(ConfigError::ZeroArchiveCapacity);
        }
        if self.predictor.population_size == 0 {
            return Err(ConfigError::ZeroPredictorPopulation);
        }
        if self.algorithm == AlgorithmMode::Baldwin && self.baldwin_interval == 0 {
            return Err(ConfigError::ZeroBaldwinInterval);
        }
        if self.algorithm == AlgorithmMode::Baldwin
            && self.predictor.kind == PredictorGenomeKind::Permuted
        {
            return Err(ConfigError::BaldwinRequiresRepeated);
        }

        for (name, value) in [
            ("mutation_rate", self.predictor.mutation_rate),
            ("elite_fraction", self.predictor.elite_fraction),
            ("crossover_fraction", self.predictor.crossover_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }

        for (name, value) in [
            ("max_size", self.predictor.max_size.0),
            ("initial_size", self.predictor.initial_size.0),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositiveSize { name, value });
            }
        }

        let size = self.predictor.population_size;
        let elite = (size as f64 * self.predictor.elite_fraction).ceil() as usize;
        let crossover = (size as f64 * self.predictor.crossover_fraction).ceil() as usize;
        if elite + crossover > size {
            return Err(ConfigError::OffspringTiersExceedPopulation {
                elite,
                crossover,
                size,
            });
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("generation limit must be non-zero")]
    ZeroGenerations,
    #[error("circuit population size must be non-zero")]
    ZeroCircuitPopulation,
    #[error("archive capacity must be non-zero")]
    ZeroArchiveCapacity,
    #[error("predictor population size must be non-zero")]
    ZeroPredictorPopulation,
    #[error("baldwin mode requires a non-zero sync interval")]
    ZeroBaldwinInterval,
    #[error("baldwin mode cannot be combined with the permuted genotype")]
    BaldwinRequiresRepeated,
    #[error("{name} must lie in [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
    #[error("{name} must be positive, got {value}")]
    NonPositiveSize { name: &'static str, value: f64 },
    #[error("elite ({elite}) and crossover ({crossover}) tiers exceed population size {size}")]
    OffspringTiersExceedPopulation {
        elite: usize,
        crossover: usize,
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_spec_fraction() {
        assert_eq!(SizeSpec(0.25).resolve(100), 25);
        assert_eq!(SizeSpec(1.0).resolve(200), 200);
        assert_eq!(SizeSpec(0.0001).resolve(100), 1);
    }

    #[test]
    fn test_size_spec_count() {
        assert_eq!(SizeSpec(12.0).resolve(100), 12);
        // Counts beyond the domain clamp to it.
        assert_eq!(SizeSpec(500.0).resolve(100), 100);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoevolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_offspring_tiers_checked() {
        let mut config = CoevolutionConfig::default();
        config.predictor.population_size = 10;
        config.predictor.elite_fraction = 0.2;
        config.predictor.crossover_fraction = 0.3;
        assert!(config.validate().is_ok());

        config.predictor.crossover_fraction = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OffspringTiersExceedPopulation { .. })
        ));
    }

    #[test]
    fn test_baldwin_rejects_permuted() {
        let mut config = CoevolutionConfig::default();
        config.algorithm = AlgorithmMode::Baldwin;
        config.predictor.kind = PredictorGenomeKind::Permuted;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BaldwinRequiresRepeated)
        ));
    }

    #[test]
    fn test_psnr_target_conversion() {
        let fitness = target_from_psnr_db(20.0);
        assert!((fitness - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = CoevolutionConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: CoevolutionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.predictor.population_size, config.predictor.population_size);
        assert_eq!(back.algorithm, config.algorithm);
    }
}
