//! Coevolution engine: the outer loop driving both populations.
//!
//! Each generation the circuit population is regenerated and scored, with
//! true fitness in plain mode and the best predictor's cheap approximation
//! otherwise. Any circuit that improves on the best-so-far true fitness
//! is copied into the archive. The predictor population then produces its
//! own next generation and is re-scored against the archive. In baldwin mode
//! the engine periodically syncs the circuit population back to true fitness
//! and adapts the predictor genome length.
//!
//! There is no cancellation: once a generation starts it runs to completion,
//! and stop conditions are only checked between generations.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;

use super::archive::Archive;
use super::fitness::{Filter, FitnessCtx};
use super::ga::{EvolveError, Fitness, GenomeOps, Objective, Population};
use super::predictor::{PredictorOps, PredictorParams, dump_population};
use crate::schema::{AlgorithmMode, CoevolutionConfig};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Generation limit reached.
    MaxGenerations,
    /// Target fitness reached.
    TargetReached,
}

/// Snapshot of one generation, for progress callbacks.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    /// Best true fitness found so far.
    pub best_fitness: Fitness,
    /// Best score in the circuit population under the current scoring.
    pub generation_best: Fitness,
    /// Best predictor's approximation error, if predictors are active.
    pub predictor_error: Option<Fitness>,
    /// Current predictor genome length, if predictors are active.
    pub predictor_length: Option<usize>,
    /// Number of solutions stored in the archive.
    pub archive_stored: usize,
}

/// Final statistics of a run.
#[derive(Debug, Clone, Serialize)]
pub struct CoevolutionStats {
    pub generations: usize,
    pub best_fitness: Fitness,
    /// Number of full (true-fitness) circuit evaluations performed.
    pub true_evaluations: u64,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Drives the coevolution of a circuit population and its predictors.
pub struct CoevolutionEngine<O: GenomeOps>
where
    O::Genome: Filter,
{
    config: CoevolutionConfig,
    ctx: Arc<FitnessCtx>,
    archive: Arc<Archive<O::Genome>>,
    circuits: Population<O>,
    predictors: Population<PredictorOps<O::Genome>>,
    pred_ops: Arc<PredictorOps<O::Genome>>,
    rng: StdRng,
    best_true: Fitness,
    last_sync_error: Fitness,
    true_evaluations: u64,
}

impl<O: GenomeOps> CoevolutionEngine<O>
where
    O::Genome: Filter,
{
    /// Build an engine from a validated configuration, a fitness context and
    /// the circuit genome operations.
    ///
    /// The circuit ops' `fitness` must be the authoritative (true) score;
    /// the engine substitutes predicted scoring where the algorithm mode
    /// calls for it.
    pub fn new(
        config: CoevolutionConfig,
        ctx: Arc<FitnessCtx>,
        circuit_ops: Arc<O>,
    ) -> Result<Self, EvolveError> {
        config.validate()?;

        let params = PredictorParams::from_config(&config.predictor, ctx.domain_size())?;

        let archive_ctx = Arc::clone(&ctx);
        let archive = Arc::new(Archive::create(
            config.circuit.archive_capacity,
            Some(Box::new(move |genome: &O::Genome| {
                archive_ctx.eval_true_fitness(genome)
            })),
        )?);

        let pred_ops = Arc::new(PredictorOps::new(
            params,
            Arc::clone(&ctx),
            Arc::clone(&archive),
        )?);

        let mut rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let circuits = Population::new(
            config.circuit.population_size,
            Objective::Maximize,
            circuit_ops,
            &mut rng,
        )?;
        let predictors = Population::new(
            config.predictor.population_size,
            Objective::Minimize,
            Arc::clone(&pred_ops),
            &mut rng,
        )?;

        Ok(Self {
            config,
            ctx,
            archive,
            circuits,
            predictors,
            pred_ops,
            rng,
            best_true: Objective::Maximize.worst(),
            last_sync_error: Objective::Minimize.worst(),
            true_evaluations: 0,
        })
    }

    /// The shared fitness context.
    pub fn ctx(&self) -> &FitnessCtx {
        &self.ctx
    }

    /// The solution archive.
    pub fn archive(&self) -> &Archive<O::Genome> {
        &self.archive
    }

    /// Best true fitness found so far.
    pub fn best_fitness(&self) -> Fitness {
        self.best_true
    }

    /// Run to completion.
    pub fn run(&mut self) -> CoevolutionStats {
        self.run_with_callback(|_| {})
    }

    /// Run to completion, invoking `callback` after initialization and after
    /// every generation.
    pub fn run_with_callback<C>(&mut self, callback: C) -> CoevolutionStats
    where
        C: Fn(&GenerationSummary),
    {
        let start = Instant::now();

        self.initialize();
        callback(&self.summary());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            self.step_generation();

            let generation = self.circuits.generation();
            if self.config.log_interval > 0 && generation % self.config.log_interval == 0 {
                log::info!(
                    "generation {}: best fitness {:.4}, predictor error {:.4}",
                    generation,
                    self.best_true,
                    self.predictors.best().fitness
                );
            }
            callback(&self.summary());
        };

        let elapsed = start.elapsed().as_secs_f64();
        CoevolutionStats {
            generations: self.circuits.generation(),
            best_fitness: self.best_true,
            true_evaluations: self.true_evaluations,
            elapsed_seconds: elapsed,
            stop_reason,
        }
    }

    /// Score the initial populations and seed the archive with the first
    /// best circuit so predictors have ground truth to rank against.
    fn initialize(&mut self) {
        self.circuits.evaluate();
        self.true_evaluations += self.circuits.size() as u64;

        let best = self.circuits.best().clone();
        self.best_true = best.fitness;
        self.archive.write().insert(&best);
        self.true_evaluations += 1;

        self.predictors.evaluate();
        self.last_sync_error = self.predictors.best().fitness;
    }

    fn step_generation(&mut self) {
        self.circuits.advance(&mut self.rng);
        let generation = self.circuits.generation();

        let use_true = match self.config.algorithm {
            AlgorithmMode::Plain => true,
            AlgorithmMode::Predictors => false,
            AlgorithmMode::Baldwin => generation % self.config.baldwin_interval == 0,
        };

        if use_true {
            // Alternation: the whole population is re-scored with the
            // authoritative fitness, elites included.
            self.circuits.invalidate();
            self.circuits.evaluate();
            self.true_evaluations += self.circuits.size() as u64;
        } else {
            let phenotype = self.predictors.best().genome.phenotype().to_vec();
            let ctx = Arc::clone(&self.ctx);
            self.circuits
                .evaluate_with(move |genome| ctx.eval_predicted(genome, &phenotype));
        }

        // Promote the generation's best circuit if its true fitness improves
        // on the best so far.
        let candidate = self.circuits.best().clone();
        let true_fitness = if use_true {
            candidate.fitness
        } else {
            self.true_evaluations += 1;
            self.ctx.eval_true_fitness(&candidate.genome)
        };
        if Objective::Maximize.better(true_fitness, self.best_true) {
            self.best_true = true_fitness;
            self.archive.write().insert(&candidate);
            self.true_evaluations += 1;
            log::debug!(
                "generation {}: new best true fitness {:.4}",
                generation,
                true_fitness
            );
            // The archive changed, so cached predictor scores are stale.
            self.predictors.invalidate();
        }

        if self.config.algorithm != AlgorithmMode::Plain {
            self.predictors.advance(&mut self.rng);
            self.predictors.evaluate();

            if self.config.algorithm == AlgorithmMode::Baldwin && use_true {
                self.baldwin_adapt();
            }
        }
    }

    /// Grow the predictor genome when prediction quality drifted since the
    /// last sync, shrink it when tracking holds.
    fn baldwin_adapt(&mut self) {
        let error = self.predictors.best().fitness;
        let length = self.pred_ops.genome_length();
        let step = (self.pred_ops.params().max_genome_length / 10).max(1);
        let target = if error > self.last_sync_error {
            length + step
        } else {
            length.saturating_sub(step)
        };
        self.pred_ops.set_genome_length(target);
        self.last_sync_error = error;
        log::debug!(
            "baldwin sync: predictor error {:.4}, genome length {} -> {}",
            error,
            length,
            self.pred_ops.genome_length()
        );
    }

    fn should_stop(&self) -> Option<StopReason> {
        if let Some(target) = self.config.target_fitness
            && self.best_true >= target
        {
            return Some(StopReason::TargetReached);
        }
        if self.circuits.generation() >= self.config.max_generations {
            return Some(StopReason::MaxGenerations);
        }
        None
    }

    /// Snapshot of the current state.
    pub fn summary(&self) -> GenerationSummary {
        let predictors_active = self.config.algorithm != AlgorithmMode::Plain;
        GenerationSummary {
            generation: self.circuits.generation(),
            best_fitness: self.best_true,
            generation_best: self.circuits.best().fitness,
            predictor_error: predictors_active.then(|| self.predictors.best().fitness),
            predictor_length: predictors_active.then(|| self.pred_ops.genome_length()),
            archive_stored: self.archive.read().len(),
        }
    }

    /// Write a human-readable snapshot of the run: best fitness, archive
    /// contents and the predictor population. Diagnostic only.
    pub fn dump_summary<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "generation: {}", self.circuits.generation())?;
        writeln!(out, "best fitness: {:.6}", self.best_true)?;
        writeln!(out, "true evaluations: {}", self.true_evaluations)?;

        let archive = self.archive.read();
        writeln!(out, "archive: {} stored", archive.len())?;
        for (i, chr) in archive.iter().enumerate() {
            writeln!(out, "  [{}] fitness {:.6}", i, chr.fitness)?;
        }
        drop(archive);

        writeln!(out, "predictors:")?;
        dump_population(&self.predictors, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImagePlane, WINDOW_SIZE};
    use std::io::Read;

    /// Test circuit: adds a signed offset to the window center.
    #[derive(Clone)]
    struct Shift(i16);

    impl Filter for Shift {
        fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8 {
            (inputs[4] as i16 + self.0).clamp(0, 255) as u8
        }
    }

    struct ShiftOps(Arc<FitnessCtx>);

    impl GenomeOps for ShiftOps {
        type Genome = Shift;

        fn alloc(&self) -> Result<Shift, EvolveError> {
            Ok(Shift(0))
        }

        fn randomize(&self, genome: &mut Shift, rng: &mut StdRng) {
            genome.0 = rng.gen_range(-16..=16);
        }

        fn fitness(&self, genome: &Shift) -> Fitness {
            self.0.eval_true_fitness(genome)
        }
    }

    fn test_ctx() -> Arc<FitnessCtx> {
        let mut original = ImagePlane::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                original.set(x, y, (20 * x + 5 * y) as u8);
            }
        }
        // The probe is the reference shifted up by a constant; Shift(-6)
        // recovers it exactly.
        let mut probe = original.clone();
        for y in 0..8 {
            for x in 0..8 {
                probe.set(x, y, probe.get(x, y).saturating_add(6));
            }
        }
        Arc::new(FitnessCtx::new(original, &probe))
    }

    fn test_config() -> CoevolutionConfig {
        let mut config = CoevolutionConfig::default();
        config.max_generations = 4;
        config.random_seed = Some(99);
        config.circuit.population_size = 6;
        config.circuit.archive_capacity = 3;
        config.predictor.population_size = 10;
        config.predictor.elite_fraction = 0.2;
        config.predictor.crossover_fraction = 0.3;
        config
    }

    fn test_engine(config: CoevolutionConfig) -> CoevolutionEngine<ShiftOps> {
        let ctx = test_ctx();
        let ops = Arc::new(ShiftOps(Arc::clone(&ctx)));
        CoevolutionEngine::new(config, ctx, ops).expect("engine")
    }

    #[test]
    fn test_run_predictors_mode() {
        let mut engine = test_engine(test_config());
        let stats = engine.run();

        assert_eq!(stats.generations, 4);
        assert_eq!(stats.stop_reason, StopReason::MaxGenerations);
        assert!(stats.best_fitness > 0.0);
        assert!(stats.true_evaluations > 0);
        assert!(!engine.archive().read().is_empty());
    }

    #[test]
    fn test_run_plain_mode() {
        let mut config = test_config();
        config.algorithm = AlgorithmMode::Plain;
        let mut engine = test_engine(config);

        let calls = std::cell::Cell::new(0usize);
        let stats = engine.run_with_callback(|_| calls.set(calls.get() + 1));
        assert_eq!(stats.generations, 4);
        // Initialization plus one callback per generation.
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn test_run_baldwin_mode_adapts_length() {
        let mut config = test_config();
        config.algorithm = AlgorithmMode::Baldwin;
        config.baldwin_interval = 2;
        config.max_generations = 6;
        let mut engine = test_engine(config);
        engine.run();
        // Three syncs happened; the shared length stays within its clamped
        // bounds.
        let length = engine.pred_ops.genome_length();
        assert!(length >= 1);
        assert!(length <= engine.pred_ops.params().max_genome_length);
    }

    #[test]
    fn test_target_fitness_stops_early() {
        let mut config = test_config();
        config.max_generations = 1000;
        config.target_fitness = Some(0.0);
        let mut engine = test_engine(config);
        let stats = engine.run();
        assert_eq!(stats.stop_reason, StopReason::TargetReached);
        assert_eq!(stats.generations, 0);
    }

    #[test]
    fn test_dump_summary() {
        let mut engine = test_engine(test_config());
        engine.run();

        let mut file = tempfile::tempfile().expect("tempfile");
        engine.dump_summary(&mut file).expect("dump");

        use std::io::Seek;
        file.rewind().expect("rewind");
        let mut text = String::new();
        file.read_to_string(&mut text).expect("read");
        assert!(text.contains("generation: 4"));
        assert!(text.contains("archive:"));
        assert!(text.contains("used genes"));
    }
}
