//! Generic population container with pluggable genome operations.

use std::sync::Arc;

use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::ConfigError;

/// Scalar fitness value.
pub type Fitness = f64;

/// Whether lower or higher fitness wins.
///
/// Predictors minimize approximation error; circuits maximize signal quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    /// The fitness value every real score beats.
    pub fn worst(self) -> Fitness {
        match self {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    }

    /// True when `a` strictly beats `b`.
    pub fn better(self, a: Fitness, b: Fitness) -> bool {
        match self {
            Objective::Minimize => a < b,
            Objective::Maximize => a > b,
        }
    }

    /// True when `a` beats or ties `b`.
    pub fn better_or_equal(self, a: Fitness, b: Fitness) -> bool {
        self.better(a, b) || a == b
    }
}

/// One population slot: a genome plus its cached fitness.
#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome<G> {
    pub genome: G,
    pub fitness: Fitness,
    /// False until the genome is scored, and again after any change that
    /// invalidates the cached value.
    pub has_fitness: bool,
}

impl<G> Chromosome<G> {
    fn unevaluated(genome: G) -> Self {
        Self {
            genome,
            fitness: 0.0,
            has_fitness: false,
        }
    }
}

/// Errors from population and archive construction.
#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    #[error("population size must be non-zero")]
    EmptyPopulation,
    #[error("archive capacity must be non-zero")]
    ZeroCapacity,
    #[error("sample domain is empty")]
    EmptyDomain,
    #[error("initial genome length {initial} exceeds maximum {max}")]
    InitialLengthTooLarge { initial: usize, max: usize },
    #[error("permuted genome length {length} exceeds addressable domain {domain}")]
    GenomeLongerThanDomain { length: usize, domain: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Problem-specific genome operations plugged into a [`Population`].
///
/// One implementation exists per genome kind (circuit, predictor); the
/// container itself never inspects genomes.
pub trait GenomeOps: Send + Sync {
    type Genome: Clone + Send + Sync;

    /// Allocate an unscored genome for a population slot.
    fn alloc(&self) -> Result<Self::Genome, EvolveError>;

    /// Reinitialize a genome to random values.
    fn randomize(&self, genome: &mut Self::Genome, rng: &mut StdRng);

    /// Authoritative score for a genome.
    fn fitness(&self, genome: &Self::Genome) -> Fitness;

    /// Produce the next generation in `pop`'s scratch array and swap it in.
    ///
    /// The default keeps the current best slot intact and randomizes every
    /// other slot; genome kinds with real generational operators override
    /// this.
    fn offspring(&self, pop: &mut Population<Self>, rng: &mut StdRng)
    where
        Self: Sized,
    {
        let best = pop.best_index();
        let (parents, children) = pop.split();
        for (i, child) in children.iter_mut().enumerate() {
            if i == best {
                *child = parents[i].clone();
            } else {
                self.randomize(&mut child.genome, rng);
                child.fitness = 0.0;
                child.has_fitness = false;
            }
        }
        pop.swap_generations();
    }
}

/// A population of chromosomes plus a same-sized scratch generation.
///
/// Regenerated in place every generation: offspring are written into the
/// scratch array, then the two arrays are swapped without reallocation.
pub struct Population<O: GenomeOps> {
    ops: Arc<O>,
    objective: Objective,
    chromosomes: Vec<Chromosome<O::Genome>>,
    children: Vec<Chromosome<O::Genome>>,
    generation: usize,
    best_index: usize,
}

impl<O: GenomeOps> Population<O> {
    /// Allocate and randomize a population of the given size.
    pub fn new(
        size: usize,
        objective: Objective,
        ops: Arc<O>,
        rng: &mut StdRng,
    ) -> Result<Self, EvolveError> {
        if size == 0 {
            return Err(EvolveError::EmptyPopulation);
        }
        let mut chromosomes = Vec::with_capacity(size);
        let mut children = Vec::with_capacity(size);
        for _ in 0..size {
            let mut genome = ops.alloc()?;
            ops.randomize(&mut genome, rng);
            chromosomes.push(Chromosome::unevaluated(genome));
            children.push(Chromosome::unevaluated(ops.alloc()?));
        }
        Ok(Self {
            ops,
            objective,
            chromosomes,
            children,
            generation: 0,
            best_index: 0,
        })
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.chromosomes.len()
    }

    /// Completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Minimization/maximization convention of this population.
    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Current-generation chromosomes.
    pub fn chromosomes(&self) -> &[Chromosome<O::Genome>] {
        &self.chromosomes
    }

    /// Index of the best-scoring chromosome.
    pub fn best_index(&self) -> usize {
        self.best_index
    }

    /// The best-scoring chromosome.
    pub fn best(&self) -> &Chromosome<O::Genome> {
        &self.chromosomes[self.best_index]
    }

    /// Plugged-in genome operations.
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Score every unevaluated chromosome with the plugged-in fitness
    /// function, in parallel, then refresh the best index.
    pub fn evaluate(&mut self) {
        let ops = Arc::clone(&self.ops);
        self.chromosomes.par_iter_mut().for_each(|chr| {
            if !chr.has_fitness {
                chr.fitness = ops.fitness(&chr.genome);
                chr.has_fitness = true;
            }
        });
        self.refresh_best();
    }

    /// Score every unevaluated chromosome with a caller-supplied function
    /// (used to swap between true and predicted scoring).
    pub fn evaluate_with<F>(&mut self, score: F)
    where
        F: Fn(&O::Genome) -> Fitness + Sync,
    {
        self.chromosomes.par_iter_mut().for_each(|chr| {
            if !chr.has_fitness {
                chr.fitness = score(&chr.genome);
                chr.has_fitness = true;
            }
        });
        self.refresh_best();
    }

    /// Drop every cached fitness so the next evaluation re-scores all slots.
    ///
    /// Fitness values are kept for selection until then.
    pub fn invalidate(&mut self) {
        for chr in &mut self.chromosomes {
            chr.has_fitness = false;
        }
    }

    /// Run the plugged-in generational operator and bump the counter.
    pub fn advance(&mut self, rng: &mut StdRng) {
        let ops = Arc::clone(&self.ops);
        ops.offspring(self, rng);
        self.generation += 1;
    }

    /// Borrow the frozen parent generation and the writable scratch
    /// generation at once, for offspring production.
    pub fn split(&mut self) -> (&[Chromosome<O::Genome>], &mut [Chromosome<O::Genome>]) {
        (&self.chromosomes, &mut self.children)
    }

    /// Exchange the current and scratch generations (pointer swap, no copy).
    pub fn swap_generations(&mut self) {
        std::mem::swap(&mut self.chromosomes, &mut self.children);
    }

    fn refresh_best(&mut self) {
        let mut best = 0;
        for (i, chr) in self.chromosomes.iter().enumerate() {
            if self
                .objective
                .better(chr.fitness, self.chromosomes[best].fitness)
            {
                best = i;
            }
        }
        self.best_index = best;
    }
}
