//! Fitness predictor genomes and their evolutionary operators.
//!
//! A predictor is a sampling mask over the fitness domain: its genotype is a
//! fixed-capacity sequence of unsigned genes, its phenotype an ordered set of
//! distinct sample indices derived from the active gene prefix. Predictors
//! are scored by how closely their cheap approximation tracks the true
//! fitness of archived circuits, and evolve through elitism, tournament
//! crossover and bounded mutation.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::prelude::*;
use rand::rngs::StdRng;

use super::archive::Archive;
use super::fitness::{Filter, FitnessCtx};
use super::ga::{Chromosome, EvolveError, Fitness, GenomeOps, Objective, Population};
use crate::schema::{PredictorConfig, PredictorGenomeKind, RepeatedSubtype};

/// A single gene: an index into the sample domain.
pub type PredGene = u32;

/// Tuning parameters shared by every predictor genome of one run.
#[derive(Debug, Clone)]
pub struct PredictorParams {
    /// Highest addressable sample index (inclusive).
    pub max_gene_value: PredGene,
    /// Gene buffer capacity.
    pub max_genome_length: usize,
    /// Active prefix length for freshly created genomes.
    pub initial_genome_length: usize,
    /// Upper bound on the fraction of genes perturbed by one mutation.
    pub mutation_rate: f64,
    /// Fraction of offspring slots reserved for elites.
    pub offspring_elite: f64,
    /// Fraction of offspring slots filled by crossover.
    pub offspring_combine: f64,
    /// Genotype addressing mode.
    pub kind: PredictorGenomeKind,
    /// Subtype for the repeated genotype.
    pub subtype: RepeatedSubtype,
    /// Retry bound for duplicate collisions in circular derivation.
    pub circular_tries: usize,
}

impl PredictorParams {
    /// Default bound on circular-derivation retries.
    pub const DEFAULT_CIRCULAR_TRIES: usize = 5;

    /// Resolve a predictor configuration against a concrete sample domain.
    pub fn from_config(config: &PredictorConfig, domain_size: usize) -> Result<Self, EvolveError> {
        if domain_size == 0 {
            return Err(EvolveError::EmptyDomain);
        }
        let params = Self {
            max_gene_value: (domain_size - 1) as PredGene,
            max_genome_length: config.max_size.resolve(domain_size),
            initial_genome_length: config.initial_size.resolve(domain_size),
            mutation_rate: config.mutation_rate,
            offspring_elite: config.elite_fraction,
            offspring_combine: config.crossover_fraction,
            kind: config.kind,
            subtype: config.subtype,
            circular_tries: config.circular_tries.max(1),
        };
        params.validate()?;
        Ok(params)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), EvolveError> {
        if self.initial_genome_length > self.max_genome_length {
            return Err(EvolveError::InitialLengthTooLarge {
                initial: self.initial_genome_length,
                max: self.max_genome_length,
            });
        }
        if self.kind == PredictorGenomeKind::Permuted && self.max_genome_length > self.domain() {
            return Err(EvolveError::GenomeLongerThanDomain {
                length: self.max_genome_length,
                domain: self.domain(),
            });
        }
        Ok(())
    }

    /// Number of addressable sample indices.
    fn domain(&self) -> usize {
        self.max_gene_value as usize + 1
    }

    fn random_gene(&self, rng: &mut StdRng) -> PredGene {
        rng.gen_range(0..=self.max_gene_value)
    }
}

/// A predictor chromosome's genome.
///
/// `genes[..used_genes]` is the logically active prefix; the remaining slots
/// are pre-generated but inert until the active length grows.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorGenome {
    /// Genotype, always `max_genome_length` long.
    pub genes: Vec<PredGene>,
    /// Length of the active prefix.
    pub used_genes: usize,
    /// Derived sample indices, all distinct.
    phenotype: Vec<PredGene>,
    /// Starting locus for the circular repeated subtype.
    circular_offset: usize,
}

impl PredictorGenome {
    fn alloc(params: &PredictorParams) -> Self {
        Self {
            genes: vec![0; params.max_genome_length],
            used_genes: 0,
            phenotype: Vec::new(),
            circular_offset: 0,
        }
    }

    /// The derived sample-index set.
    pub fn phenotype(&self) -> &[PredGene] {
        &self.phenotype
    }

    /// Number of samples the predictor actually reads.
    pub fn used_pixels(&self) -> usize {
        self.phenotype.len()
    }

    /// Reset to `length` active genes with every slot drawn uniformly.
    pub fn randomize(&mut self, params: &PredictorParams, length: usize, rng: &mut StdRng) {
        self.used_genes = length.min(params.max_genome_length);
        match params.kind {
            PredictorGenomeKind::Repeated => {
                for gene in &mut self.genes {
                    *gene = params.random_gene(rng);
                }
            }
            PredictorGenomeKind::Permuted => {
                // Rejection sampling; validate() guarantees the domain is at
                // least as large as the gene buffer.
                let mut used = vec![false; params.domain()];
                for gene in &mut self.genes {
                    loop {
                        let value = params.random_gene(rng);
                        if !used[value as usize] {
                            used[value as usize] = true;
                            *gene = value;
                            break;
                        }
                    }
                }
            }
        }
        self.derive_phenotype(params, rng);
    }

    /// Perturb at most `floor(mutation_rate * max_genome_length)` genes,
    /// each reset to a uniform random value, then re-derive the phenotype.
    pub fn mutate(&mut self, params: &PredictorParams, rng: &mut StdRng) {
        let max_changed = (params.mutation_rate * params.max_genome_length as f64) as usize;
        let count = rng.gen_range(0..=max_changed);
        match params.kind {
            PredictorGenomeKind::Repeated => {
                for _ in 0..count {
                    let pos = rng.gen_range(0..params.max_genome_length);
                    self.genes[pos] = params.random_gene(rng);
                }
            }
            PredictorGenomeKind::Permuted => {
                // Replacement values must not collide with any gene already
                // present. Replaced values stay marked; that only narrows the
                // draw pool within this call. A full-domain genome has no
                // unused values left to draw, so it is left untouched.
                if params.max_genome_length < params.domain() {
                    let mut used = vec![false; params.domain()];
                    for &gene in &self.genes {
                        used[gene as usize] = true;
                    }
                    for _ in 0..count {
                        let pos = rng.gen_range(0..params.max_genome_length);
                        loop {
                            let value = params.random_gene(rng);
                            if !used[value as usize] {
                                used[value as usize] = true;
                                self.genes[pos] = value;
                                break;
                            }
                        }
                    }
                }
            }
        }
        self.derive_phenotype(params, rng);
    }

    /// Overwrite this genome with a single-point crossover of two parents:
    /// prefix from `mom`, suffix from `dad`.
    ///
    /// The caller sets `used_genes` and mutates afterwards; the phenotype is
    /// re-derived then.
    pub fn crossover_from(
        &mut self,
        mom: &PredictorGenome,
        dad: &PredictorGenome,
        params: &PredictorParams,
        rng: &mut StdRng,
    ) {
        let split = rng.gen_range(0..params.max_genome_length);
        self.genes[..split].copy_from_slice(&mom.genes[..split]);
        self.genes[split..].copy_from_slice(&dad.genes[split..]);
    }

    /// Recompute the phenotype from the active gene prefix.
    pub fn derive_phenotype(&mut self, params: &PredictorParams, rng: &mut StdRng) {
        match params.kind {
            PredictorGenomeKind::Permuted => {
                // First `used_genes` values, duplicates dropped.
                let mut seen = vec![false; params.domain()];
                let mut out = Vec::with_capacity(self.used_genes);
                for &gene in &self.genes[..self.used_genes] {
                    if !seen[gene as usize] {
                        seen[gene as usize] = true;
                        out.push(gene);
                    }
                }
                self.phenotype = out;
            }
            PredictorGenomeKind::Repeated => match params.subtype {
                RepeatedSubtype::Linear => {
                    self.collect_cyclic(0, true, params);
                }
                RepeatedSubtype::Circular => {
                    for attempt in 1..=params.circular_tries {
                        // The final attempt accepts duplicates instead of
                        // retrying forever.
                        let accept_duplicates = attempt == params.circular_tries;
                        if self.collect_cyclic(self.circular_offset, accept_duplicates, params) {
                            return;
                        }
                        self.circular_offset = rng.gen_range(0..params.max_genome_length);
                    }
                }
            },
        }
    }

    /// Walk the gene buffer cyclically from `start`, collecting distinct
    /// positions until `used_genes` are gathered or the buffer is exhausted.
    ///
    /// Returns false on the first duplicate unless `accept_duplicates` is
    /// set, in which case duplicates are silently dropped.
    fn collect_cyclic(
        &mut self,
        start: usize,
        accept_duplicates: bool,
        params: &PredictorParams,
    ) -> bool {
        let mut seen = vec![false; params.domain()];
        let mut out = Vec::with_capacity(self.used_genes);
        for step in 0..params.max_genome_length {
            if out.len() == self.used_genes {
                break;
            }
            let gene = self.genes[(start + step) % params.max_genome_length];
            if !seen[gene as usize] {
                seen[gene as usize] = true;
                out.push(gene);
            } else if !accept_duplicates {
                return false;
            }
        }
        self.phenotype = out;
        true
    }
}

/// Slot production policy for one offspring generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotPlan {
    RandomMutant,
    Crossover,
    Elite,
}

/// Assign a production policy to every slot: elites are the repeatedly
/// found best-among-unclaimed, the crossover tier fills the first non-elite
/// slots, everything else becomes a random mutant.
pub(crate) fn offspring_plan<G>(
    objective: Objective,
    chromosomes: &[Chromosome<G>],
    elite_count: usize,
    crossover_count: usize,
) -> Vec<SlotPlan> {
    assert!(
        elite_count + crossover_count <= chromosomes.len(),
        "elite ({elite_count}) and crossover ({crossover_count}) tiers exceed population size {}",
        chromosomes.len()
    );

    let mut plan = vec![SlotPlan::RandomMutant; chromosomes.len()];

    for _ in 0..elite_count {
        let mut best: Option<(usize, Fitness)> = None;
        for (i, chr) in chromosomes.iter().enumerate() {
            if plan[i] == SlotPlan::Elite {
                continue;
            }
            let replace = match best {
                None => true,
                Some((_, fitness)) => objective.better(chr.fitness, fitness),
            };
            if replace {
                best = Some((i, chr.fitness));
            }
        }
        if let Some((i, _)) = best {
            plan[i] = SlotPlan::Elite;
        }
    }

    let mut assigned = 0;
    for slot in plan.iter_mut() {
        if assigned == crossover_count {
            break;
        }
        if *slot != SlotPlan::Elite {
            *slot = SlotPlan::Crossover;
            assigned += 1;
        }
    }

    plan
}

/// Two-way tournament: draw two uniform indices, keep the better-or-equal.
fn tournament<G>(chromosomes: &[Chromosome<G>], objective: Objective, rng: &mut StdRng) -> usize {
    let red = rng.gen_range(0..chromosomes.len());
    let blue = rng.gen_range(0..chromosomes.len());
    if objective.better_or_equal(chromosomes[red].fitness, chromosomes[blue].fitness) {
        red
    } else {
        blue
    }
}

/// Genome operations for the predictor population.
///
/// Predictor fitness is the mean absolute difference between predicted and
/// archived true fitness over the circuit archive, minimized.
pub struct PredictorOps<F> {
    params: PredictorParams,
    ctx: Arc<FitnessCtx>,
    archive: Arc<Archive<F>>,
    /// Active genome length for new genomes; grown or shrunk by the Baldwin
    /// schedule while elites keep their own `used_genes`.
    current_length: AtomicUsize,
}

impl<F> PredictorOps<F> {
    pub fn new(
        params: PredictorParams,
        ctx: Arc<FitnessCtx>,
        archive: Arc<Archive<F>>,
    ) -> Result<Self, EvolveError> {
        params.validate()?;
        let current_length = AtomicUsize::new(params.initial_genome_length);
        Ok(Self {
            params,
            ctx,
            archive,
            current_length,
        })
    }

    /// Shared tuning parameters.
    pub fn params(&self) -> &PredictorParams {
        &self.params
    }

    /// Genome length currently used for fresh and crossover genomes.
    pub fn genome_length(&self) -> usize {
        self.current_length.load(Ordering::Relaxed)
    }

    /// Set the genome length for subsequently produced genomes, clamped to
    /// `1..=max_genome_length`.
    pub fn set_genome_length(&self, length: usize) {
        let clamped = length.clamp(1, self.params.max_genome_length);
        self.current_length.store(clamped, Ordering::Relaxed);
    }
}

impl<F: Filter + Clone> GenomeOps for PredictorOps<F> {
    type Genome = PredictorGenome;

    fn alloc(&self) -> Result<PredictorGenome, EvolveError> {
        Ok(PredictorGenome::alloc(&self.params))
    }

    fn randomize(&self, genome: &mut PredictorGenome, rng: &mut StdRng) {
        genome.randomize(&self.params, self.genome_length(), rng);
    }

    fn fitness(&self, genome: &PredictorGenome) -> Fitness {
        let archive = self.archive.read();
        if archive.is_empty() {
            // Nothing to rank against yet; the engine seeds the archive
            // before the first predictor evaluation.
            return 0.0;
        }
        let mut total = 0.0;
        for chr in archive.iter() {
            let predicted = self.ctx.eval_predicted(&chr.genome, genome.phenotype());
            total += (predicted - chr.fitness).abs();
        }
        total / archive.len() as f64
    }

    fn offspring(&self, pop: &mut Population<Self>, rng: &mut StdRng) {
        let size = pop.size();
        let elite_count = (size as f64 * self.params.offspring_elite).ceil() as usize;
        let crossover_count = (size as f64 * self.params.offspring_combine).ceil() as usize;
        let objective = pop.objective();
        let length = self.genome_length();

        let plan = offspring_plan(objective, pop.chromosomes(), elite_count, crossover_count);

        let (parents, children) = pop.split();
        for (i, child) in children.iter_mut().enumerate() {
            match plan[i] {
                SlotPlan::Elite => {
                    *child = parents[i].clone();
                }
                SlotPlan::Crossover => {
                    let mom = tournament(parents, objective, rng);
                    let dad = tournament(parents, objective, rng);
                    child.genome.crossover_from(
                        &parents[mom].genome,
                        &parents[dad].genome,
                        &self.params,
                        rng,
                    );
                    child.genome.used_genes = length;
                    child.genome.mutate(&self.params, rng);
                    child.fitness = 0.0;
                    child.has_fitness = false;
                }
                SlotPlan::RandomMutant => {
                    child.genome.randomize(&self.params, length, rng);
                    child.fitness = 0.0;
                    child.has_fitness = false;
                }
            }
        }

        pop.swap_generations();
    }
}

/// Write a one-line summary of a predictor chromosome.
pub fn dump_chromosome<W: io::Write>(
    chr: &Chromosome<PredictorGenome>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(
        out,
        "{} used genes, {} sampled pixels",
        chr.genome.used_genes,
        chr.genome.used_pixels()
    )
}

/// Write a human-readable summary of a predictor population.
pub fn dump_population<F: Filter + Clone, W: io::Write>(
    pop: &Population<PredictorOps<F>>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "generation: {}", pop.generation())?;
    writeln!(out, "best chromosome: {}", pop.best_index())?;
    writeln!(out, "chromosomes: {}", pop.size())?;
    for chr in pop.chromosomes() {
        dump_chromosome(chr, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImagePlane, WINDOW_SIZE};
    use proptest::prelude::*;

    #[derive(Clone)]
    struct Center;

    impl Filter for Center {
        fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8 {
            inputs[4]
        }
    }

    fn params(kind: PredictorGenomeKind, subtype: RepeatedSubtype) -> PredictorParams {
        PredictorParams {
            max_gene_value: 63,
            max_genome_length: 16,
            initial_genome_length: 8,
            mutation_rate: 0.25,
            offspring_elite: 0.2,
            offspring_combine: 0.3,
            kind,
            subtype,
            circular_tries: PredictorParams::DEFAULT_CIRCULAR_TRIES,
        }
    }

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn has_duplicates(values: &[PredGene]) -> bool {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted.windows(2).any(|w| w[0] == w[1])
    }

    #[test]
    fn test_randomize_sets_initial_length() {
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Linear);
        let mut genome = PredictorGenome::alloc(&p);
        genome.randomize(&p, p.initial_genome_length, &mut rng(1));
        assert_eq!(genome.used_genes, 8);
        assert!(genome.used_pixels() <= genome.used_genes);
        assert!(genome.genes.iter().all(|&g| g <= p.max_gene_value));
    }

    #[test]
    fn test_crossover_structure() {
        // Before mutation, every gene left of the split comes from the
        // mother and every gene at or right of it from the father.
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Linear);
        let mom = PredictorGenome {
            genes: vec![1; p.max_genome_length],
            used_genes: 8,
            phenotype: Vec::new(),
            circular_offset: 0,
        };
        let dad = PredictorGenome {
            genes: vec![2; p.max_genome_length],
            used_genes: 8,
            phenotype: Vec::new(),
            circular_offset: 0,
        };

        for seed in 0..32 {
            let mut child = PredictorGenome::alloc(&p);
            child.crossover_from(&mom, &dad, &p, &mut rng(seed));
            let split = child.genes.iter().position(|&g| g == 2).unwrap_or(16);
            assert!(child.genes[..split].iter().all(|&g| g == 1));
            assert!(child.genes[split..].iter().all(|&g| g == 2));
        }
    }

    #[test]
    fn test_circular_accepts_duplicate_after_bounded_retries() {
        // Every gene carries the same value, so every candidate offset
        // collides; the final attempt must accept the duplicate instead of
        // looping forever.
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Circular);
        let mut genome = PredictorGenome {
            genes: vec![7; p.max_genome_length],
            used_genes: 4,
            phenotype: Vec::new(),
            circular_offset: 0,
        };
        genome.derive_phenotype(&p, &mut rng(3));
        assert_eq!(genome.phenotype(), &[7]);
        assert!(genome.used_pixels() < genome.used_genes);
    }

    #[test]
    fn test_circular_keeps_offset_when_collision_free() {
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Circular);
        let mut genome = PredictorGenome {
            genes: (0..16).collect(),
            used_genes: 8,
            phenotype: Vec::new(),
            circular_offset: 5,
        };
        genome.derive_phenotype(&p, &mut rng(4));
        assert_eq!(genome.circular_offset, 5);
        assert_eq!(genome.phenotype(), &[5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_linear_drops_duplicates_and_keeps_collecting() {
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Linear);
        let mut genome = PredictorGenome {
            genes: vec![3, 3, 5, 5, 9, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 4],
            used_genes: 6,
            phenotype: Vec::new(),
            circular_offset: 0,
        };
        genome.derive_phenotype(&p, &mut rng(5));
        assert_eq!(genome.phenotype(), &[3, 5, 9, 1, 2, 0]);
    }

    #[test]
    fn test_offspring_plan_tier_counts() {
        // Population 10, elite fraction 0.2, crossover fraction 0.3:
        // exactly 2 elites, 3 crossover children, 5 random mutants.
        let chromosomes: Vec<Chromosome<u32>> = (0..10)
            .map(|i| Chromosome {
                genome: i,
                fitness: i as Fitness,
                has_fitness: true,
            })
            .collect();
        let plan = offspring_plan(Objective::Minimize, &chromosomes, 2, 3);

        let elites: Vec<usize> = (0..10).filter(|&i| plan[i] == SlotPlan::Elite).collect();
        let crossovers = plan.iter().filter(|&&s| s == SlotPlan::Crossover).count();
        let randoms = plan.iter().filter(|&&s| s == SlotPlan::RandomMutant).count();

        assert_eq!(elites, vec![0, 1]);
        assert_eq!(crossovers, 3);
        assert_eq!(randoms, 5);
    }

    #[test]
    #[should_panic(expected = "exceed population size")]
    fn test_offspring_plan_rejects_oversized_tiers() {
        let chromosomes: Vec<Chromosome<u32>> = (0..4)
            .map(|i| Chromosome {
                genome: i,
                fitness: i as Fitness,
                has_fitness: true,
            })
            .collect();
        offspring_plan(Objective::Minimize, &chromosomes, 3, 2);
    }

    #[test]
    fn test_offspring_elitism_exactness() {
        let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Linear);
        let ctx = Arc::new(FitnessCtx::new(ImagePlane::new(8, 8), &ImagePlane::new(8, 8)));
        let archive = Arc::new(Archive::<Center>::create(2, None).expect("archive"));
        let ops = Arc::new(PredictorOps::new(p, ctx, archive).expect("ops"));

        let mut r = rng(21);
        let mut pop =
            Population::new(10, Objective::Minimize, ops, &mut r).expect("population");
        pop.evaluate_with(|genome| genome.genes.iter().map(|&g| g as Fitness).sum());

        let mut ranked = pop.chromosomes().to_vec();
        ranked.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        let elites = &ranked[..2];

        pop.advance(&mut r);

        // The two best individuals reappear bit-identical, fitness intact.
        for elite in elites {
            assert!(pop.chromosomes().iter().any(|chr| chr == elite));
        }
        // Every non-elite slot was re-produced and awaits re-scoring.
        let unevaluated = pop.chromosomes().iter().filter(|c| !c.has_fitness).count();
        assert_eq!(unevaluated, 8);
    }

    #[test]
    fn test_tournament_prefers_better_or_equal() {
        let chromosomes: Vec<Chromosome<u32>> = [5.0, 1.0, 1.0, 1.0]
            .iter()
            .map(|&fitness| Chromosome {
                genome: 0,
                fitness,
                has_fitness: true,
            })
            .collect();
        let mut r = rng(9);
        let mut wins_for_worst = 0;
        for _ in 0..64 {
            let winner = tournament(&chromosomes, Objective::Minimize, &mut r);
            if chromosomes[winner].fitness == 5.0 {
                wins_for_worst += 1;
            }
        }
        // The worst individual only survives a draw against itself
        // (probability 1/16 per tournament).
        assert!(wins_for_worst < 16);
    }

    proptest! {
        #[test]
        fn prop_permuted_phenotype_never_repeats(seed in any::<u64>(), used in 1usize..=16) {
            let p = params(PredictorGenomeKind::Permuted, RepeatedSubtype::Linear);
            let mut r = StdRng::seed_from_u64(seed);

            let mut mom = PredictorGenome::alloc(&p);
            let mut dad = PredictorGenome::alloc(&p);
            mom.randomize(&p, used, &mut r);
            dad.randomize(&p, used, &mut r);
            prop_assert!(!has_duplicates(mom.phenotype()));
            prop_assert_eq!(mom.used_pixels(), used);

            // Crossover may introduce duplicate genes; derivation still
            // yields a duplicate-free phenotype.
            let mut child = PredictorGenome::alloc(&p);
            child.crossover_from(&mom, &dad, &p, &mut r);
            child.used_genes = used;
            child.mutate(&p, &mut r);
            prop_assert!(!has_duplicates(child.phenotype()));
        }

        #[test]
        fn prop_mutation_respects_bound(seed in any::<u64>()) {
            let p = params(PredictorGenomeKind::Repeated, RepeatedSubtype::Linear);
            let bound = (p.mutation_rate * p.max_genome_length as f64) as usize;
            let mut r = StdRng::seed_from_u64(seed);

            let mut genome = PredictorGenome::alloc(&p);
            genome.randomize(&p, p.initial_genome_length, &mut r);
            let before = genome.genes.clone();
            genome.mutate(&p, &mut r);

            let changed = before
                .iter()
                .zip(&genome.genes)
                .filter(|(a, b)| a != b)
                .count();
            prop_assert!(changed <= bound);
        }

        #[test]
        fn prop_repeated_phenotype_never_repeats(
            seed in any::<u64>(),
            circular in proptest::bool::ANY,
        ) {
            let subtype = if circular {
                RepeatedSubtype::Circular
            } else {
                RepeatedSubtype::Linear
            };
            let p = params(PredictorGenomeKind::Repeated, subtype);
            let mut r = StdRng::seed_from_u64(seed);
            let mut genome = PredictorGenome::alloc(&p);
            genome.randomize(&p, p.initial_genome_length, &mut r);
            prop_assert!(!has_duplicates(genome.phenotype()));
        }
    }
}
