//! coevo-filter CLI - evolve an image filter against a noisy probe image.
//!
//! Runs the coevolution engine on a synthetic reference/noisy image pair
//! with a simple 3x3 weighted-kernel circuit standing in for an external
//! filter representation.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rand::prelude::*;
use rand::rngs::StdRng;

use coevo_filter::{
    evolve::{CoevolutionEngine, EvolveError, Filter, Fitness, FitnessCtx, GenomeOps},
    image::{ImagePlane, WINDOW_SIZE},
    schema::CoevolutionConfig,
};

/// Demo circuit: non-negative integer weights over the 3x3 window,
/// normalized by the weight sum.
#[derive(Debug, Clone)]
struct KernelFilter {
    weights: [u8; WINDOW_SIZE],
}

impl Filter for KernelFilter {
    fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8 {
        let mut acc = 0u32;
        let mut norm = 0u32;
        for (&weight, &pixel) in self.weights.iter().zip(inputs) {
            acc += weight as u32 * pixel as u32;
            norm += weight as u32;
        }
        if norm == 0 {
            inputs[4]
        } else {
            (acc / norm).min(255) as u8
        }
    }
}

/// 1+lambda style operations for the demo circuit: every non-best slot is a
/// mutant of the current best.
struct KernelOps {
    ctx: Arc<FitnessCtx>,
    mutated_weights: usize,
}

impl GenomeOps for KernelOps {
    type Genome = KernelFilter;

    fn alloc(&self) -> Result<KernelFilter, EvolveError> {
        Ok(KernelFilter {
            weights: [0; WINDOW_SIZE],
        })
    }

    fn randomize(&self, genome: &mut KernelFilter, rng: &mut StdRng) {
        for weight in &mut genome.weights {
            *weight = rng.gen_range(0..=8);
        }
    }

    fn fitness(&self, genome: &KernelFilter) -> Fitness {
        self.ctx.eval_true_fitness(genome)
    }

    fn offspring(
        &self,
        pop: &mut coevo_filter::evolve::Population<Self>,
        rng: &mut StdRng,
    ) {
        let best = pop.best_index();
        let (parents, children) = pop.split();
        let parent = parents[best].clone();
        for (i, child) in children.iter_mut().enumerate() {
            if i == best {
                *child = parent.clone();
            } else {
                child.genome = parent.genome.clone();
                for _ in 0..self.mutated_weights {
                    let pos = rng.gen_range(0..WINDOW_SIZE);
                    child.genome.weights[pos] = rng.gen_range(0..=8);
                }
                child.fitness = 0.0;
                child.has_fitness = false;
            }
        }
        pop.swap_generations();
    }
}

/// Synthetic demo pair: a smooth reference and the same image with
/// impulse noise.
fn demo_images(width: usize, height: usize, seed: u64) -> (ImagePlane, ImagePlane) {
    let mut original = ImagePlane::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = (x * 255 / width.max(1) + y * 255 / height.max(1)) / 2;
            original.set(x, y, value as u8);
        }
    }

    let mut noisy = original.clone();
    let mut rng = StdRng::seed_from_u64(seed);
    for y in 0..height {
        for x in 0..width {
            if rng.gen_bool(0.05) {
                noisy.set(x, y, if rng.gen_bool(0.5) { 0 } else { 255 });
            }
        }
    }

    (original, noisy)
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--help" {
        eprintln!("Usage: {} [config.json]", args[0]);
        eprintln!();
        eprintln!("Coevolve a 3x3 kernel filter and its fitness predictors on a");
        eprintln!("synthetic noisy image. Without arguments the default");
        eprintln!("configuration is used.");
        eprintln!();
        eprintln!("Example configuration is printed with the --example flag.");
        std::process::exit(1);
    }

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let config: CoevolutionConfig = if args.len() > 1 {
        let config_path = PathBuf::from(&args[1]);
        let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
            eprintln!("Error reading config file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Error parsing config: {}", e);
            std::process::exit(1);
        })
    } else {
        let mut config = CoevolutionConfig::default();
        config.max_generations = 500;
        config
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let (original, noisy) = demo_images(128, 128, config.random_seed.unwrap_or(42));
    let baseline = coevo_filter::evolve::psnr(&original, &noisy);

    println!("Coevolutionary Filter Search");
    println!("============================");
    println!(
        "Image: {}x{} ({} samples)",
        original.width(),
        original.height(),
        original.len()
    );
    println!("Algorithm: {:?}", config.algorithm);
    println!("Generations: {}", config.max_generations);
    println!("Baseline fitness (noisy vs reference): {:.3}", baseline);
    println!();

    let ctx = Arc::new(FitnessCtx::new(original, &noisy));
    let ops = Arc::new(KernelOps {
        ctx: Arc::clone(&ctx),
        mutated_weights: 2,
    });

    let mut engine = match CoevolutionEngine::new(config.clone(), ctx, ops) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error building engine: {}", e);
            std::process::exit(1);
        }
    };

    println!("Running...");
    let report_every = config.log_interval.max(1);
    let stats = engine.run_with_callback(|summary| {
        if summary.generation % report_every == 0 {
            println!(
                "  generation {}: best={:.3}, pred_err={}",
                summary.generation,
                summary.best_fitness,
                summary
                    .predictor_error
                    .map(|e| format!("{:.3}", e))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    });

    println!();
    println!("Finished: {:?}", stats.stop_reason);
    println!("  Generations: {}", stats.generations);
    println!("  Best fitness: {:.3}", stats.best_fitness);
    println!("  PSNR: {:.2} dB", 10.0 * stats.best_fitness.log10());
    println!("  True evaluations: {}", stats.true_evaluations);
    println!(
        "  Time: {:.2}s ({:.1} generations/s)",
        stats.elapsed_seconds,
        stats.generations as f64 / stats.elapsed_seconds.max(1e-9)
    );
}

fn print_example_config() {
    let config = CoevolutionConfig::default();
    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
