//! Coevolution of image filters and fitness predictors.
//!
//! This crate implements a coevolutionary optimization engine: a primary
//! population of filter circuits is scored against a costly image-distortion
//! fitness function, while a secondary population of *predictors* (cheap
//! samplers that score a circuit on a small subset of pixels) evolves to
//! track the true fitness ranking as closely as possible.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration types and validation
//! - `image`: Grayscale pixel planes and windowed sample access
//! - `evolve`: The core machinery (population container, solution archive,
//!   predictor genomes, parallel fitness pipeline, coevolution engine)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use coevo_filter::{
//!     evolve::{CoevolutionEngine, Filter, FitnessCtx, GenomeOps},
//!     image::{ImagePlane, WINDOW_SIZE},
//!     schema::CoevolutionConfig,
//! };
//!
//! // A trivial circuit: pass the window's center pixel through.
//! #[derive(Clone)]
//! struct Passthrough;
//!
//! impl Filter for Passthrough {
//!     fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8 {
//!         inputs[4]
//!     }
//! }
//!
//! struct PassthroughOps(Arc<FitnessCtx>);
//!
//! impl GenomeOps for PassthroughOps {
//!     type Genome = Passthrough;
//!     fn alloc(&self) -> Result<Passthrough, coevo_filter::evolve::EvolveError> {
//!         Ok(Passthrough)
//!     }
//!     fn randomize(&self, _genome: &mut Passthrough, _rng: &mut rand::rngs::StdRng) {}
//!     fn fitness(&self, genome: &Passthrough) -> f64 {
//!         self.0.eval_true_fitness(genome)
//!     }
//! }
//!
//! let original = ImagePlane::new(64, 64);
//! let noisy = ImagePlane::new(64, 64);
//! let ctx = Arc::new(FitnessCtx::new(original, &noisy));
//! let ops = Arc::new(PassthroughOps(Arc::clone(&ctx)));
//!
//! let config = CoevolutionConfig::default();
//! let mut engine = CoevolutionEngine::new(config, ctx, ops).unwrap();
//! let stats = engine.run();
//!
//! println!("best fitness: {:.3}", stats.best_fitness);
//! ```

pub mod evolve;
pub mod image;
pub mod schema;

// Re-export commonly used types
pub use evolve::{
    Archive, Chromosome, CoevolutionEngine, CoevolutionStats, Filter, FitnessCtx, GenomeOps,
    Objective, Population,
};
pub use schema::{AlgorithmMode, CoevolutionConfig};
