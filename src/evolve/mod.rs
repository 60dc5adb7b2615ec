//! Evolution module - coevolution of filter circuits and fitness predictors.
//!
//! # Overview
//!
//! The coevolution machinery consists of:
//!
//! - **Population Container** (`ga`): Generic chromosome storage with a
//!   pluggable genome-operations trait
//! - **Solution Archive** (`archive`): Bounded ring buffer of notable
//!   solutions with reader/writer exclusion
//! - **Predictors** (`predictor`): Sampling-mask genomes and their
//!   evolutionary operators
//! - **Fitness Pipeline** (`fitness`): Parallel image filtering and
//!   distortion scoring
//! - **Engine** (`engine`): The outer loop alternating true and predicted
//!   fitness

mod archive;
mod engine;
mod fitness;
mod ga;
mod predictor;

pub use archive::{Archive, ArchiveReadGuard, ArchiveWriteGuard};
pub use engine::{CoevolutionEngine, CoevolutionStats, GenerationSummary, StopReason};
pub use fitness::{Filter, FitnessCtx, psnr};
pub use ga::{Chromosome, EvolveError, Fitness, GenomeOps, Objective, Population};
pub use predictor::{
    PredGene, PredictorGenome, PredictorOps, PredictorParams, dump_chromosome, dump_population,
};
