//! Parallel image filtering and distortion scoring.
//!
//! The pipeline owns the reference image and a windowed view of the probe
//! image, and turns a filter circuit into a scalar fitness: filter every
//! window, then score the output against the reference with a peak
//! signal-to-noise measure. Predictors reuse the same scoring restricted to
//! their sample subset.

use rayon::prelude::*;

use super::ga::Fitness;
use super::predictor::PredGene;
use crate::image::{ImagePlane, WINDOW_SIZE, Window, split_windows};

/// An opaque filter circuit: maps one window's input vector to an output
/// sample. Implementations must be callable per-sample with no shared
/// mutable state.
pub trait Filter: Send + Sync {
    fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8;
}

/// Evaluation context shared by both populations: the reference image, the
/// windowed probe image and the worker count.
///
/// Constructed once per run and passed by reference everywhere, so several
/// contexts can coexist in one process.
pub struct FitnessCtx {
    original: ImagePlane,
    windows: Vec<Window>,
    workers: usize,
}

impl FitnessCtx {
    /// Build a context from a reference image and a same-shaped probe image.
    ///
    /// Shape equality is a precondition; violating it is a contract failure.
    pub fn new(original: ImagePlane, probe: &ImagePlane) -> Self {
        assert_eq!(
            (original.width(), original.height()),
            (probe.width(), probe.height()),
            "reference and probe images must have the same shape"
        );
        let windows = split_windows(probe);
        let workers = rayon::current_num_threads().max(1);
        Self {
            original,
            windows,
            workers,
        }
    }

    /// Number of samples in the fitness domain.
    pub fn domain_size(&self) -> usize {
        self.windows.len()
    }

    /// The reference image.
    pub fn original(&self) -> &ImagePlane {
        &self.original
    }

    /// Apply a filter to every window of the probe image.
    ///
    /// The domain is partitioned into contiguous per-worker ranges; each
    /// worker writes a disjoint region of the output buffer, so no locking
    /// is needed and the caller only ever observes the fully joined result.
    pub fn filter_image<F: Filter + ?Sized>(&self, filter: &F) -> ImagePlane {
        let mut filtered = ImagePlane::new(self.original.width(), self.original.height());
        let chunk = self.windows.len().div_ceil(self.workers).max(1);
        filtered
            .pixels_mut()
            .par_chunks_mut(chunk)
            .zip(self.windows.par_chunks(chunk))
            .for_each(|(out, windows)| {
                for (pixel, window) in out.iter_mut().zip(windows) {
                    *pixel = filter.output(&window.inputs);
                }
            });
        filtered
    }

    /// Authoritative fitness: filter the probe image and score it against
    /// the reference. Expensive; higher is better.
    pub fn eval_true_fitness<F: Filter + ?Sized>(&self, filter: &F) -> Fitness {
        psnr(&self.original, &self.filter_image(filter))
    }

    /// Predicted fitness: the same distortion score restricted to a
    /// predictor's sample positions. Cheap; higher is better.
    pub fn eval_predicted<F: Filter + ?Sized>(&self, filter: &F, phenotype: &[PredGene]) -> Fitness {
        if phenotype.is_empty() {
            return 0.0;
        }
        let coef = 255.0 * 255.0 * phenotype.len() as f64;
        let mut sum = 0.0;
        for &index in phenotype {
            let window = &self.windows[index as usize];
            let diff = filter.output(&window.inputs) as f64
                - self.original.get(window.x, window.y) as f64;
            sum += diff * diff;
        }
        coef / sum
    }
}

/// Peak signal-to-noise score: `255^2 * n / sum of squared differences`.
/// The higher the value, the better the filter.
pub fn psnr(original: &ImagePlane, filtered: &ImagePlane) -> Fitness {
    assert_eq!(
        (original.width(), original.height()),
        (filtered.width(), filtered.height()),
        "images must have the same shape"
    );
    let coef = 255.0 * 255.0 * original.len() as f64;
    let sum: f64 = original
        .pixels()
        .iter()
        .zip(filtered.pixels())
        .map(|(&a, &b)| {
            let diff = a as f64 - b as f64;
            diff * diff
        })
        .sum();
    coef / sum
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl Filter for Passthrough {
        fn output(&self, inputs: &[u8; WINDOW_SIZE]) -> u8 {
            inputs[4]
        }
    }

    struct Constant(u8);

    impl Filter for Constant {
        fn output(&self, _inputs: &[u8; WINDOW_SIZE]) -> u8 {
            self.0
        }
    }

    fn gradient(width: usize, height: usize) -> ImagePlane {
        let mut img = ImagePlane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, ((3 * x + 7 * y) % 256) as u8);
            }
        }
        img
    }

    #[test]
    fn test_filter_image_passthrough_reproduces_probe() {
        let original = gradient(17, 9);
        let mut probe = original.clone();
        probe.set(4, 2, 250);
        probe.set(16, 8, 0);

        let ctx = FitnessCtx::new(original, &probe);
        let filtered = ctx.filter_image(&Passthrough);
        assert_eq!(filtered, probe);
    }

    #[test]
    fn test_psnr_known_value() {
        // One pixel off by one: score = 255^2 * n / 1.
        let original = ImagePlane::new(2, 2);
        let mut filtered = ImagePlane::new(2, 2);
        filtered.set(1, 1, 1);
        let score = psnr(&original, &filtered);
        assert_eq!(score, 255.0 * 255.0 * 4.0);
    }

    #[test]
    fn test_psnr_identical_images_is_infinite() {
        let img = gradient(4, 4);
        assert!(psnr(&img, &img.clone()).is_infinite());
    }

    #[test]
    fn test_eval_true_fitness_composes() {
        let original = gradient(8, 8);
        let probe = original.clone();
        let ctx = FitnessCtx::new(original, &probe);
        // Passthrough on an undistorted probe reproduces the reference.
        assert!(ctx.eval_true_fitness(&Passthrough).is_infinite());
        // A constant filter scores strictly worse.
        assert!(ctx.eval_predicted(&Constant(0), &[0, 1, 2]) < f64::INFINITY);
    }

    #[test]
    fn test_eval_predicted_matches_subset() {
        let original = gradient(4, 4);
        let probe = original.clone();
        let ctx = FitnessCtx::new(original.clone(), &probe);

        // Constant-zero filter: error at window i is original[i]^2.
        let phenotype = [0u32, 5, 10];
        let expected_sum: f64 = phenotype
            .iter()
            .map(|&i| {
                let v = original.pixels()[i as usize] as f64;
                v * v
            })
            .sum();
        let expected = 255.0 * 255.0 * 3.0 / expected_sum;
        let got = ctx.eval_predicted(&Constant(0), &phenotype);
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn test_eval_predicted_empty_phenotype() {
        let img = gradient(4, 4);
        let ctx = FitnessCtx::new(img.clone(), &img);
        assert_eq!(ctx.eval_predicted(&Passthrough, &[]), 0.0);
    }

    #[test]
    #[should_panic(expected = "same shape")]
    fn test_shape_mismatch_is_contract_failure() {
        FitnessCtx::new(ImagePlane::new(4, 4), &ImagePlane::new(4, 5));
    }
}
