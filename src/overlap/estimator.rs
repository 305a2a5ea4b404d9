//! Bennett ratio estimate from a reference and a target accumulator.

use super::accumulator::{ChainRole, OverlapAccumulator};
use crate::error::{Error, Result};

/// Combines the two chains' overlap averages into `Z_target / Z_reference`.
#[derive(Clone, Copy, Debug)]
pub struct OverlapEstimator<'a> {
    reference: &'a OverlapAccumulator,
    target: &'a OverlapAccumulator,
}

impl<'a> OverlapEstimator<'a> {
    pub fn new(reference: &'a OverlapAccumulator, target: &'a OverlapAccumulator) -> Result<Self> {
        if reference.role() != ChainRole::Reference || target.role() != ChainRole::Target {
            return Err(Error::Config(format!(
                "overlap estimator needs a reference and a target accumulator, got {} and {}",
                reference.role(),
                target.role()
            )));
        }
        if reference.alphas() != target.alphas() {
            return Err(Error::Config("reference and target accumulators use different Bennett grids".into()));
        }
        Ok(Self { reference, target })
    }

    pub fn n_points(&self) -> usize {
        self.reference.n_points()
    }

    pub fn alpha(&self, i: usize) -> f64 {
        self.reference.alpha(i)
    }

    /// `⟨v⟩_reference / ⟨v⟩_target` at grid point `i`.
    pub fn ratio(&self, i: usize) -> f64 {
        self.reference.average(i) / self.target.average(i)
    }

    /// Uncertainty of [`Self::ratio`] with the two chains treated as independent.
    pub fn error(&self, i: usize) -> f64 {
        let (r, e_r) = (self.reference.average(i), self.reference.error(i));
        let (t, e_t) = (self.target.average(i), self.target.error(i));
        self.ratio(i).abs() * ((e_r / r).powi(2) + (e_t / t).powi(2)).sqrt()
    }

    /// Grid point whose α is closest to self-consistent, minimising
    /// `r/α + α/r - 2`. Points with an undefined ratio are skipped.
    pub fn min_diff_location(&self) -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for i in 0..self.n_points() {
            let r = self.ratio(i);
            let alpha = self.alpha(i);
            let diff = r / alpha + alpha / r - 2.0;
            if diff < best_diff {
                best_diff = diff;
                best = i;
            }
        }
        best
    }

    /// Ratio at the best grid point, the next α to use.
    pub fn refined_alpha(&self) -> f64 {
        self.ratio(self.min_diff_location())
    }

    /// Ratio and error at the best grid point.
    pub fn overlap_average_and_error(&self) -> (f64, f64) {
        let loc = self.min_diff_location();
        (self.ratio(loc), self.error(loc))
    }

    /// α where `ln(r/α)` crosses zero, interpolated linearly in `ln α`
    /// between neighbouring grid points. `None` if there is no crossing.
    pub fn self_consistent_alpha(&self) -> Option<f64> {
        let g = |i: usize| (self.ratio(i) / self.alpha(i)).ln();
        (1..self.n_points()).find_map(|i| {
            let (g0, g1) = (g(i - 1), g(i));
            if !(g0.is_finite() && g1.is_finite()) || g0.signum() == g1.signum() {
                return None;
            }
            let (a0, a1) = (self.alpha(i - 1).ln(), self.alpha(i).ln());
            Some((a0 - g0 * (a1 - a0) / (g1 - g0)).exp())
        })
    }

    /// Fraction of steps the reference chain should take to minimise the
    /// ratio error at grid point `i`, given the errors seen so far.
    ///
    /// A chain with no spread needs no steps; with no spread on either side
    /// the steps are split evenly.
    pub fn ideal_reference_fraction(&self, i: usize) -> f64 {
        let rel_r = self.reference.error(i) / self.reference.average(i) * (self.reference.count() as f64).sqrt();
        let rel_t = self.target.error(i) / self.target.average(i) * (self.target.count() as f64).sqrt();
        if rel_r == 0.0 && rel_t == 0.0 {
            return 0.5;
        }
        rel_r / (rel_r + rel_t)
    }
}

/// Reject α values that cannot be used.
pub fn validate_alpha(alpha: f64, phase: &'static str) -> Result<f64> {
    if alpha.is_nan() || alpha == 0.0 || alpha.is_infinite() {
        return Err(Error::BennettParameter { value: alpha, phase });
    }
    Ok(alpha)
}
