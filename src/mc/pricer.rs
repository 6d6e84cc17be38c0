//! Path-based European option pricing over any [`Model`].
//!
//! The pricer discounts the average terminal payoff over `num_paths`
//! simulated paths. Every path runs on an independent model forked through
//! [`Model::with_seed`] with a seed derived from the base seed and the path
//! index, so estimates are reproducible and identical whether paths run
//! serially or on the Rayon pool (`parallel` feature).
//!
//! Unlike the analytic fallback on [`JumpDiffusionModel`], pricing here is
//! consistent with the model's own dynamics, jumps included.
//!
//! [`JumpDiffusionModel`]: crate::models::JumpDiffusionModel

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::{OptionType, RiskError};
use crate::models::Model;

// Weyl increment (golden-ratio fraction of 2^64) spreading path seeds apart.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Monte Carlo pricer with a fixed path count and time grid.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloPricer {
    num_paths: usize,
    steps_per_year: usize,
    seed: u64,
}

impl MonteCarloPricer {
    pub fn new(num_paths: usize, seed: u64) -> Self {
        Self {
            num_paths,
            steps_per_year: 252,
            seed,
        }
    }

    pub fn with_steps_per_year(mut self, steps_per_year: usize) -> Self {
        self.steps_per_year = steps_per_year;
        self
    }

    fn path_seed(&self, path: usize) -> u64 {
        self.seed.wrapping_add((path as u64).wrapping_mul(SEED_STRIDE))
    }

    fn time_grid(&self, t: f64) -> (usize, f64) {
        let num_steps = ((t * self.steps_per_year as f64) as usize).max(1);
        (num_steps, t / num_steps as f64)
    }

    /// Prices a European option as the discounted average terminal payoff.
    pub fn price_option(
        &self,
        model: &dyn Model,
        s0: f64,
        k: f64,
        t: f64,
        r: f64,
        option_type: OptionType,
    ) -> Result<f64, RiskError> {
        if self.num_paths == 0 || self.steps_per_year == 0 {
            return Err(RiskError::InvalidInput(
                "monte carlo pricer needs at least one path and one step per year".to_string(),
            ));
        }
        if !s0.is_finite() || s0 <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "spot must be finite and > 0, got {s0}"
            )));
        }
        if !k.is_finite() || k <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "strike must be finite and > 0, got {k}"
            )));
        }
        if t <= 0.0 {
            return Ok(option_type.intrinsic(s0, k));
        }

        let (num_steps, dt) = self.time_grid(t);
        let run_path = |path: usize| -> f64 {
            let mut forked = model.with_seed(self.path_seed(path));
            let mut s = s0;
            for _ in 0..num_steps {
                s = forked.step(s, dt);
            }
            option_type.intrinsic(s, k)
        };

        #[cfg(feature = "parallel")]
        let payoff_sum: f64 = (0..self.num_paths).into_par_iter().map(run_path).sum();
        #[cfg(not(feature = "parallel"))]
        let payoff_sum: f64 = (0..self.num_paths).map(run_path).sum();

        let expected_payoff = payoff_sum / self.num_paths as f64;
        Ok(expected_payoff * (-r * t).exp())
    }

    /// Simulates terminal prices at horizon `t`, one per path.
    pub fn simulate_paths(
        &self,
        model: &dyn Model,
        s0: f64,
        t: f64,
    ) -> Result<Vec<f64>, RiskError> {
        if self.num_paths == 0 || self.steps_per_year == 0 {
            return Err(RiskError::InvalidInput(
                "monte carlo pricer needs at least one path and one step per year".to_string(),
            ));
        }
        if !s0.is_finite() || s0 <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "spot must be finite and > 0, got {s0}"
            )));
        }
        if t <= 0.0 {
            return Ok(vec![s0; self.num_paths]);
        }

        let (num_steps, dt) = self.time_grid(t);
        let run_path = |path: usize| -> f64 {
            let mut forked = model.with_seed(self.path_seed(path));
            let mut s = s0;
            for _ in 0..num_steps {
                s = forked.step(s, dt);
            }
            s
        };

        #[cfg(feature = "parallel")]
        let terminal: Vec<f64> = (0..self.num_paths).into_par_iter().map(run_path).collect();
        #[cfg(not(feature = "parallel"))]
        let terminal: Vec<f64> = (0..self.num_paths).map(run_path).collect();

        Ok(terminal)
    }
}
