//! Correlated multi-asset market stepping.
//!
//! One call advances a set of underlyings over a single time step. Tickers are
//! processed in ascending order; independent standard normals are drawn in
//! that order and pushed through the environment's cached Cholesky factor when
//! its correlation matrix covers the full set, so the joint log-returns carry
//! the requested covariance. Without a covering matrix the shocks stay
//! independent.
//!
//! The simulator owns its generator, seeded independently of any model, so
//! shock draws do not perturb a model's idiosyncratic stream (jump counts in
//! particular).

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::core::RiskError;
use crate::market::MarketEnvironment;
use crate::models::Model;

/// Joint shock generator and one-step market advancer.
#[derive(Debug)]
pub struct MultiAssetSimulator {
    rng: StdRng,
}

impl MultiAssetSimulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reseeds the shock generator; runs with equal seeds are identical.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draws one standard normal per ticker (in the given order) and, when the
    /// environment's correlation matrix covers every ticker, correlates them
    /// through the Cholesky factor.
    pub fn correlated_shocks(
        &mut self,
        tickers: &[String],
        env: &MarketEnvironment,
    ) -> Result<Vec<f64>, RiskError> {
        let n = tickers.len();
        let mut independent = vec![0.0_f64; n];
        for z in &mut independent {
            *z = self.rng.sample(StandardNormal);
        }

        let matrix = match env.correlation_matrix() {
            Some(matrix)
                if matrix.len() == n && matrix.covers(tickers.iter().map(String::as_str)) =>
            {
                matrix
            }
            // No covering matrix: fall back to independent shocks.
            _ => return Ok(independent),
        };

        // The matrix's own ticker order indexes the factor; permute the
        // correlated draws back onto the caller's order.
        let correlated = matrix.correlate(&independent)?;
        let mut out = vec![0.0_f64; n];
        for (slot, ticker) in out.iter_mut().zip(tickers) {
            let row = matrix
                .index_of(ticker)
                .ok_or_else(|| RiskError::UnknownTicker(format!("no correlation row for {ticker}")))?;
            *slot = correlated[row];
        }
        Ok(out)
    }

    /// Advances every price one step of `dt` years under `model`, using
    /// per-ticker vol/rate from the environment and jointly correlated shocks.
    pub fn step(
        &mut self,
        model: &mut dyn Model,
        prices: &BTreeMap<String, f64>,
        dt: f64,
        env: &MarketEnvironment,
    ) -> Result<BTreeMap<String, f64>, RiskError> {
        // BTreeMap iteration already yields ascending tickers.
        let tickers: Vec<String> = prices.keys().cloned().collect();
        let shocks = self.correlated_shocks(&tickers, env)?;

        let mut next = BTreeMap::new();
        for (ticker, z) in tickers.iter().zip(shocks) {
            let price = prices[ticker];
            let advanced = model.step_with_shock_in_env(price, dt, z, ticker, env);
            if !advanced.is_finite() || advanced <= 0.0 {
                return Err(RiskError::NumericalError(format!(
                    "{ticker}: simulated price {advanced} is not a positive finite number"
                )));
            }
            next.insert(ticker.clone(), advanced);
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::CorrelationMatrix;
    use crate::models::BlackScholesModel;
    use approx::assert_relative_eq;

    fn pair_env(rho: f64) -> MarketEnvironment {
        let mut env = MarketEnvironment::new();
        env.set_correlation_matrix(
            CorrelationMatrix::new(
                vec!["AAPL".to_string(), "GOOGL".to_string()],
                vec![vec![1.0, rho], vec![rho, 1.0]],
            )
            .unwrap(),
        );
        env
    }

    #[test]
    fn perfectly_correlated_shocks_coincide() {
        let env = pair_env(1.0 - 1e-9);
        let mut sim = MultiAssetSimulator::new(42);
        let tickers = vec!["AAPL".to_string(), "GOOGL".to_string()];

        for _ in 0..50 {
            let shocks = sim.correlated_shocks(&tickers, &env).unwrap();
            assert_relative_eq!(shocks[0], shocks[1], epsilon = 1e-4);
        }
    }

    #[test]
    fn uncovered_ticker_set_falls_back_to_independent_shocks() {
        let env = pair_env(0.9);
        let mut sim = MultiAssetSimulator::new(42);
        let tickers = vec![
            "AAPL".to_string(),
            "GOOGL".to_string(),
            "TSLA".to_string(),
        ];

        // Three tickers against a 2x2 matrix: draws must come back unshaped.
        let shocks = sim.correlated_shocks(&tickers, &env).unwrap();
        assert_eq!(shocks.len(), 3);

        let mut reference = MultiAssetSimulator::new(42);
        let mut expected = vec![0.0_f64; 3];
        for z in &mut expected {
            *z = reference.rng.sample(StandardNormal);
        }
        assert_eq!(shocks, expected);
    }

    #[test]
    fn step_advances_every_ticker_and_is_seed_deterministic() {
        let mut env = pair_env(0.5);
        env.set_spot("AAPL", 150.0);
        env.set_spot("GOOGL", 140.0);

        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), 150.0);
        prices.insert("GOOGL".to_string(), 140.0);

        let mut model_a = BlackScholesModel::new(0.05, 0.20, 1).unwrap();
        let mut model_b = BlackScholesModel::new(0.05, 0.20, 1).unwrap();
        let mut sim_a = MultiAssetSimulator::new(42);
        let mut sim_b = MultiAssetSimulator::new(42);

        let next_a = sim_a.step(&mut model_a, &prices, 1.0 / 252.0, &env).unwrap();
        let next_b = sim_b.step(&mut model_b, &prices, 1.0 / 252.0, &env).unwrap();

        assert_eq!(next_a, next_b);
        assert_eq!(next_a.len(), 2);
        assert!(next_a.values().all(|p| *p > 0.0));
    }
}
