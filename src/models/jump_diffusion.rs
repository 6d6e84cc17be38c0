//! Merton jump-diffusion model: GBM plus compensated Poisson jumps.
//!
//! Per step with `Z ~ N(0,1)`, `N ~ Poisson(lambda * dt)` and jump sizes
//! `J_i ~ N(mu_j, sigma_j^2)`:
//!
//! ```text
//! k = exp(mu_j + sigma_j^2 / 2) - 1
//! ln S' = ln S + (r - lambda*k - sigma^2/2) dt + sigma sqrt(dt) Z + sum J_i
//! ```
//!
//! Jumps are idiosyncratic: the externally-shocked step variant consumes the
//! supplied `Z` for the diffusion only and keeps drawing jump counts and sizes
//! from the model's own generator, so cross-asset correlation applies to the
//! continuous component alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson, StandardNormal};

use crate::core::{Greeks, OptionType, RiskError};
use crate::market::MarketEnvironment;
use crate::models::black_scholes::{black_scholes_greeks, black_scholes_price};
use crate::models::Model;

/// Merton jump-diffusion dynamics with Black-Scholes valuation fallback.
#[derive(Debug)]
pub struct JumpDiffusionModel {
    rate: f64,
    volatility: f64,
    // Expected jumps per year.
    jump_intensity: f64,
    jump_mean: f64,
    jump_vol: f64,
    jump_size: Normal<f64>,
    rng: StdRng,
}

impl JumpDiffusionModel {
    pub fn new(
        rate: f64,
        volatility: f64,
        jump_intensity: f64,
        jump_mean: f64,
        jump_vol: f64,
        seed: u64,
    ) -> Result<Self, RiskError> {
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "model volatility must be finite and >= 0, got {volatility}"
            )));
        }
        if !jump_intensity.is_finite() || jump_intensity < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "jump intensity must be finite and >= 0, got {jump_intensity}"
            )));
        }
        if !jump_vol.is_finite() || jump_vol < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "jump volatility must be finite and >= 0, got {jump_vol}"
            )));
        }
        if !rate.is_finite() || !jump_mean.is_finite() {
            return Err(RiskError::InvalidInput(
                "rate and jump mean must be finite".to_string(),
            ));
        }

        let jump_size = Normal::new(jump_mean, jump_vol).map_err(|e| {
            RiskError::InvalidInput(format!("jump size distribution rejected: {e}"))
        })?;

        Ok(Self {
            rate,
            volatility,
            jump_intensity,
            jump_mean,
            jump_vol,
            jump_size,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn jump_intensity(&self) -> f64 {
        self.jump_intensity
    }

    /// Compensator `k = exp(mu_j + sigma_j^2/2) - 1`, the expected relative
    /// jump size subtracted from the drift.
    fn compensator(&self) -> f64 {
        (self.jump_mean + 0.5 * self.jump_vol * self.jump_vol).exp() - 1.0
    }

    /// Sum of `N ~ Poisson(lambda * dt)` log jump sizes from the own generator.
    fn draw_jump_component(&mut self, dt: f64) -> f64 {
        let lambda_dt = self.jump_intensity * dt;
        // Poisson rejects a non-positive mean; zero intensity means no jumps.
        let Ok(poisson) = Poisson::new(lambda_dt) else {
            return 0.0;
        };
        let num_jumps = poisson.sample(&mut self.rng) as u64;
        let mut total = 0.0;
        for _ in 0..num_jumps {
            total += self.jump_size.sample(&mut self.rng);
        }
        total
    }

    fn merton_step(&mut self, price: f64, dt: f64, z: f64, r: f64, sigma: f64) -> f64 {
        let drift = (r - self.jump_intensity * self.compensator() - 0.5 * sigma * sigma) * dt;
        let diffusion = sigma * dt.sqrt() * z;
        let jumps = self.draw_jump_component(dt);
        price * (drift + diffusion + jumps).exp()
    }
}

impl Default for JumpDiffusionModel {
    /// 5% rate, 20% vol, one jump per year averaging -5% with 10% dispersion,
    /// seed 42.
    fn default() -> Self {
        Self::new(0.05, 0.20, 1.0, -0.05, 0.10, 42).expect("default parameters are valid")
    }
}

impl Model for JumpDiffusionModel {
    fn step(&mut self, price: f64, dt: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        self.merton_step(price, dt, z, self.rate, self.volatility)
    }

    fn step_with_shock(&mut self, price: f64, dt: f64, z: f64) -> f64 {
        self.merton_step(price, dt, z, self.rate, self.volatility)
    }

    fn step_in_env(&mut self, price: f64, dt: f64, ticker: &str, env: &MarketEnvironment) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        self.step_with_shock_in_env(price, dt, z, ticker, env)
    }

    fn step_with_shock_in_env(
        &mut self,
        price: f64,
        dt: f64,
        z: f64,
        ticker: &str,
        env: &MarketEnvironment,
    ) -> f64 {
        let r = env.short_rate();
        let sigma = env.atm_vol(ticker, dt);
        self.merton_step(price, dt, z, r, sigma)
    }

    /// Values the option with the Black-Scholes closed form at the model's
    /// diffusion volatility, ignoring the jump component and the caller's
    /// `sigma`. This understates the value of the jump tail relative to the
    /// model's own dynamics; use a path-based pricer when consistency with
    /// the simulated distribution matters.
    fn price_option(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        _sigma: f64,
        option_type: OptionType,
    ) -> Result<f64, RiskError> {
        black_scholes_price(option_type, s, k, r, self.volatility, t)
    }

    fn price_option_in_env(
        &self,
        s: f64,
        k: f64,
        t: f64,
        ticker: &str,
        env: &MarketEnvironment,
        option_type: OptionType,
    ) -> Result<f64, RiskError> {
        let r = env.rate(t);
        let sigma = env.vol(ticker, k, t);
        black_scholes_price(option_type, s, k, r, sigma, t)
    }

    /// Black-Scholes Greeks at the diffusion volatility; same approximation
    /// as [`Self::price_option`].
    fn greeks(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        _sigma: f64,
        option_type: OptionType,
    ) -> Result<Greeks, RiskError> {
        black_scholes_greeks(option_type, s, k, r, self.volatility, t)
    }

    fn greeks_in_env(
        &self,
        s: f64,
        k: f64,
        t: f64,
        ticker: &str,
        env: &MarketEnvironment,
        option_type: OptionType,
    ) -> Result<Greeks, RiskError> {
        let r = env.rate(t);
        let sigma = env.vol(ticker, k, t);
        black_scholes_greeks(option_type, s, k, r, sigma, t)
    }

    fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn with_seed(&self, seed: u64) -> Box<dyn Model> {
        Box::new(Self {
            rate: self.rate,
            volatility: self.volatility,
            jump_intensity: self.jump_intensity,
            jump_mean: self.jump_mean,
            jump_vol: self.jump_vol,
            jump_size: self.jump_size,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn volatility(&self) -> f64 {
        self.volatility
    }
}
