//! Stochastic models for path evolution and analytical option valuation.
//!
//! Two concrete models are provided: [`BlackScholesModel`] (geometric Brownian
//! motion with closed-form European pricing) and [`JumpDiffusionModel`]
//! (Merton dynamics with compensated Poisson jumps). Both own their RNG, so a
//! model must not be shared between concurrently-running simulators;
//! [`Model::with_seed`] forks an independent copy instead.

pub mod black_scholes;
pub mod jump_diffusion;

pub use black_scholes::{black_scholes_greeks, black_scholes_price, BlackScholesModel};
pub use jump_diffusion::JumpDiffusionModel;

use crate::core::{Greeks, OptionType, RiskError};
use crate::market::MarketEnvironment;

/// Capability set shared by every pricing/simulation model.
///
/// The externally-shocked step variants exist so a multi-asset driver can feed
/// Cholesky-correlated normals into several assets while each model keeps any
/// idiosyncratic randomness (e.g. jumps) on its own generator.
pub trait Model: Send + Sync {
    /// Evolves `price` over `dt` years using the model's own generator.
    fn step(&mut self, price: f64, dt: f64) -> f64;

    /// Evolves `price` over `dt` years with an externally supplied standard
    /// normal shock `z`.
    fn step_with_shock(&mut self, price: f64, dt: f64, z: f64) -> f64;

    /// Environment-aware step: rate from the short end of the default curve,
    /// vol from the ticker's surface at the money.
    fn step_in_env(&mut self, price: f64, dt: f64, ticker: &str, env: &MarketEnvironment) -> f64;

    /// Environment-aware step with an externally supplied shock.
    fn step_with_shock_in_env(
        &mut self,
        price: f64,
        dt: f64,
        z: f64,
        ticker: &str,
        env: &MarketEnvironment,
    ) -> f64;

    /// European option value for the given market inputs.
    fn price_option(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        sigma: f64,
        option_type: OptionType,
    ) -> Result<f64, RiskError>;

    /// European option value with rate and vol read from the environment
    /// (curve at maturity, surface at strike/expiry).
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
        self.price_option(s, k, t, r, sigma, option_type)
    }

    /// Option sensitivities for the given market inputs.
    fn greeks(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        sigma: f64,
        option_type: OptionType,
    ) -> Result<Greeks, RiskError>;

    /// Option sensitivities with rate and vol read from the environment.
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
        self.greeks(s, k, t, r, sigma, option_type)
    }

    /// Reseeds the model's generator; runs with equal seeds are identical.
    fn set_seed(&mut self, seed: u64);

    /// Forks an independent model with the same parameters and a fresh
    /// generator. This is the only sanctioned way to duplicate a model.
    fn with_seed(&self, seed: u64) -> Box<dyn Model>;

    /// Fallback risk-free rate used when no environment is supplied.
    fn rate(&self) -> f64;

    /// Fallback diffusion volatility used when no environment is supplied.
    fn volatility(&self) -> f64;
}
