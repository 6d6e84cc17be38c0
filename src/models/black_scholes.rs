//! Black-Scholes closed forms and the GBM simulation model.
//!
//! References: Hull, *Options, Futures, and Other Derivatives* (11th ed.),
//! ch. 15. The CDF is evaluated through `erfc` for full-precision tails.
//!
//! Conventions at expiry (`t <= 0`): value collapses to intrinsic; delta is
//! the payoff indicator (+1/0 for in/out-of-the-money calls, -1/0 for puts)
//! and every other Greek is zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::core::{Greeks, OptionType, RiskError};
use crate::market::MarketEnvironment;
use crate::math::{normal_cdf, normal_pdf};
use crate::models::Model;

fn validate_inputs(s: f64, k: f64, sigma: f64) -> Result<(), RiskError> {
    if !s.is_finite() || s <= 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "spot must be finite and > 0, got {s}"
        )));
    }
    if !k.is_finite() || k <= 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "strike must be finite and > 0, got {k}"
        )));
    }
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "volatility must be finite and >= 0, got {sigma}"
        )));
    }
    Ok(())
}

fn d1_d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> (f64, f64) {
    let vt = sigma * t.sqrt();
    let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / vt;
    (d1, d1 - vt)
}

/// Black-Scholes European option value.
pub fn black_scholes_price(
    option_type: OptionType,
    s: f64,
    k: f64,
    r: f64,
    sigma: f64,
    t: f64,
) -> Result<f64, RiskError> {
    validate_inputs(s, k, sigma)?;

    if t <= 0.0 {
        return Ok(option_type.intrinsic(s, k));
    }

    let (d1, d2) = d1_d2(s, k, r, sigma, t);
    let df = (-r * t).exp();
    let value = match option_type {
        OptionType::Call => s * normal_cdf(d1) - k * df * normal_cdf(d2),
        OptionType::Put => k * df * normal_cdf(-d2) - s * normal_cdf(-d1),
    };
    Ok(value)
}

/// Analytical Black-Scholes Greeks.
pub fn black_scholes_greeks(
    option_type: OptionType,
    s: f64,
    k: f64,
    r: f64,
    sigma: f64,
    t: f64,
) -> Result<Greeks, RiskError> {
    validate_inputs(s, k, sigma)?;

    if t <= 0.0 {
        let delta = match option_type {
            OptionType::Call => {
                if s > k {
                    1.0
                } else {
                    0.0
                }
            }
            OptionType::Put => {
                if s < k {
                    -1.0
                } else {
                    0.0
                }
            }
        };
        return Ok(Greeks {
            delta,
            ..Greeks::default()
        });
    }

    let (d1, d2) = d1_d2(s, k, r, sigma, t);
    let sqrt_t = t.sqrt();
    let df = (-r * t).exp();
    let pdf_d1 = normal_pdf(d1);

    let delta = match option_type {
        OptionType::Call => normal_cdf(d1),
        OptionType::Put => normal_cdf(d1) - 1.0,
    };
    let gamma = pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * pdf_d1 * sqrt_t;
    let theta = match option_type {
        OptionType::Call => -s * pdf_d1 * sigma / (2.0 * sqrt_t) - r * k * df * normal_cdf(d2),
        OptionType::Put => -s * pdf_d1 * sigma / (2.0 * sqrt_t) + r * k * df * normal_cdf(-d2),
    };
    let rho = match option_type {
        OptionType::Call => k * t * df * normal_cdf(d2),
        OptionType::Put => -k * t * df * normal_cdf(-d2),
    };

    Ok(Greeks {
        delta,
        gamma,
        vega,
        theta,
        rho,
    })
}

/// Geometric Brownian Motion model with closed-form option valuation.
#[derive(Debug)]
pub struct BlackScholesModel {
    rate: f64,
    volatility: f64,
    rng: StdRng,
}

impl BlackScholesModel {
    /// Builds a model with fallback rate/vol and a deterministic seed.
    pub fn new(rate: f64, volatility: f64, seed: u64) -> Result<Self, RiskError> {
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "model volatility must be finite and >= 0, got {volatility}"
            )));
        }
        if !rate.is_finite() {
            return Err(RiskError::InvalidInput(format!(
                "model rate must be finite, got {rate}"
            )));
        }
        Ok(Self {
            rate,
            volatility,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn set_volatility(&mut self, volatility: f64) {
        self.volatility = volatility;
    }

    fn draw(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn gbm_step(price: f64, dt: f64, z: f64, r: f64, sigma: f64) -> f64 {
        let drift = (r - 0.5 * sigma * sigma) * dt;
        let diffusion = sigma * dt.sqrt() * z;
        price * (drift + diffusion).exp()
    }
}

impl Default for BlackScholesModel {
    /// 5% rate, 20% vol, seed 42.
    fn default() -> Self {
        Self::new(0.05, 0.20, 42).expect("default parameters are valid")
    }
}

impl Model for BlackScholesModel {
    fn step(&mut self, price: f64, dt: f64) -> f64 {
        let z = self.draw();
        Self::gbm_step(price, dt, z, self.rate, self.volatility)
    }

    fn step_with_shock(&mut self, price: f64, dt: f64, z: f64) -> f64 {
        Self::gbm_step(price, dt, z, self.rate, self.volatility)
    }

    fn step_in_env(&mut self, price: f64, dt: f64, ticker: &str, env: &MarketEnvironment) -> f64 {
        let z = self.draw();
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
        Self::gbm_step(price, dt, z, r, sigma)
    }

    fn price_option(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        sigma: f64,
        option_type: OptionType,
    ) -> Result<f64, RiskError> {
        black_scholes_price(option_type, s, k, r, sigma, t)
    }

    fn greeks(
        &self,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        sigma: f64,
        option_type: OptionType,
    ) -> Result<Greeks, RiskError> {
        black_scholes_greeks(option_type, s, k, r, sigma, t)
    }

    fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn with_seed(&self, seed: u64) -> Box<dyn Model> {
        Box::new(Self {
            rate: self.rate,
            volatility: self.volatility,
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
