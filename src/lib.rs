//! IronRisk is a portfolio risk engine: it evolves portfolios of equities,
//! European options, and fixed-rate bonds through time under stochastic market
//! dynamics, revalues every instrument at each step, and aggregates
//! portfolio-level value, P&L, Greeks, and scenario outcomes.
//!
//! The crate combines a term-structured market environment (yield curves, vol
//! surfaces, dividend curves, spot quotes, correlations), analytical
//! Black-Scholes pricing and Greeks, Merton jump-diffusion dynamics,
//! Cholesky-correlated multi-asset simulation, and scenario revaluation
//! (Monte Carlo, historical replay, stress shocks, historical VaR) under one
//! namespace.
//!
//! References used across modules include:
//! - Hull, *Options, Futures, and Other Derivatives* (11th ed.), Ch. 15, 19, 22.
//! - Glasserman (2004) for correlated-path Monte Carlo.
//! - Merton (1976) for the jump-diffusion dynamics.
//! - McNeil, Frey, Embrechts (2015) for the historical VaR convention.
//!
//! Numerical considerations:
//! - All times are year fractions; rates and vols are decimals (0.05 = 5%);
//!   one trading day is 1/252.
//! - Every model owns its RNG and is deterministic under `set_seed`; the
//!   multi-asset simulator's shock generator is seeded independently.
//! - Correlation matrices are validated and Cholesky-factorized at
//!   construction; non-PSD input fails fast rather than being repaired.
//!
//! # Feature Flags
//! - `parallel`: Rayon-powered path fan-out in the Monte Carlo pricer.
//!
//! # Quick Start
//! Price a Black-Scholes call and its Greeks:
//! ```rust
//! use ironrisk::core::OptionType;
//! use ironrisk::models::{black_scholes_greeks, black_scholes_price};
//!
//! let px = black_scholes_price(OptionType::Call, 100.0, 100.0, 0.05, 0.20, 1.0).unwrap();
//! assert!(px > 10.0 && px < 11.0);
//!
//! let g = black_scholes_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.20, 1.0).unwrap();
//! assert!(g.delta > 0.0 && g.gamma > 0.0 && g.vega > 0.0);
//! ```
//!
//! Run a daily simulation over a small book:
//! ```rust
//! use ironrisk::models::BlackScholesModel;
//! use ironrisk::sim::Simulator;
//!
//! let model = BlackScholesModel::new(0.05, 0.20, 42).unwrap();
//! let mut sim = Simulator::new(Box::new(model));
//!
//! let desk = sim.create_portfolio("desk-a", "USD");
//! let aapl = sim.add_stock("AAPL", 150.0).unwrap();
//! sim.add_position(desk, aapl, 100.0).unwrap();
//!
//! sim.simulate_days(5).unwrap();
//! assert_eq!(sim.day_count(), 5);
//! assert!(sim.portfolio_value(desk).unwrap() > 0.0);
//! ```
//!
//! Historical VaR from a return series:
//! ```rust
//! use ironrisk::models::BlackScholesModel;
//! use ironrisk::sim::Simulator;
//!
//! let mut sim = Simulator::new(Box::new(BlackScholesModel::new(0.05, 0.20, 42).unwrap()));
//! let desk = sim.create_portfolio("desk-a", "USD");
//! let aapl = sim.add_stock("AAPL", 100.0).unwrap();
//! sim.add_position(desk, aapl, 100.0).unwrap();
//!
//! let scenarios: Vec<Vec<f64>> = vec![vec![-0.03], vec![-0.01], vec![0.0], vec![0.01], vec![0.02]];
//! let var_95 = sim.value_at_risk(desk, &scenarios, 0.95).unwrap();
//! assert!((var_95 - 300.0).abs() < 1e-9);
//! ```

pub mod core;
pub mod instruments;
pub mod market;
pub mod math;
pub mod mc;
pub mod models;
pub mod portfolio;
pub mod risk;
pub mod sim;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::core::{Greeks, OptionType, RiskError};
    pub use crate::instruments::{Instrument, InstrumentArena, InstrumentId};
    pub use crate::market::{DividendCurve, MarketEnvironment, VolatilitySurface, YieldCurve};
    pub use crate::math::CorrelationMatrix;
    pub use crate::mc::{MonteCarloPricer, MultiAssetSimulator};
    pub use crate::models::{BlackScholesModel, JumpDiffusionModel, Model};
    pub use crate::portfolio::{Portfolio, Position};
    pub use crate::risk::{HistoricalStep, MonteCarloStep, Revalue, StressShock};
    pub use crate::sim::{PortfolioId, Simulator};
}
