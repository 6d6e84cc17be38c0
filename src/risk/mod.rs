//! Revaluation operations and portfolio-level risk measures.

pub mod revalue;
pub mod var;

pub use revalue::{
    instrument_greeks, portfolio_greeks, revalue_instruments, HistoricalStep, MonteCarloStep,
    Revalue, StressShock,
};
pub use var::historical_var;
