//! Core domain types and the library-wide error taxonomy.

pub mod types;

pub use types::*;

/// Standardized Greeks container used across pricing and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Greeks {
    /// First derivative to spot.
    pub delta: f64,
    /// Second derivative to spot.
    pub gamma: f64,
    /// First derivative to volatility.
    pub vega: f64,
    /// First derivative to time.
    pub theta: f64,
    /// First derivative to rate.
    pub rho: f64,
}

impl Greeks {
    /// Accumulates `other` scaled by a position quantity.
    ///
    /// Portfolio Greeks are linear: the total is the quantity-weighted sum of
    /// the per-instrument sensitivities.
    pub fn add_scaled(&mut self, other: &Greeks, quantity: f64) {
        self.delta += quantity * other.delta;
        self.gamma += quantity * other.gamma;
        self.vega += quantity * other.vega;
        self.theta += quantity * other.theta;
        self.rho += quantity * other.rho;
    }
}

/// Errors surfaced by the engine API.
///
/// Construction failures (curve size mismatch, non-PSD correlation) are fatal
/// to the object being built. Per-instrument failures inside bulk revaluation
/// are recovered locally: the instrument is left unchanged and the error is
/// collected and surfaced at the end of the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// Input validation error (negative price/vol, mismatched lengths, ...).
    InvalidInput(String),
    /// Matrix or vector dimensions disagree.
    DimensionMismatch(String),
    /// Cholesky factorization failed; the matrix cannot drive correlated simulation.
    NonPositiveDefinite(String),
    /// Spot lookup for a ticker with no quoted price.
    UnknownTicker(String),
    /// Pricing math produced a disallowed state at runtime.
    NumericalError(String),
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::DimensionMismatch(msg) => write!(f, "dimension mismatch: {msg}"),
            Self::NonPositiveDefinite(msg) => write!(f, "non-positive-definite: {msg}"),
            Self::UnknownTicker(msg) => write!(f, "unknown ticker: {msg}"),
            Self::NumericalError(msg) => write!(f, "numerical error: {msg}"),
        }
    }
}

impl std::error::Error for RiskError {}
