//! Aggregate market state: curves by currency, surfaces and dividends by
//! ticker, spot prices, pairwise correlations, and the valuation clock.
//!
//! Lookups fall back to conservative defaults (USD flat 5%, flat 20% vol,
//! zero dividend yield) for unknown currencies and tickers; only spot lookups
//! fail, because there is no sensible default price.

use std::collections::BTreeMap;

use crate::core::RiskError;
use crate::market::curves::{DividendCurve, YieldCurve};
use crate::market::surface::VolatilitySurface;
use crate::math::CorrelationMatrix;

/// Currency used when a caller does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Container for all market data consumed by models and the simulator.
#[derive(Debug, Clone, Default)]
pub struct MarketEnvironment {
    spots: BTreeMap<String, f64>,
    yield_curves: BTreeMap<String, YieldCurve>,
    default_yield_curve: YieldCurve,
    vol_surfaces: BTreeMap<String, VolatilitySurface>,
    default_vol_surface: VolatilitySurface,
    dividend_curves: BTreeMap<String, DividendCurve>,
    default_dividend_curve: DividendCurve,
    correlation: Option<CorrelationMatrix>,
    // Years since the simulation epoch.
    valuation_date: f64,
}

impl MarketEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Spots
    // ------------------------------------------------------------------

    pub fn set_spot(&mut self, ticker: impl Into<String>, price: f64) {
        self.spots.insert(ticker.into(), price);
    }

    /// Spot price for `ticker`; fails with `UnknownTicker` when absent.
    pub fn spot(&self, ticker: &str) -> Result<f64, RiskError> {
        self.spots
            .get(ticker)
            .copied()
            .ok_or_else(|| RiskError::UnknownTicker(format!("no spot price for {ticker}")))
    }

    pub fn has_spot(&self, ticker: &str) -> bool {
        self.spots.contains_key(ticker)
    }

    /// All quoted spots, ordered by ticker.
    pub fn spots(&self) -> &BTreeMap<String, f64> {
        &self.spots
    }

    // ------------------------------------------------------------------
    // Yield curves
    // ------------------------------------------------------------------

    pub fn set_yield_curve(&mut self, currency: impl Into<String>, curve: YieldCurve) {
        self.yield_curves.insert(currency.into(), curve);
    }

    /// Curve for `currency`, or the default flat curve when unknown.
    pub fn yield_curve(&self, currency: &str) -> &YieldCurve {
        self.yield_curves
            .get(currency)
            .unwrap_or(&self.default_yield_curve)
    }

    /// Zero rate at maturity `t` on the default currency's curve.
    pub fn rate(&self, t: f64) -> f64 {
        self.yield_curve(DEFAULT_CURRENCY).rate(t)
    }

    pub fn rate_for(&self, t: f64, currency: &str) -> f64 {
        self.yield_curve(currency).rate(t)
    }

    pub fn discount_factor(&self, t: f64) -> f64 {
        self.yield_curve(DEFAULT_CURRENCY).discount_factor(t)
    }

    /// Overnight rate proxy on the default currency's curve.
    pub fn short_rate(&self) -> f64 {
        self.yield_curve(DEFAULT_CURRENCY).short_rate()
    }

    // ------------------------------------------------------------------
    // Volatility surfaces
    // ------------------------------------------------------------------

    pub fn set_vol_surface(&mut self, ticker: impl Into<String>, surface: VolatilitySurface) {
        self.vol_surfaces.insert(ticker.into(), surface);
    }

    /// Surface for `ticker`, or the default flat surface when unknown.
    pub fn vol_surface(&self, ticker: &str) -> &VolatilitySurface {
        self.vol_surfaces
            .get(ticker)
            .unwrap_or(&self.default_vol_surface)
    }

    pub fn vol(&self, ticker: &str, strike: f64, expiry: f64) -> f64 {
        self.vol_surface(ticker).vol(strike, expiry)
    }

    pub fn atm_vol(&self, ticker: &str, expiry: f64) -> f64 {
        self.vol_surface(ticker).atm_vol(expiry)
    }

    // ------------------------------------------------------------------
    // Dividend curves
    // ------------------------------------------------------------------

    pub fn set_dividend_curve(&mut self, ticker: impl Into<String>, curve: DividendCurve) {
        self.dividend_curves.insert(ticker.into(), curve);
    }

    /// Dividend curve for `ticker`, or the zero-yield default when unknown.
    pub fn dividend_curve(&self, ticker: &str) -> &DividendCurve {
        self.dividend_curves
            .get(ticker)
            .unwrap_or(&self.default_dividend_curve)
    }

    // ------------------------------------------------------------------
    // Correlations
    // ------------------------------------------------------------------

    pub fn set_correlation_matrix(&mut self, matrix: CorrelationMatrix) {
        self.correlation = Some(matrix);
    }

    pub fn clear_correlation_matrix(&mut self) {
        self.correlation = None;
    }

    pub fn correlation_matrix(&self) -> Option<&CorrelationMatrix> {
        self.correlation.as_ref()
    }

    // ------------------------------------------------------------------
    // Scenario bumps
    // ------------------------------------------------------------------

    /// Parallel shift of every yield curve (and the default) by `delta`.
    pub fn bump_rates(&mut self, delta: f64) {
        for curve in self.yield_curves.values_mut() {
            curve.bump(delta);
        }
        self.default_yield_curve.bump(delta);
    }

    /// Parallel shift of every vol surface (and the default) by `delta`.
    pub fn bump_vols(&mut self, delta: f64) {
        for surface in self.vol_surfaces.values_mut() {
            surface.bump(delta);
        }
        self.default_vol_surface.bump(delta);
    }

    /// Multiplies every quoted spot by `1 + pct_change`.
    pub fn shock_spots(&mut self, pct_change: f64) {
        for price in self.spots.values_mut() {
            *price *= 1.0 + pct_change;
        }
    }

    // ------------------------------------------------------------------
    // Valuation clock
    // ------------------------------------------------------------------

    pub fn set_valuation_date(&mut self, t: f64) {
        self.valuation_date = t;
    }

    pub fn valuation_date(&self) -> f64 {
        self.valuation_date
    }

    pub fn advance_time(&mut self, dt: f64) {
        self.valuation_date += dt;
    }
}
