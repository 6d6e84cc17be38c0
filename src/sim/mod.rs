//! The simulation driver: portfolios, the owned model, the market
//! environment, and the day loop.
//!
//! A [`Simulator`] owns everything it mutates, so one instance is a single
//! logical writer over its instrument graph. Within one daily step all stock
//! prices advance before any option re-prices, so derivatives always read
//! already-updated underlyings. Separate simulator instances may run on
//! separate threads as long as they share no model (the RNG is mutable state)
//! and no instrument graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Greeks, RiskError};
use crate::instruments::{Instrument, InstrumentArena, InstrumentId};
use crate::market::MarketEnvironment;
use crate::math::CorrelationMatrix;
use crate::mc::MultiAssetSimulator;
use crate::models::Model;
use crate::portfolio::Portfolio;
use crate::risk::revalue::{
    revalue_instruments, HistoricalStep, MonteCarloStep, Revalue, StressShock,
};
use crate::risk::var::historical_var;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAILY_DT: f64 = 1.0 / TRADING_DAYS_PER_YEAR;

// Default seed for the joint shock generator; reseed via `set_shock_seed`.
const DEFAULT_SHOCK_SEED: u64 = 42;

/// Handle to a portfolio registered with a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortfolioId(usize);

/// Portfolio risk engine driver.
pub struct Simulator {
    arena: InstrumentArena,
    portfolios: Vec<Portfolio>,
    model: Box<dyn Model>,
    shocks: MultiAssetSimulator,
    env: MarketEnvironment,
    day_count: u64,
}

impl Simulator {
    pub fn new(model: Box<dyn Model>) -> Self {
        Self {
            arena: InstrumentArena::new(),
            portfolios: Vec::new(),
            model,
            shocks: MultiAssetSimulator::new(DEFAULT_SHOCK_SEED),
            env: MarketEnvironment::new(),
            day_count: 0,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_model(&mut self, model: Box<dyn Model>) {
        self.model = model;
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn set_market_environment(&mut self, env: MarketEnvironment) {
        self.env = env;
    }

    pub fn market_environment(&self) -> &MarketEnvironment {
        &self.env
    }

    pub fn market_environment_mut(&mut self) -> &mut MarketEnvironment {
        &mut self.env
    }

    /// Reseeds the joint shock generator used for correlated stepping.
    pub fn set_shock_seed(&mut self, seed: u64) {
        self.shocks.set_seed(seed);
    }

    pub fn set_correlation_matrix(&mut self, matrix: CorrelationMatrix) {
        self.env.set_correlation_matrix(matrix);
    }

    /// Parallel shift of every yield curve.
    pub fn bump_rates(&mut self, delta: f64) {
        self.env.bump_rates(delta);
    }

    /// Parallel shift of every vol surface.
    pub fn bump_vols(&mut self, delta: f64) {
        self.env.bump_vols(delta);
    }

    /// Shocks every stock price (and the environment's spot quotes) by
    /// `1 + pct_change`. Options and bonds are not revalued; use
    /// [`Self::apply_stress_test`] for a full scenario.
    pub fn shock_spots(&mut self, pct_change: f64) {
        let stock_ids: Vec<InstrumentId> = self
            .arena
            .ids()
            .filter(|id| self.arena.instrument(*id).is_stock())
            .collect();
        for id in stock_ids {
            let next = self.arena.price(id) * (1.0 + pct_change);
            self.arena.set_price(id, next);
        }
        self.env.shock_spots(pct_change);
        self.sync_spots();
    }

    // ------------------------------------------------------------------
    // Instruments and portfolios
    // ------------------------------------------------------------------

    /// Adds a stock and quotes its spot in the environment.
    pub fn add_stock(&mut self, ticker: &str, price: f64) -> Result<InstrumentId, RiskError> {
        let id = self.arena.add_stock(ticker, price)?;
        self.env.set_spot(ticker, price);
        Ok(id)
    }

    pub fn add_option(
        &mut self,
        ticker: &str,
        premium: f64,
        strike: f64,
        underlying: InstrumentId,
        time_to_expiry: f64,
        option_type: crate::core::OptionType,
    ) -> Result<InstrumentId, RiskError> {
        self.arena
            .add_option(ticker, premium, strike, underlying, time_to_expiry, option_type)
    }

    pub fn add_bond(
        &mut self,
        ticker: &str,
        price: f64,
        duration: f64,
        coupon_rate: f64,
    ) -> Result<InstrumentId, RiskError> {
        self.arena.add_bond(ticker, price, duration, coupon_rate)
    }

    pub fn arena(&self) -> &InstrumentArena {
        &self.arena
    }

    pub fn create_portfolio(&mut self, owner: &str, currency: &str) -> PortfolioId {
        let id = PortfolioId(self.portfolios.len());
        self.portfolios.push(Portfolio::new(owner, currency));
        id
    }

    pub fn add_position(
        &mut self,
        portfolio: PortfolioId,
        instrument: InstrumentId,
        quantity: f64,
    ) -> Result<(), RiskError> {
        if !self.arena.contains(instrument) {
            return Err(RiskError::InvalidInput(format!(
                "instrument id {} does not exist",
                instrument.index()
            )));
        }
        let target = self.portfolios.get_mut(portfolio.0).ok_or_else(|| {
            RiskError::InvalidInput(format!("portfolio id {} does not exist", portfolio.0))
        })?;
        target.add_position(&self.arena, instrument, quantity);
        Ok(())
    }

    pub fn portfolio(&self, id: PortfolioId) -> Result<&Portfolio, RiskError> {
        self.portfolios
            .get(id.0)
            .ok_or_else(|| RiskError::InvalidInput(format!("portfolio id {} does not exist", id.0)))
    }

    pub fn portfolio_value(&self, id: PortfolioId) -> Result<f64, RiskError> {
        Ok(self.portfolio(id)?.total_value(&self.arena))
    }

    pub fn portfolio_pnl(&self, id: PortfolioId) -> Result<f64, RiskError> {
        Ok(self.portfolio(id)?.total_pnl(&self.arena))
    }

    /// Days simulated so far; increments exactly once per daily step.
    pub fn day_count(&self) -> u64 {
        self.day_count
    }

    // ------------------------------------------------------------------
    // Daily simulation
    // ------------------------------------------------------------------

    /// Advances the market one trading day.
    ///
    /// When every referenced stock is covered by the environment's
    /// correlation matrix, stocks advance jointly through the multi-asset
    /// simulator and options re-price off the moved underlyings. Otherwise
    /// every instrument takes an independent Monte Carlo step.
    pub fn simulate_daily(&mut self) -> Result<(), RiskError> {
        self.snapshot_all_positions();

        let (prices, by_ticker) = self.stock_universe();
        let covered = !prices.is_empty()
            && self.env.correlation_matrix().is_some_and(|m| {
                m.len() == prices.len() && m.covers(prices.keys().map(String::as_str))
            });

        if covered {
            let next = self
                .shocks
                .step(self.model.as_mut(), &prices, DAILY_DT, &self.env)?;
            for (ticker, price) in &next {
                self.arena.set_price(by_ticker[ticker], *price);
                self.env.set_spot(ticker.clone(), *price);
            }
            let errors = self.reprice_options(DAILY_DT);
            self.finish_day();
            surface(errors)
        } else {
            let errors = self.monte_carlo_pass();
            self.finish_day();
            surface(errors)
        }
    }

    /// Advances one trading day with independent shocks for every instrument,
    /// ignoring any correlation matrix.
    pub fn simulate_daily_uncorrelated(&mut self) -> Result<(), RiskError> {
        self.snapshot_all_positions();
        let errors = self.monte_carlo_pass();
        self.finish_day();
        surface(errors)
    }

    /// Runs `n` daily steps.
    pub fn simulate_days(&mut self, n: usize) -> Result<(), RiskError> {
        for _ in 0..n {
            self.simulate_daily()?;
        }
        Ok(())
    }

    /// Replays one historical day; the return index is the day counter, so
    /// successive calls walk the series (wrapping at its end).
    pub fn simulate_daily_historical(&mut self, returns: &[f64]) -> Result<(), RiskError> {
        let ids = self.referenced_ids();
        let mut step = HistoricalStep::new(returns, self.day_count as usize)?;
        let errors = revalue_instruments(&mut step, &mut self.arena, &ids);
        self.sync_spots();
        self.finish_day();
        surface(errors)
    }

    /// Applies an instantaneous stress scenario to every referenced
    /// instrument. Underlyings shock before the options written on them.
    pub fn apply_stress_test(
        &mut self,
        price_shock: f64,
        vol_shock: f64,
        rate_shock: f64,
    ) -> Result<(), RiskError> {
        let mut shock = StressShock {
            price_shock,
            vol_shock,
            rate_shock,
        };
        self.simulate_with(&mut shock)
    }

    /// Runs a caller-supplied revaluation over every referenced instrument.
    /// Does not advance the day counter.
    pub fn simulate_with(&mut self, op: &mut dyn Revalue) -> Result<(), RiskError> {
        let ids = self.referenced_ids();
        let errors = revalue_instruments(op, &mut self.arena, &ids);
        self.sync_spots();
        surface(errors)
    }

    // ------------------------------------------------------------------
    // Risk measures
    // ------------------------------------------------------------------

    pub fn portfolio_greeks(&self, id: PortfolioId) -> Result<Greeks, RiskError> {
        crate::risk::portfolio_greeks(&self.arena, self.portfolio(id)?, self.model.as_ref(), Some(&self.env))
    }

    pub fn total_greeks(&self) -> Result<Greeks, RiskError> {
        let mut total = Greeks::default();
        for portfolio in &self.portfolios {
            let greeks = crate::risk::portfolio_greeks(
                &self.arena,
                portfolio,
                self.model.as_ref(),
                Some(&self.env),
            )?;
            total.add_scaled(&greeks, 1.0);
        }
        Ok(total)
    }

    /// Historical VaR of one portfolio; restores all instrument state.
    pub fn value_at_risk(
        &mut self,
        id: PortfolioId,
        scenarios: &[Vec<f64>],
        confidence: f64,
    ) -> Result<f64, RiskError> {
        if id.0 >= self.portfolios.len() {
            return Err(RiskError::InvalidInput(format!(
                "portfolio id {} does not exist",
                id.0
            )));
        }
        let portfolio = &self.portfolios[id.0];
        historical_var(&mut self.arena, portfolio, scenarios, confidence)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn snapshot_all_positions(&mut self) {
        let arena = &self.arena;
        for portfolio in &mut self.portfolios {
            portfolio.snapshot_prices(arena);
        }
    }

    fn finish_day(&mut self) {
        self.day_count += 1;
        self.env.advance_time(DAILY_DT);
    }

    /// Union of instrument ids held by any portfolio, plus option
    /// underlyings, ascending. Shared instruments appear once, so one daily
    /// pass writes each price exactly once.
    fn referenced_ids(&self) -> Vec<InstrumentId> {
        let mut ids = BTreeSet::new();
        for portfolio in &self.portfolios {
            for position in portfolio.positions() {
                let id = position.instrument();
                ids.insert(id);
                if let Instrument::Option(contract) = self.arena.instrument(id) {
                    ids.insert(contract.underlying);
                }
            }
        }
        ids.into_iter().collect()
    }

    /// Stocks referenced directly or as option underlyings, keyed by ticker.
    fn stock_universe(&self) -> (BTreeMap<String, f64>, BTreeMap<String, InstrumentId>) {
        let mut prices = BTreeMap::new();
        let mut by_ticker = BTreeMap::new();
        for id in self.referenced_ids() {
            if let Instrument::Stock { ticker, price } = self.arena.instrument(id) {
                prices.insert(ticker.clone(), *price);
                by_ticker.insert(ticker.clone(), id);
            }
        }
        (prices, by_ticker)
    }

    fn referenced_option_ids(&self) -> Vec<InstrumentId> {
        self.referenced_ids()
            .into_iter()
            .filter(|id| matches!(self.arena.instrument(*id), Instrument::Option(_)))
            .collect()
    }

    /// Uncorrelated legacy path: every referenced instrument takes an
    /// independent environment-aware Monte Carlo step.
    fn monte_carlo_pass(&mut self) -> Vec<RiskError> {
        let ids = self.referenced_ids();
        let mut op = MonteCarloStep {
            model: self.model.as_mut(),
            dt: DAILY_DT,
            env: Some(&self.env),
        };
        let errors = revalue_instruments(&mut op, &mut self.arena, &ids);
        self.sync_spots();
        errors
    }

    /// Decays and re-prices every referenced option against already-updated
    /// underlyings; failures leave the option unchanged.
    fn reprice_options(&mut self, dt: f64) -> Vec<RiskError> {
        let mut errors = Vec::new();
        for id in self.referenced_option_ids() {
            let Instrument::Option(contract) = self.arena.instrument(id) else {
                continue;
            };
            let ticker = contract.ticker.clone();
            let strike = contract.strike;
            let option_type = contract.option_type;
            let new_tte = (contract.time_to_expiry - dt).max(0.0);
            let (underlying_ticker, spot) = {
                let (t, s) = self.arena.underlying_quote(contract);
                (t.to_string(), s)
            };

            let repriced = if new_tte > 0.0 {
                self.model
                    .price_option_in_env(spot, strike, new_tte, &underlying_ticker, &self.env, option_type)
            } else {
                Ok(option_type.intrinsic(spot, strike))
            };

            match repriced {
                Ok(price) => {
                    if let Instrument::Option(contract) = self.arena.instrument_mut(id) {
                        contract.time_to_expiry = new_tte;
                        contract.price = price;
                    }
                }
                Err(err) => errors.push(RiskError::NumericalError(format!("{ticker}: {err}"))),
            }
        }
        errors
    }

    /// Mirrors stock instrument prices back into the environment's spot map.
    fn sync_spots(&mut self) {
        let quotes: Vec<(String, f64)> = self
            .arena
            .ids()
            .filter_map(|id| match self.arena.instrument(id) {
                Instrument::Stock { ticker, price } => Some((ticker.clone(), *price)),
                _ => None,
            })
            .collect();
        for (ticker, price) in quotes {
            self.env.set_spot(ticker, price);
        }
    }
}

/// Folds collected per-instrument errors into one surfaced result.
fn surface(errors: Vec<RiskError>) -> Result<(), RiskError> {
    let count = errors.len();
    let mut iter = errors.into_iter();
    match iter.next() {
        None => Ok(()),
        Some(first) if count == 1 => Err(first),
        Some(first) => Err(RiskError::NumericalError(format!(
            "{count} instruments failed revaluation; first: {first}"
        ))),
    }
}
