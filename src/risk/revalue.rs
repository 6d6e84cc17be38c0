//! Revaluation operations over the instrument sum type.
//!
//! Each operation mutates one instrument's state and is total over the
//! variant set; the match arms replace the double-dispatch visitor of older
//! risk systems. Bulk application recovers per-instrument failures locally:
//! the offending instrument is left unchanged, the error is collected, and the
//! remaining instruments are still processed.
//!
//! Operations assume id order when an option's underlying must be shocked
//! first; the arena mints an option's id after its underlying's, so ascending
//! passes satisfy that.

use crate::core::{Greeks, RiskError};
use crate::instruments::{Instrument, InstrumentArena, InstrumentId};
use crate::market::MarketEnvironment;
use crate::models::{black_scholes_price, Model};
use crate::portfolio::Portfolio;

/// Trading-day fraction used by the historical step's expiry decay.
const HISTORICAL_DT: f64 = 1.0 / 252.0;

/// Baseline vol the stress scenario shocks from.
const STRESS_BASE_VOL: f64 = 0.20;
/// Baseline rate the stress scenario shocks from.
const STRESS_BASE_RATE: f64 = 0.05;

/// A state-mutating revaluation of a single instrument.
pub trait Revalue {
    fn apply(&mut self, arena: &mut InstrumentArena, id: InstrumentId) -> Result<(), RiskError>;
}

/// Applies `op` to each id in order, collecting per-instrument errors instead
/// of aborting. An empty result means every instrument revalued.
pub fn revalue_instruments(
    op: &mut dyn Revalue,
    arena: &mut InstrumentArena,
    ids: &[InstrumentId],
) -> Vec<RiskError> {
    let mut errors = Vec::new();
    for &id in ids {
        if let Err(err) = op.apply(arena, id) {
            errors.push(err);
        }
    }
    errors
}

/// One stochastic step: stocks diffuse, options decay and re-price, bonds
/// follow a synthetic rate increment.
pub struct MonteCarloStep<'a> {
    pub model: &'a mut dyn Model,
    pub dt: f64,
    /// When present, rates and vols come from the environment instead of the
    /// model's fallback parameters.
    pub env: Option<&'a MarketEnvironment>,
}

impl Revalue for MonteCarloStep<'_> {
    fn apply(&mut self, arena: &mut InstrumentArena, id: InstrumentId) -> Result<(), RiskError> {
        match arena.instrument(id) {
            Instrument::Stock { ticker, price } => {
                let ticker = ticker.clone();
                let current = *price;
                let next = match self.env {
                    Some(env) => self.model.step_in_env(current, self.dt, &ticker, env),
                    None => self.model.step(current, self.dt),
                };
                if !next.is_finite() || next <= 0.0 {
                    return Err(RiskError::NumericalError(format!(
                        "{ticker}: simulated price {next} is not a positive finite number"
                    )));
                }
                arena.set_price(id, next);
                Ok(())
            }
            Instrument::Option(contract) => {
                let ticker = contract.ticker.clone();
                let strike = contract.strike;
                let option_type = contract.option_type;
                let new_tte = (contract.time_to_expiry - self.dt).max(0.0);
                let (underlying_ticker, spot) = {
                    let (t, s) = arena.underlying_quote(contract);
                    (t.to_string(), s)
                };

                let new_price = if new_tte > 0.0 {
                    match self.env {
                        Some(env) => self.model.price_option_in_env(
                            spot,
                            strike,
                            new_tte,
                            &underlying_ticker,
                            env,
                            option_type,
                        ),
                        None => self.model.price_option(
                            spot,
                            strike,
                            new_tte,
                            self.model.rate(),
                            self.model.volatility(),
                            option_type,
                        ),
                    }
                    .map_err(|e| RiskError::NumericalError(format!("{ticker}: {e}")))?
                } else {
                    option_type.intrinsic(spot, strike)
                };

                if let Instrument::Option(contract) = arena.instrument_mut(id) {
                    contract.time_to_expiry = new_tte;
                    contract.price = new_price;
                }
                Ok(())
            }
            Instrument::Bond {
                price,
                duration,
                coupon_rate,
                ..
            } => {
                let (price, duration, coupon_rate) = (*price, *duration, *coupon_rate);
                // Synthetic short-rate increment scaled off a unit GBM step.
                // Crude, but it keeps bond paths responsive to the same
                // generator; a short-rate model would replace this.
                let rate_change = (self.model.step(1.0, self.dt) - 1.0) * 0.1;
                let accrued = coupon_rate * self.dt * 100.0;
                let next = price * (1.0 - duration * rate_change) + accrued;
                arena.set_price(id, next);
                Ok(())
            }
        }
    }
}

/// Replay of one historical day: stocks take the day's return, options decay
/// toward intrinsic, bonds take a scaled inverse rate move.
pub struct HistoricalStep<'a> {
    returns: &'a [f64],
    day_index: usize,
}

impl<'a> HistoricalStep<'a> {
    pub fn new(returns: &'a [f64], day_index: usize) -> Result<Self, RiskError> {
        if returns.is_empty() {
            return Err(RiskError::InvalidInput(
                "historical returns must not be empty".to_string(),
            ));
        }
        Ok(Self { returns, day_index })
    }

    fn day_return(&self) -> f64 {
        self.returns[self.day_index % self.returns.len()]
    }
}

impl Revalue for HistoricalStep<'_> {
    fn apply(&mut self, arena: &mut InstrumentArena, id: InstrumentId) -> Result<(), RiskError> {
        let day_return = self.day_return();
        match arena.instrument(id) {
            Instrument::Stock { ticker, price } => {
                let next = price * (1.0 + day_return);
                if !next.is_finite() || next <= 0.0 {
                    return Err(RiskError::NumericalError(format!(
                        "{ticker}: historical return {day_return} drives the price to {next}"
                    )));
                }
                arena.set_price(id, next);
                Ok(())
            }
            Instrument::Option(contract) => {
                let strike = contract.strike;
                let option_type = contract.option_type;
                let previous = contract.price;
                let new_tte = (contract.time_to_expiry - HISTORICAL_DT).max(0.0);
                let (_, spot) = arena.underlying_quote(contract);

                // Intrinsic floor plus a flat time-value decay; the underlying
                // has already taken the day's return.
                let intrinsic = option_type.intrinsic(spot, strike);
                let new_price = intrinsic.max(previous * 0.99);

                if let Instrument::Option(contract) = arena.instrument_mut(id) {
                    contract.time_to_expiry = new_tte;
                    contract.price = new_price;
                }
                Ok(())
            }
            Instrument::Bond {
                price,
                duration,
                coupon_rate,
                ..
            } => {
                let rate_return = day_return * 0.1;
                let accrued = coupon_rate * HISTORICAL_DT * 100.0;
                let next = price * (1.0 - duration * rate_return) + accrued;
                arena.set_price(id, next);
                Ok(())
            }
        }
    }
}

/// Instantaneous shock: spot move, vol spike, and rate move applied at once.
#[derive(Debug, Clone, Copy)]
pub struct StressShock {
    /// Relative spot move, e.g. -0.20 for a 20% crash.
    pub price_shock: f64,
    /// Absolute vol move from the 20% baseline.
    pub vol_shock: f64,
    /// Absolute rate move from the 5% baseline.
    pub rate_shock: f64,
}

impl Revalue for StressShock {
    fn apply(&mut self, arena: &mut InstrumentArena, id: InstrumentId) -> Result<(), RiskError> {
        match arena.instrument(id) {
            Instrument::Stock { ticker, price } => {
                let next = price * (1.0 + self.price_shock);
                if !next.is_finite() || next <= 0.0 {
                    return Err(RiskError::NumericalError(format!(
                        "{ticker}: spot shock {} drives the price to {next}",
                        self.price_shock
                    )));
                }
                arena.set_price(id, next);
                Ok(())
            }
            Instrument::Option(contract) => {
                let ticker = contract.ticker.clone();
                let strike = contract.strike;
                let tte = contract.time_to_expiry;
                let option_type = contract.option_type;
                let (_, spot) = arena.underlying_quote(contract);

                let stressed_vol = STRESS_BASE_VOL + self.vol_shock;
                let stressed_rate = STRESS_BASE_RATE + self.rate_shock;
                let new_price =
                    black_scholes_price(option_type, spot, strike, stressed_rate, stressed_vol, tte)
                        .map_err(|e| RiskError::NumericalError(format!("{ticker}: {e}")))?;

                arena.set_price(id, new_price);
                Ok(())
            }
            Instrument::Bond { price, duration, .. } => {
                let next = price * (1.0 - duration * self.rate_shock);
                arena.set_price(id, next);
                Ok(())
            }
        }
    }
}

/// Sensitivities of one instrument.
///
/// Stocks are pure delta; bonds expose coupon carry as theta and
/// duration-scaled price sensitivity as rho; options defer to the model.
pub fn instrument_greeks(
    arena: &InstrumentArena,
    id: InstrumentId,
    model: &dyn Model,
    env: Option<&MarketEnvironment>,
) -> Result<Greeks, RiskError> {
    match arena.instrument(id) {
        Instrument::Stock { .. } => Ok(Greeks {
            delta: 1.0,
            ..Greeks::default()
        }),
        Instrument::Option(contract) => {
            let (underlying_ticker, spot) = arena.underlying_quote(contract);
            match env {
                Some(env) => model.greeks_in_env(
                    spot,
                    contract.strike,
                    contract.time_to_expiry,
                    underlying_ticker,
                    env,
                    contract.option_type,
                ),
                None => model.greeks(
                    spot,
                    contract.strike,
                    contract.time_to_expiry,
                    model.rate(),
                    model.volatility(),
                    contract.option_type,
                ),
            }
        }
        Instrument::Bond {
            price,
            duration,
            coupon_rate,
            ..
        } => Ok(Greeks {
            theta: coupon_rate / 365.0,
            rho: -duration * price,
            ..Greeks::default()
        }),
    }
}

/// Quantity-weighted sum of position Greeks.
pub fn portfolio_greeks(
    arena: &InstrumentArena,
    portfolio: &Portfolio,
    model: &dyn Model,
    env: Option<&MarketEnvironment>,
) -> Result<Greeks, RiskError> {
    let mut total = Greeks::default();
    for position in portfolio.positions() {
        let greeks = instrument_greeks(arena, position.instrument(), model, env)?;
        total.add_scaled(&greeks, position.quantity());
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use crate::models::BlackScholesModel;
    use approx::assert_relative_eq;

    fn fixture() -> (InstrumentArena, InstrumentId, InstrumentId, InstrumentId) {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 100.0).unwrap();
        let option = arena
            .add_option("AAPL_C100", 10.45, 100.0, stock, 1.0, OptionType::Call)
            .unwrap();
        let bond = arena.add_bond("UST10Y", 98.0, 8.5, 0.04).unwrap();
        (arena, stock, option, bond)
    }

    #[test]
    fn monte_carlo_step_decays_and_reprices_the_option() {
        let (mut arena, stock, option, bond) = fixture();
        let mut model = BlackScholesModel::new(0.05, 0.20, 42).unwrap();
        let mut op = MonteCarloStep {
            model: &mut model,
            dt: 1.0 / 252.0,
            env: None,
        };

        let errors = revalue_instruments(&mut op, &mut arena, &[stock, option, bond]);
        assert!(errors.is_empty());

        if let Instrument::Option(contract) = arena.instrument(option) {
            assert_relative_eq!(
                contract.time_to_expiry,
                1.0 - 1.0 / 252.0,
                epsilon = 1e-12
            );
            // Re-priced off the already-stepped underlying.
            let expected = black_scholes_price(
                OptionType::Call,
                arena.price(stock),
                100.0,
                0.05,
                0.20,
                contract.time_to_expiry,
            )
            .unwrap();
            assert_relative_eq!(contract.price, expected, epsilon = 1e-12);
        } else {
            panic!("expected option");
        }
    }

    #[test]
    fn expired_option_settles_to_intrinsic() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 110.0).unwrap();
        let option = arena
            .add_option("AAPL_C100", 10.0, 100.0, stock, 0.5 / 252.0, OptionType::Call)
            .unwrap();

        let mut model = BlackScholesModel::new(0.05, 0.20, 42).unwrap();
        let mut op = MonteCarloStep {
            model: &mut model,
            dt: 1.0 / 252.0,
            env: None,
        };
        // Step only the option so the underlying spot stays at 110.
        let errors = revalue_instruments(&mut op, &mut arena, &[option]);
        assert!(errors.is_empty());

        assert_relative_eq!(arena.price(option), 10.0, epsilon = 1e-12);
        if let Instrument::Option(contract) = arena.instrument(option) {
            assert_eq!(contract.time_to_expiry, 0.0);
        }
    }

    #[test]
    fn historical_step_applies_the_days_return() {
        let (mut arena, stock, option, bond) = fixture();
        let returns = [-0.02, 0.01];
        let mut op = HistoricalStep::new(&returns, 0).unwrap();

        let errors = revalue_instruments(&mut op, &mut arena, &[stock, option, bond]);
        assert!(errors.is_empty());

        assert_relative_eq!(arena.price(stock), 98.0, epsilon = 1e-12);
        // max(intrinsic 0, 0.99 * 10.45)
        assert_relative_eq!(arena.price(option), 10.45 * 0.99, epsilon = 1e-12);
        let expected_bond = 98.0 * (1.0 - 8.5 * (-0.02) * 0.1) + 0.04 * (1.0 / 252.0) * 100.0;
        assert_relative_eq!(arena.price(bond), expected_bond, epsilon = 1e-12);
    }

    #[test]
    fn historical_step_wraps_the_day_index() {
        let (mut arena, stock, _, _) = fixture();
        let returns = [-0.02, 0.01];
        let mut op = HistoricalStep::new(&returns, 3).unwrap();
        op.apply(&mut arena, stock).unwrap();
        assert_relative_eq!(arena.price(stock), 101.0, epsilon = 1e-12);
    }

    #[test]
    fn stress_shock_moves_all_three_variants() {
        let (mut arena, stock, option, bond) = fixture();
        let mut op = StressShock {
            price_shock: -0.20,
            vol_shock: 0.10,
            rate_shock: 0.01,
        };

        let errors = revalue_instruments(&mut op, &mut arena, &[stock, option, bond]);
        assert!(errors.is_empty());

        assert_relative_eq!(arena.price(stock), 80.0, epsilon = 1e-12);
        let expected_option =
            black_scholes_price(OptionType::Call, 80.0, 100.0, 0.06, 0.30, 1.0).unwrap();
        assert_relative_eq!(arena.price(option), expected_option, epsilon = 1e-12);
        assert_relative_eq!(arena.price(bond), 98.0 * (1.0 - 8.5 * 0.01), epsilon = 1e-12);
    }

    #[test]
    fn failing_instrument_is_skipped_and_the_rest_continue() {
        let (mut arena, stock, option, bond) = fixture();
        // A vol crash below the baseline drives sigma negative; the option
        // re-price must fail while stock and bond still move.
        let mut op = StressShock {
            price_shock: -0.10,
            vol_shock: -0.30,
            rate_shock: 0.0,
        };
        let before = arena.price(option);

        let errors = revalue_instruments(&mut op, &mut arena, &[stock, option, bond]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RiskError::NumericalError(_)));
        assert_relative_eq!(arena.price(stock), 90.0, epsilon = 1e-12);
        assert_eq!(arena.price(option), before);
        assert_relative_eq!(arena.price(bond), 98.0, epsilon = 1e-12);
    }

    #[test]
    fn greeks_cover_every_variant() {
        let (arena, stock, option, bond) = fixture();
        let model = BlackScholesModel::new(0.05, 0.20, 42).unwrap();

        let stock_g = instrument_greeks(&arena, stock, &model, None).unwrap();
        assert_eq!(stock_g.delta, 1.0);
        assert_eq!(stock_g.gamma, 0.0);

        let option_g = instrument_greeks(&arena, option, &model, None).unwrap();
        assert_relative_eq!(option_g.delta, 0.6368, epsilon = 1e-4);

        let bond_g = instrument_greeks(&arena, bond, &model, None).unwrap();
        assert_relative_eq!(bond_g.theta, 0.04 / 365.0, epsilon = 1e-12);
        assert_relative_eq!(bond_g.rho, -8.5 * 98.0, epsilon = 1e-12);
    }

    #[test]
    fn portfolio_greeks_are_additive_across_portfolios() {
        let (arena, stock, option, _) = fixture();
        let model = BlackScholesModel::new(0.05, 0.20, 42).unwrap();

        let mut combined = Portfolio::new("combined", "USD");
        combined.add_position(&arena, stock, 100.0);
        combined.add_position(&arena, option, -20.0);

        let mut first = Portfolio::new("first", "USD");
        first.add_position(&arena, stock, 100.0);
        let mut second = Portfolio::new("second", "USD");
        second.add_position(&arena, option, -20.0);

        let g_combined = portfolio_greeks(&arena, &combined, &model, None).unwrap();
        let g_first = portfolio_greeks(&arena, &first, &model, None).unwrap();
        let g_second = portfolio_greeks(&arena, &second, &model, None).unwrap();

        assert_relative_eq!(g_combined.delta, g_first.delta + g_second.delta, epsilon = 1e-9);
        assert_relative_eq!(g_combined.vega, g_first.vega + g_second.vega, epsilon = 1e-9);
        assert_relative_eq!(g_combined.theta, g_first.theta + g_second.theta, epsilon = 1e-9);
    }
}
