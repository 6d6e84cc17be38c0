//! Historical Value-at-Risk by full scenario revaluation.
//!
//! Each historical day is replayed against the live instrument graph: state is
//! snapshotted, the day's returns are applied through [`HistoricalStep`], the
//! portfolio is revalued, and state is restored before the next scenario. The
//! result is the loss-positive quantile `-dV[floor((1 - confidence) * N)]` of
//! the ascending P&L distribution.
//!
//! The convention is deliberately the raw order statistic rather than an
//! interpolated quantile; with few scenarios the estimate is coarse.

use std::collections::BTreeSet;

use crate::core::RiskError;
use crate::instruments::{Instrument, InstrumentArena, InstrumentId};
use crate::portfolio::Portfolio;
use crate::risk::revalue::{revalue_instruments, HistoricalStep};

/// Instrument ids a portfolio depends on: its positions plus the underlyings
/// of any options, deduplicated and ascending.
pub(crate) fn referenced_ids(arena: &InstrumentArena, portfolio: &Portfolio) -> Vec<InstrumentId> {
    let mut ids = BTreeSet::new();
    for position in portfolio.positions() {
        let id = position.instrument();
        ids.insert(id);
        if let Instrument::Option(contract) = arena.instrument(id) {
            ids.insert(contract.underlying);
        }
    }
    ids.into_iter().collect()
}

/// Historical VaR of `portfolio` at `confidence` over per-day return scenarios.
///
/// `scenarios[d]` holds the return series replayed on day `d`. The arena is
/// mutated during replay but restored to its entry state before returning.
pub fn historical_var(
    arena: &mut InstrumentArena,
    portfolio: &Portfolio,
    scenarios: &[Vec<f64>],
    confidence: f64,
) -> Result<f64, RiskError> {
    if scenarios.is_empty() {
        return Err(RiskError::InvalidInput(
            "historical VaR requires at least one scenario day".to_string(),
        ));
    }
    if !confidence.is_finite() || confidence <= 0.0 || confidence >= 1.0 {
        return Err(RiskError::InvalidInput(format!(
            "confidence must lie in (0, 1), got {confidence}"
        )));
    }

    let ids = referenced_ids(arena, portfolio);
    let snapshot = arena.snapshot_state();
    let base_value = portfolio.total_value(arena);

    let mut pnl = Vec::with_capacity(scenarios.len());
    let mut failures: Vec<RiskError> = Vec::new();

    for day_returns in scenarios {
        let mut step = match HistoricalStep::new(day_returns, 0) {
            Ok(step) => step,
            Err(err) => {
                arena.restore_state(&snapshot)?;
                return Err(err);
            }
        };

        // Failed instruments stay at their pre-scenario state; the scenario
        // still produces a P&L point and the errors surface afterwards.
        failures.extend(revalue_instruments(&mut step, arena, &ids));
        pnl.push(portfolio.total_value(arena) - base_value);
        arena.restore_state(&snapshot)?;
    }

    if let Some(first) = failures.first() {
        return Err(RiskError::NumericalError(format!(
            "{} instrument revaluations failed during VaR replay; first: {first}",
            failures.len()
        )));
    }

    pnl.sort_by(|a, b| a.total_cmp(b));
    let index = (((1.0 - confidence) * pnl.len() as f64).floor() as usize).min(pnl.len() - 1);
    Ok(-pnl[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use approx::assert_relative_eq;

    #[test]
    fn single_stock_var_matches_the_hand_computed_quantile() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 100.0).unwrap();
        let mut portfolio = Portfolio::new("desk", "USD");
        portfolio.add_position(&arena, stock, 100.0);

        let scenarios: Vec<Vec<f64>> = [-0.03, -0.01, 0.0, 0.01, 0.02]
            .iter()
            .map(|r| vec![*r])
            .collect();

        let var = historical_var(&mut arena, &portfolio, &scenarios, 0.95).unwrap();
        assert_relative_eq!(var, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn replay_leaves_the_arena_untouched() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 100.0).unwrap();
        let option = arena
            .add_option("AAPL_C", 10.45, 100.0, stock, 1.0, OptionType::Call)
            .unwrap();
        let mut portfolio = Portfolio::new("desk", "USD");
        portfolio.add_position(&arena, option, 10.0);

        let before = arena.snapshot_state();
        let scenarios = vec![vec![-0.05], vec![0.02], vec![0.01]];
        historical_var(&mut arena, &portfolio, &scenarios, 0.95).unwrap();

        assert_eq!(arena.snapshot_state(), before);
        assert_eq!(arena.price(stock), 100.0);
        assert_eq!(arena.price(option), 10.45);
    }

    #[test]
    fn option_underlyings_move_even_when_held_indirectly() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 120.0).unwrap();
        // Deep in-the-money call held without the stock itself.
        let option = arena
            .add_option("AAPL_C100", 21.0, 100.0, stock, 0.5, OptionType::Call)
            .unwrap();
        let mut portfolio = Portfolio::new("desk", "USD");
        portfolio.add_position(&arena, option, 1.0);

        // A crash scenario must flow through the underlying into intrinsic.
        let scenarios = vec![vec![-0.10], vec![0.0]];
        let var = historical_var(&mut arena, &portfolio, &scenarios, 0.95).unwrap();

        // Crash day: spot 108, intrinsic 8 < 0.99 * 21, so price decays to
        // 20.79; loss is 0.21 per contract.
        assert_relative_eq!(var, 21.0 - 20.79, epsilon = 1e-9);
    }

    #[test]
    fn invalid_confidence_and_empty_scenarios_are_rejected() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 100.0).unwrap();
        let mut portfolio = Portfolio::new("desk", "USD");
        portfolio.add_position(&arena, stock, 1.0);

        assert!(historical_var(&mut arena, &portfolio, &[], 0.95).is_err());
        assert!(historical_var(&mut arena, &portfolio, &[vec![0.01]], 1.0).is_err());
        assert!(historical_var(&mut arena, &portfolio, &[vec![0.01]], 0.0).is_err());
    }
}
