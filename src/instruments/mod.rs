//! Tradeable instruments as a closed sum type, owned by an arena.
//!
//! Instruments are pure data: evolution and valuation live in the revaluation
//! operations, which pattern-match over the variants so totality is checked at
//! compile time. Sharing is expressed through [`InstrumentId`]: one stock may
//! back many options and many positions across portfolios, and the arena keeps
//! exactly one mutable home for its price. An option's underlying id always
//! precedes the option itself, so passes in id order see shocked underlyings
//! before repricing the derivative.

use crate::core::{OptionType, RiskError};

/// Stable handle into an [`InstrumentArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstrumentId(usize);

impl InstrumentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// European option contract data.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionContract {
    pub ticker: String,
    /// Current premium.
    pub price: f64,
    pub strike: f64,
    /// Underlying stock; must outlive the option, which the arena guarantees.
    pub underlying: InstrumentId,
    /// Remaining life in years.
    pub time_to_expiry: f64,
    pub option_type: OptionType,
}

impl OptionContract {
    /// Exercise value against the underlying spot `s`.
    pub fn intrinsic_value(&self, s: f64) -> f64 {
        self.option_type.intrinsic(s, self.strike)
    }
}

/// Closed set of instrument variants.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Instrument {
    Stock {
        ticker: String,
        price: f64,
    },
    Option(OptionContract),
    Bond {
        ticker: String,
        /// Clean price.
        price: f64,
        /// Macaulay duration in years.
        duration: f64,
        /// Annual coupon as a decimal.
        coupon_rate: f64,
    },
}

impl Instrument {
    pub fn ticker(&self) -> &str {
        match self {
            Self::Stock { ticker, .. } => ticker,
            Self::Option(option) => &option.ticker,
            Self::Bond { ticker, .. } => ticker,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            Self::Stock { price, .. } => *price,
            Self::Option(option) => option.price,
            Self::Bond { price, .. } => *price,
        }
    }

    pub fn set_price(&mut self, new_price: f64) {
        match self {
            Self::Stock { price, .. } => *price = new_price,
            Self::Option(option) => option.price = new_price,
            Self::Bond { price, .. } => *price = new_price,
        }
    }

    pub fn is_stock(&self) -> bool {
        matches!(self, Self::Stock { .. })
    }
}

/// Owner of every instrument in an engine, addressed by [`InstrumentId`].
///
/// Ids are minted in insertion order and never invalidated; instruments live
/// as long as the arena.
#[derive(Debug, Clone, Default)]
pub struct InstrumentArena {
    instruments: Vec<Instrument>,
}

impl InstrumentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Adds a stock; the price must be a finite positive number.
    pub fn add_stock(
        &mut self,
        ticker: impl Into<String>,
        price: f64,
    ) -> Result<InstrumentId, RiskError> {
        let ticker = ticker.into();
        if !price.is_finite() || price <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: stock price must be finite and > 0, got {price}"
            )));
        }
        Ok(self.push(Instrument::Stock { ticker, price }))
    }

    /// Adds a European option written on an existing stock.
    pub fn add_option(
        &mut self,
        ticker: impl Into<String>,
        premium: f64,
        strike: f64,
        underlying: InstrumentId,
        time_to_expiry: f64,
        option_type: OptionType,
    ) -> Result<InstrumentId, RiskError> {
        let ticker = ticker.into();
        if !premium.is_finite() || premium < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: option premium must be finite and >= 0, got {premium}"
            )));
        }
        if !strike.is_finite() || strike <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: option strike must be finite and > 0, got {strike}"
            )));
        }
        if !time_to_expiry.is_finite() || time_to_expiry < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: time to expiry must be finite and >= 0, got {time_to_expiry}"
            )));
        }
        match self.instruments.get(underlying.0) {
            Some(Instrument::Stock { .. }) => {}
            Some(other) => {
                return Err(RiskError::InvalidInput(format!(
                    "{ticker}: option underlying {} is not a stock",
                    other.ticker()
                )));
            }
            None => {
                return Err(RiskError::InvalidInput(format!(
                    "{ticker}: option underlying id {} does not exist",
                    underlying.0
                )));
            }
        }

        Ok(self.push(Instrument::Option(OptionContract {
            ticker,
            price: premium,
            strike,
            underlying,
            time_to_expiry,
            option_type,
        })))
    }

    /// Adds a fixed-rate bond.
    pub fn add_bond(
        &mut self,
        ticker: impl Into<String>,
        price: f64,
        duration: f64,
        coupon_rate: f64,
    ) -> Result<InstrumentId, RiskError> {
        let ticker = ticker.into();
        if !price.is_finite() || price <= 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: bond price must be finite and > 0, got {price}"
            )));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: bond duration must be finite and >= 0, got {duration}"
            )));
        }
        if !coupon_rate.is_finite() || coupon_rate < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{ticker}: bond coupon must be finite and >= 0, got {coupon_rate}"
            )));
        }
        Ok(self.push(Instrument::Bond {
            ticker,
            price,
            duration,
            coupon_rate,
        }))
    }

    fn push(&mut self, instrument: Instrument) -> InstrumentId {
        let id = InstrumentId(self.instruments.len());
        self.instruments.push(instrument);
        id
    }

    pub fn instrument(&self, id: InstrumentId) -> &Instrument {
        &self.instruments[id.0]
    }

    pub fn instrument_mut(&mut self, id: InstrumentId) -> &mut Instrument {
        &mut self.instruments[id.0]
    }

    pub fn contains(&self, id: InstrumentId) -> bool {
        id.0 < self.instruments.len()
    }

    pub fn price(&self, id: InstrumentId) -> f64 {
        self.instruments[id.0].price()
    }

    pub fn set_price(&mut self, id: InstrumentId, price: f64) {
        self.instruments[id.0].set_price(price);
    }

    /// All ids in insertion (ascending) order.
    pub fn ids(&self) -> impl Iterator<Item = InstrumentId> + '_ {
        (0..self.instruments.len()).map(InstrumentId)
    }

    /// Underlying ticker and current spot for an option contract.
    pub fn underlying_quote(&self, option: &OptionContract) -> (&str, f64) {
        let underlying = self.instrument(option.underlying);
        (underlying.ticker(), underlying.price())
    }

    /// Captures per-instrument `(price, time_to_expiry)` state for scenario
    /// replay; paired with [`Self::restore_state`].
    pub fn snapshot_state(&self) -> Vec<(f64, Option<f64>)> {
        self.instruments
            .iter()
            .map(|instrument| match instrument {
                Instrument::Option(option) => (option.price, Some(option.time_to_expiry)),
                other => (other.price(), None),
            })
            .collect()
    }

    /// Restores state captured by [`Self::snapshot_state`].
    pub fn restore_state(&mut self, snapshot: &[(f64, Option<f64>)]) -> Result<(), RiskError> {
        if snapshot.len() != self.instruments.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "snapshot covers {} instruments but the arena holds {}",
                snapshot.len(),
                self.instruments.len()
            )));
        }
        for (instrument, (price, tte)) in self.instruments.iter_mut().zip(snapshot) {
            instrument.set_price(*price);
            if let (Instrument::Option(option), Some(tte)) = (instrument, tte) {
                option.time_to_expiry = *tte;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_requires_an_existing_stock_underlying() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 150.0).unwrap();
        let bond = arena.add_bond("UST10Y", 98.0, 8.5, 0.04).unwrap();

        assert!(arena
            .add_option("AAPL_C160", 5.0, 160.0, stock, 1.0, OptionType::Call)
            .is_ok());
        assert!(arena
            .add_option("BAD", 5.0, 160.0, bond, 1.0, OptionType::Call)
            .is_err());
        assert!(arena
            .add_option("BAD", 5.0, 160.0, InstrumentId(99), 1.0, OptionType::Call)
            .is_err());
    }

    #[test]
    fn constructor_validation_rejects_bad_fields() {
        let mut arena = InstrumentArena::new();
        assert!(arena.add_stock("AAPL", 0.0).is_err());
        assert!(arena.add_stock("AAPL", f64::NAN).is_err());

        let stock = arena.add_stock("AAPL", 150.0).unwrap();
        assert!(arena
            .add_option("X", -1.0, 100.0, stock, 1.0, OptionType::Put)
            .is_err());
        assert!(arena
            .add_option("X", 1.0, 0.0, stock, 1.0, OptionType::Put)
            .is_err());
        assert!(arena
            .add_option("X", 1.0, 100.0, stock, -0.5, OptionType::Put)
            .is_err());
        assert!(arena.add_bond("B", 100.0, -1.0, 0.04).is_err());
    }

    #[test]
    fn one_stock_backs_many_options() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 150.0).unwrap();
        let call = arena
            .add_option("AAPL_C", 8.0, 155.0, stock, 0.5, OptionType::Call)
            .unwrap();
        let put = arena
            .add_option("AAPL_P", 6.0, 145.0, stock, 0.5, OptionType::Put)
            .unwrap();

        arena.set_price(stock, 160.0);
        for id in [call, put] {
            if let Instrument::Option(option) = arena.instrument(id) {
                let (ticker, spot) = arena.underlying_quote(option);
                assert_eq!(ticker, "AAPL");
                assert_eq!(spot, 160.0);
            } else {
                panic!("expected option");
            }
        }
    }

    #[test]
    fn snapshot_round_trips_prices_and_expiries() {
        let mut arena = InstrumentArena::new();
        let stock = arena.add_stock("AAPL", 150.0).unwrap();
        let option = arena
            .add_option("AAPL_C", 8.0, 155.0, stock, 0.5, OptionType::Call)
            .unwrap();

        let snapshot = arena.snapshot_state();

        arena.set_price(stock, 120.0);
        arena.set_price(option, 1.0);
        if let Instrument::Option(contract) = arena.instrument_mut(option) {
            contract.time_to_expiry = 0.25;
        }

        arena.restore_state(&snapshot).unwrap();
        assert_eq!(arena.price(stock), 150.0);
        assert_eq!(arena.price(option), 8.0);
        if let Instrument::Option(contract) = arena.instrument(option) {
            assert_eq!(contract.time_to_expiry, 0.5);
        }
    }
}
