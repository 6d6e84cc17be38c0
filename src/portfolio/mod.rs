//! Positions and portfolios: quantity-weighted holdings over arena instruments.
//!
//! A position references its instrument by id and carries the last snapshot
//! price for mark-to-market P&L. Portfolios own their positions; instruments
//! are shared and stay in the arena.

use crate::instruments::{InstrumentArena, InstrumentId};

/// Quantity of one instrument plus the price recorded at the last snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    instrument: InstrumentId,
    quantity: f64,
    last_price: f64,
}

impl Position {
    /// Opens a position; the snapshot price starts at the current price, so
    /// P&L begins at zero.
    pub fn new(arena: &InstrumentArena, instrument: InstrumentId, quantity: f64) -> Self {
        Self {
            instrument,
            quantity,
            last_price: arena.price(instrument),
        }
    }

    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: f64) {
        self.quantity = quantity;
    }

    pub fn adjust_quantity(&mut self, delta: f64) {
        self.quantity += delta;
    }

    /// Quantity times the instrument's current price.
    pub fn market_value(&self, arena: &InstrumentArena) -> f64 {
        self.quantity * arena.price(self.instrument)
    }

    /// Records the current price as the P&L reference.
    pub fn snapshot_price(&mut self, arena: &InstrumentArena) {
        self.last_price = arena.price(self.instrument);
    }

    /// Mark-to-market P&L since the last snapshot.
    pub fn pnl(&self, arena: &InstrumentArena) -> f64 {
        self.quantity * (arena.price(self.instrument) - self.last_price)
    }
}

/// Ordered collection of positions with an owner and a reporting currency.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Portfolio {
    owner: String,
    currency: String,
    positions: Vec<Position>,
}

impl Portfolio {
    pub fn new(owner: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            currency: currency.into(),
            positions: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn add_position(&mut self, arena: &InstrumentArena, instrument: InstrumentId, quantity: f64) {
        self.positions.push(Position::new(arena, instrument, quantity));
    }

    /// Sum of position market values.
    pub fn total_value(&self, arena: &InstrumentArena) -> f64 {
        self.positions.iter().map(|p| p.market_value(arena)).sum()
    }

    /// Sum of position P&Ls since their snapshots.
    pub fn total_pnl(&self, arena: &InstrumentArena) -> f64 {
        self.positions.iter().map(|p| p.pnl(arena)).sum()
    }

    /// Re-bases every position's P&L reference to the current prices.
    pub fn snapshot_prices(&mut self, arena: &InstrumentArena) {
        for position in &mut self.positions {
            position.snapshot_price(arena);
        }
    }
}
