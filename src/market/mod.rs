//! Market data: term-structured curves and surfaces plus the environment
//! container that keys them by currency and ticker.

pub mod curves;
pub mod environment;
pub mod surface;

pub use curves::{DividendCurve, YieldCurve};
pub use environment::MarketEnvironment;
pub use surface::VolatilitySurface;
