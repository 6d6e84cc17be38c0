//! Monte Carlo machinery: correlated multi-asset stepping and a path-based
//! European pricer.

pub mod multi_asset;
pub mod pricer;

pub use multi_asset::MultiAssetSimulator;
pub use pricer::MonteCarloPricer;
