//! Implied volatility surface keyed by strike and expiry.
//!
//! Lookups interpolate bilinearly inside the grid and extrapolate flat on each
//! axis, so a quote below the smallest strike or beyond the longest expiry
//! returns the edge value. A surface built without a grid is flat everywhere.

use crate::core::RiskError;
use crate::math::bracket;

/// Implied volatility by (strike, expiry), with a flat fallback.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolatilitySurface {
    strikes: Vec<f64>,
    expiries: Vec<f64>,
    // Grid rows are expiries, columns are strikes.
    vols: Vec<Vec<f64>>,
    flat_vol: f64,
}

impl VolatilitySurface {
    /// Flat surface at `vol` for every strike and expiry.
    pub fn flat(vol: f64) -> Self {
        Self {
            strikes: Vec::new(),
            expiries: Vec::new(),
            vols: Vec::new(),
            flat_vol: vol,
        }
    }

    /// Surface from a `[expiry][strike]` grid.
    ///
    /// Both axes must be strictly increasing; every cell must be a finite,
    /// non-negative vol. The flat fallback is seeded from the first row's
    /// middle strike (the nearest thing to an at-the-money quote).
    pub fn from_grid(
        strikes: Vec<f64>,
        expiries: Vec<f64>,
        vols: Vec<Vec<f64>>,
    ) -> Result<Self, RiskError> {
        if strikes.is_empty() || expiries.is_empty() {
            return Err(RiskError::InvalidInput(
                "vol surface requires at least one strike and one expiry".to_string(),
            ));
        }
        if strikes.windows(2).any(|w| w[1] <= w[0])
            || expiries.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(RiskError::InvalidInput(
                "vol surface strikes and expiries must be strictly increasing".to_string(),
            ));
        }
        if vols.len() != expiries.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "vol grid has {} rows but {} expiries",
                vols.len(),
                expiries.len()
            )));
        }
        if vols.iter().any(|row| row.len() != strikes.len()) {
            return Err(RiskError::DimensionMismatch(format!(
                "every vol grid row must have {} strikes",
                strikes.len()
            )));
        }
        if vols
            .iter()
            .flatten()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(RiskError::InvalidInput(
                "vol grid cells must be finite and >= 0".to_string(),
            ));
        }

        let flat_vol = vols[0][strikes.len() / 2];
        Ok(Self {
            strikes,
            expiries,
            vols,
            flat_vol,
        })
    }

    /// Implied vol at `(strike, expiry)` with bilinear interpolation.
    pub fn vol(&self, strike: f64, expiry: f64) -> f64 {
        if self.strikes.is_empty() {
            return self.flat_vol;
        }

        let (e_lo, e_hi, e_w) = bracket(&self.expiries, expiry);
        let (s_lo, s_hi, s_w) = bracket(&self.strikes, strike);

        let v00 = self.vols[e_lo][s_lo];
        let v01 = self.vols[e_lo][s_hi];
        let v10 = self.vols[e_hi][s_lo];
        let v11 = self.vols[e_hi][s_hi];

        let near = v00 + s_w * (v01 - v00);
        let far = v10 + s_w * (v11 - v10);
        near + e_w * (far - near)
    }

    /// At-the-money vol for `expiry`, read at the grid's middle strike.
    pub fn atm_vol(&self, expiry: f64) -> f64 {
        if self.strikes.is_empty() {
            return self.flat_vol;
        }
        let atm_strike = self.strikes[self.strikes.len() / 2];
        self.vol(atm_strike, expiry)
    }

    pub fn flat_vol(&self) -> f64 {
        self.flat_vol
    }

    /// Parallel shift of every cell and the flat fallback by `delta`.
    pub fn bump(&mut self, delta: f64) {
        self.flat_vol += delta;
        for row in &mut self.vols {
            for v in row {
                *v += delta;
            }
        }
    }
}

impl Default for VolatilitySurface {
    fn default() -> Self {
        Self::flat(0.20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn smile_surface() -> VolatilitySurface {
        VolatilitySurface::from_grid(
            vec![90.0, 100.0, 110.0],
            vec![0.25, 1.0],
            vec![vec![0.25, 0.20, 0.24], vec![0.23, 0.19, 0.22]],
        )
        .unwrap()
    }

    #[test]
    fn lookup_is_exact_at_grid_nodes() {
        let surface = smile_surface();
        assert_relative_eq!(surface.vol(90.0, 0.25), 0.25, epsilon = 1e-12);
        assert_relative_eq!(surface.vol(110.0, 1.0), 0.22, epsilon = 1e-12);
    }

    #[test]
    fn lookup_interpolates_bilinearly_inside_the_grid() {
        let surface = smile_surface();
        // Midpoint on both axes: average of the four surrounding cells.
        let v = surface.vol(95.0, 0.625);
        assert_relative_eq!(v, (0.25 + 0.20 + 0.23 + 0.19) / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn extrapolation_is_flat_on_each_axis() {
        let surface = smile_surface();
        assert_relative_eq!(surface.vol(50.0, 0.25), 0.25, epsilon = 1e-12);
        assert_relative_eq!(surface.vol(200.0, 0.25), 0.24, epsilon = 1e-12);
        assert_relative_eq!(surface.vol(100.0, 0.01), 0.20, epsilon = 1e-12);
        assert_relative_eq!(surface.vol(100.0, 5.0), 0.19, epsilon = 1e-12);
    }

    #[test]
    fn atm_vol_reads_the_middle_strike() {
        let surface = smile_surface();
        assert_relative_eq!(surface.atm_vol(0.25), 0.20, epsilon = 1e-12);
        assert_relative_eq!(surface.atm_vol(1.0), 0.19, epsilon = 1e-12);
    }

    #[test]
    fn bump_shifts_every_cell_and_the_fallback() {
        let mut surface = smile_surface();
        surface.bump(0.05);
        assert_relative_eq!(surface.vol(90.0, 0.25), 0.30, epsilon = 1e-12);
        assert_relative_eq!(surface.flat_vol(), 0.25, epsilon = 1e-12);

        let mut flat = VolatilitySurface::flat(0.20);
        flat.bump(0.05);
        assert_relative_eq!(flat.vol(123.0, 4.5), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn ragged_grid_is_rejected() {
        let err = VolatilitySurface::from_grid(
            vec![90.0, 100.0],
            vec![0.25, 1.0],
            vec![vec![0.25, 0.20], vec![0.23]],
        )
        .unwrap_err();
        assert!(matches!(err, RiskError::DimensionMismatch(_)));
    }

    #[test]
    fn negative_vol_cell_is_rejected() {
        let err = VolatilitySurface::from_grid(
            vec![90.0, 100.0],
            vec![0.25],
            vec![vec![0.25, -0.01]],
        )
        .unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput(_)));
    }
}
