//! Zero-rate and dividend term structures.
//!
//! The yield curve interpolates linearly in rate space between tenor knots and
//! extrapolates flat outside the grid; discount factors are continuously
//! compounded from the interpolated zero rate. Bumps are parallel shifts and
//! are exactly reversible, which scenario round trips rely on.

use crate::core::RiskError;
use crate::math::bracket;

/// Tenor used as the overnight proxy by simulation steps.
const SHORT_RATE_TENOR: f64 = 1.0 / 365.0;

/// Term structure of continuously-compounded zero rates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct YieldCurve {
    tenors: Vec<f64>,
    rates: Vec<f64>,
    flat_rate: f64,
}

impl YieldCurve {
    /// Flat curve at `rate` for every maturity.
    pub fn flat(rate: f64) -> Self {
        Self {
            tenors: Vec::new(),
            rates: Vec::new(),
            flat_rate: rate,
        }
    }

    /// Curve from `(tenor, zero rate)` knots.
    ///
    /// Tenors must be strictly increasing and the two slices must have equal,
    /// non-zero length.
    pub fn new(tenors: Vec<f64>, rates: Vec<f64>) -> Result<Self, RiskError> {
        if tenors.len() != rates.len() {
            return Err(RiskError::InvalidInput(format!(
                "yield curve has {} tenors but {} rates",
                tenors.len(),
                rates.len()
            )));
        }
        if tenors.is_empty() {
            return Err(RiskError::InvalidInput(
                "yield curve requires at least one tenor".to_string(),
            ));
        }
        if tenors.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RiskError::InvalidInput(
                "yield curve tenors must be strictly increasing".to_string(),
            ));
        }
        if tenors.iter().chain(rates.iter()).any(|x| !x.is_finite()) {
            return Err(RiskError::InvalidInput(
                "yield curve knots must be finite".to_string(),
            ));
        }

        let flat_rate = rates[0];
        Ok(Self {
            tenors,
            rates,
            flat_rate,
        })
    }

    /// Zero rate at maturity `t`, linearly interpolated between knots and
    /// extrapolated flat outside the grid.
    pub fn rate(&self, t: f64) -> f64 {
        if self.tenors.is_empty() {
            return self.flat_rate;
        }
        let (lo, hi, w) = bracket(&self.tenors, t);
        self.rates[lo] + w * (self.rates[hi] - self.rates[lo])
    }

    /// Discount factor `exp(-r(t) * t)`.
    pub fn discount_factor(&self, t: f64) -> f64 {
        (-self.rate(t) * t).exp()
    }

    /// Continuously-compounded forward rate between `t1` and `t2`.
    ///
    /// Degenerates to the zero rate at `t1` when the interval is empty.
    pub fn forward_rate(&self, t1: f64, t2: f64) -> f64 {
        if t2 <= t1 {
            return self.rate(t1);
        }
        let df1 = self.discount_factor(t1);
        let df2 = self.discount_factor(t2);
        (df1 / df2).ln() / (t2 - t1)
    }

    /// Overnight rate proxy used by simulation steps.
    pub fn short_rate(&self) -> f64 {
        self.rate(SHORT_RATE_TENOR)
    }

    /// Parallel shift of every knot and the flat fallback by `delta`.
    pub fn bump(&mut self, delta: f64) {
        self.flat_rate += delta;
        for rate in &mut self.rates {
            *rate += delta;
        }
    }
}

impl Default for YieldCurve {
    fn default() -> Self {
        Self::flat(0.05)
    }
}

/// Continuous dividend yield plus an optional discrete payment schedule.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct DividendCurve {
    continuous_yield: f64,
    // (ex-date in years, cash amount), ascending in time.
    discrete: Vec<(f64, f64)>,
}

impl DividendCurve {
    /// Curve with only a continuous yield.
    pub fn continuous(continuous_yield: f64) -> Result<Self, RiskError> {
        Self::new(continuous_yield, Vec::new())
    }

    /// Curve with a continuous yield and discrete cash dividends.
    pub fn new(continuous_yield: f64, mut discrete: Vec<(f64, f64)>) -> Result<Self, RiskError> {
        if !continuous_yield.is_finite() || continuous_yield < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "continuous dividend yield must be finite and >= 0, got {continuous_yield}"
            )));
        }
        if discrete
            .iter()
            .any(|(t, amount)| !t.is_finite() || !amount.is_finite() || *amount < 0.0)
        {
            return Err(RiskError::InvalidInput(
                "discrete dividends must have finite times and non-negative amounts".to_string(),
            ));
        }
        discrete.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(Self {
            continuous_yield,
            discrete,
        })
    }

    pub fn continuous_yield(&self) -> f64 {
        self.continuous_yield
    }

    /// Present value of discrete dividends paid in `(0, t]`, discounted on `curve`.
    pub fn pv_dividends(&self, t: f64, curve: &YieldCurve) -> f64 {
        self.discrete
            .iter()
            .filter(|(ex_date, _)| *ex_date > 0.0 && *ex_date <= t)
            .map(|(ex_date, amount)| amount * curve.discount_factor(*ex_date))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn upward_curve() -> YieldCurve {
        YieldCurve::new(
            vec![0.25, 0.5, 1.0, 2.0, 5.0],
            vec![0.040, 0.042, 0.045, 0.048, 0.050],
        )
        .unwrap()
    }

    #[test]
    fn interpolation_is_exact_at_knots() {
        let curve = upward_curve();
        assert_relative_eq!(curve.rate(0.25), 0.040, epsilon = 1e-12);
        assert_relative_eq!(curve.rate(1.0), 0.045, epsilon = 1e-12);
        assert_relative_eq!(curve.rate(5.0), 0.050, epsilon = 1e-12);
    }

    #[test]
    fn interpolation_is_linear_between_knots() {
        let curve = upward_curve();
        assert_relative_eq!(curve.rate(1.5), 0.0465, epsilon = 1e-12);
    }

    #[test]
    fn extrapolation_is_flat_outside_the_grid() {
        let curve = upward_curve();
        assert_relative_eq!(curve.rate(0.01), 0.040, epsilon = 1e-12);
        assert_relative_eq!(curve.rate(30.0), 0.050, epsilon = 1e-12);
    }

    #[test]
    fn bump_shifts_every_lookup_and_reverses_exactly() {
        let mut curve = upward_curve();
        let before = curve.rate(1.5);

        curve.bump(0.01);
        assert_relative_eq!(curve.rate(1.5), before + 0.01, epsilon = 1e-12);

        curve.bump(-0.01);
        assert_eq!(curve.rate(1.5), before);
    }

    #[test]
    fn forward_rate_recovers_flat_curve_rate() {
        let curve = YieldCurve::flat(0.05);
        assert_relative_eq!(curve.forward_rate(1.0, 2.0), 0.05, epsilon = 1e-12);
        assert_relative_eq!(curve.forward_rate(2.0, 1.0), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn forward_rate_is_consistent_with_discount_factors() {
        let curve = upward_curve();
        let f = curve.forward_rate(1.0, 2.0);
        let df_implied = curve.discount_factor(1.0) * (-f * 1.0).exp();
        assert_relative_eq!(df_implied, curve.discount_factor(2.0), epsilon = 1e-12);
    }

    #[test]
    fn mismatched_knot_lengths_are_rejected() {
        let err = YieldCurve::new(vec![0.5, 1.0], vec![0.04]).unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput(_)));
    }

    #[test]
    fn non_increasing_tenors_are_rejected() {
        let err = YieldCurve::new(vec![1.0, 1.0], vec![0.04, 0.05]).unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput(_)));
    }

    #[test]
    fn dividend_pv_discounts_payments_inside_the_horizon() {
        let curve = YieldCurve::flat(0.05);
        let divs = DividendCurve::new(0.0, vec![(0.5, 1.0), (1.5, 2.0)]).unwrap();

        let pv_1y = divs.pv_dividends(1.0, &curve);
        assert_relative_eq!(pv_1y, (-0.05_f64 * 0.5).exp(), epsilon = 1e-12);

        let pv_2y = divs.pv_dividends(2.0, &curve);
        let expected = (-0.05_f64 * 0.5).exp() + 2.0 * (-0.05_f64 * 1.5).exp();
        assert_relative_eq!(pv_2y, expected, epsilon = 1e-12);
    }

    #[test]
    fn negative_dividend_yield_is_rejected() {
        assert!(DividendCurve::continuous(-0.01).is_err());
    }
}
