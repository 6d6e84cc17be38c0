//! Correlation matrix with a cached Cholesky factor for multi-asset simulation.
//!
//! References:
//! - Glasserman, P. (2004), *Monte Carlo Methods in Financial Engineering*,
//!   ch. 2.3 (generating correlated normals).
//!
//! The matrix is validated and factorized at construction; the factor is
//! recomputed whenever an entry mutates, so `correlate` never observes a stale
//! factor. Construction is fail-fast: a matrix that is not symmetric PSD with
//! unit diagonal is rejected rather than repaired.

use crate::core::RiskError;

/// Diagonal radicand tolerance below which factorization is rejected.
const CHOLESKY_TOL: f64 = 1.0e-12;

/// Symmetric positive semi-definite correlation matrix over an ordered ticker list.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    tickers: Vec<String>,
    entries: Vec<Vec<f64>>,
    cholesky: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Builds and factorizes a correlation matrix.
    ///
    /// Fails with `InvalidInput` on an empty ticker list or malformed entries
    /// (diagonal != 1, asymmetry, values outside [-1, 1]), with
    /// `DimensionMismatch` when the matrix shape disagrees with the ticker
    /// list, and with `NonPositiveDefinite` when factorization fails.
    pub fn new(tickers: Vec<String>, entries: Vec<Vec<f64>>) -> Result<Self, RiskError> {
        if tickers.is_empty() {
            return Err(RiskError::InvalidInput(
                "correlation matrix requires at least one ticker".to_string(),
            ));
        }

        let n = tickers.len();
        if entries.len() != n || entries.iter().any(|row| row.len() != n) {
            return Err(RiskError::DimensionMismatch(format!(
                "correlation matrix must be {n}x{n} to match the ticker list"
            )));
        }

        validate_entries(&tickers, &entries)?;
        let cholesky = cholesky_lower(&entries)?;

        Ok(Self {
            tickers,
            entries,
            cholesky,
        })
    }

    /// Number of assets covered by the matrix.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Ordered ticker list indexing rows and columns.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Row/column index of `ticker`, if covered.
    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Returns `true` when every ticker in `required` has a row in the matrix.
    pub fn covers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        required.into_iter().all(|t| self.index_of(t).is_some())
    }

    /// Pairwise correlation by index.
    pub fn correlation(&self, i: usize, j: usize) -> f64 {
        self.entries[i][j]
    }

    /// Overrides one off-diagonal pair and refactorizes.
    ///
    /// The previous factor stays in place if the mutated matrix is rejected,
    /// so a failed mutation leaves the matrix unusable for nothing.
    pub fn set_pair(&mut self, a: &str, b: &str, rho: f64) -> Result<(), RiskError> {
        let i = self
            .index_of(a)
            .ok_or_else(|| RiskError::UnknownTicker(format!("no correlation row for {a}")))?;
        let j = self
            .index_of(b)
            .ok_or_else(|| RiskError::UnknownTicker(format!("no correlation row for {b}")))?;
        if i == j {
            return Err(RiskError::InvalidInput(
                "cannot override a diagonal correlation entry".to_string(),
            ));
        }
        if !rho.is_finite() || !(-1.0..=1.0).contains(&rho) {
            return Err(RiskError::InvalidInput(format!(
                "correlation for ({a}, {b}) must be finite and in [-1, 1], got {rho}"
            )));
        }

        let mut candidate = self.entries.clone();
        candidate[i][j] = rho;
        candidate[j][i] = rho;
        let cholesky = cholesky_lower(&candidate)?;

        self.entries = candidate;
        self.cholesky = cholesky;
        Ok(())
    }

    /// Cached lower-triangular factor `L` with `L * L^T = Sigma`.
    pub fn cholesky(&self) -> &[Vec<f64>] {
        &self.cholesky
    }

    /// Transforms independent standard normals into correlated shocks `L * z`.
    pub fn correlate(&self, z: &[f64]) -> Result<Vec<f64>, RiskError> {
        let n = self.len();
        if z.len() != n {
            return Err(RiskError::DimensionMismatch(format!(
                "shock vector length {} does not match matrix size {n}",
                z.len()
            )));
        }

        let mut out = vec![0.0; n];
        for (i, row) in self.cholesky.iter().enumerate() {
            let mut sum = 0.0;
            for (l_ij, z_j) in row.iter().zip(z.iter()).take(i + 1) {
                sum += l_ij * z_j;
            }
            out[i] = sum;
        }
        Ok(out)
    }
}

fn validate_entries(tickers: &[String], entries: &[Vec<f64>]) -> Result<(), RiskError> {
    let n = tickers.len();
    for (i, row) in entries.iter().enumerate() {
        let diag = row[i];
        if !diag.is_finite() || (diag - 1.0).abs() > 1.0e-10 {
            return Err(RiskError::InvalidInput(format!(
                "correlation diagonal for {} must be 1, got {diag}",
                tickers[i]
            )));
        }
        for (j, &rho) in row.iter().enumerate() {
            if !rho.is_finite() || !(-1.0..=1.0).contains(&rho) {
                return Err(RiskError::InvalidInput(format!(
                    "correlation ({}, {}) must be finite and in [-1, 1], got {rho}",
                    tickers[i], tickers[j]
                )));
            }
            if (rho - entries[j][i]).abs() > 1.0e-10 {
                return Err(RiskError::InvalidInput(format!(
                    "correlation matrix is not symmetric at ({}, {})",
                    tickers[i], tickers[j]
                )));
            }
        }
    }
    Ok(())
}

/// Standard Cholesky recurrence for symmetric PSD matrices.
///
/// `L[j][j] = sqrt(Sigma[j][j] - sum_k L[j][k]^2)` and
/// `L[i][j] = (Sigma[i][j] - sum_k L[i][k] L[j][k]) / L[j][j]` for `i > j`.
fn cholesky_lower(entries: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RiskError> {
    let n = entries.len();
    let mut l = vec![vec![0.0_f64; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = entries[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= CHOLESKY_TOL {
                    return Err(RiskError::NonPositiveDefinite(format!(
                        "diagonal radicand {sum:.3e} at row {i} is not positive"
                    )));
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    Ok(l)
}
