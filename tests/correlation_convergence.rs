//! Statistical validation of the correlated multi-asset simulator.
//!
//! With a target correlation rho and many one-step paths, the empirical
//! correlation of log-returns must converge to rho. The tolerance of 0.05 is
//! generous for 100k paths (the standard error of a correlation estimate at
//! this sample size is well under 0.01), so failures indicate a shaping bug,
//! not noise.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use ironrisk::market::MarketEnvironment;
use ironrisk::math::CorrelationMatrix;
use ironrisk::mc::MultiAssetSimulator;
use ironrisk::models::BlackScholesModel;

const PATHS: usize = 100_000;
const DT: f64 = 1.0 / 252.0;

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

fn empirical_correlation(rho: f64, seed: u64) -> f64 {
    let mut env = MarketEnvironment::new();
    env.set_correlation_matrix(
        CorrelationMatrix::new(
            vec!["AAA".to_string(), "BBB".to_string()],
            vec![vec![1.0, rho], vec![rho, 1.0]],
        )
        .unwrap(),
    );

    let mut prices = BTreeMap::new();
    prices.insert("AAA".to_string(), 100.0);
    prices.insert("BBB".to_string(), 100.0);

    let mut model = BlackScholesModel::new(0.05, 0.20, seed).unwrap();
    let mut sim = MultiAssetSimulator::new(seed);

    let mut returns_a = Vec::with_capacity(PATHS);
    let mut returns_b = Vec::with_capacity(PATHS);
    for _ in 0..PATHS {
        let next = sim.step(&mut model, &prices, DT, &env).unwrap();
        returns_a.push((next["AAA"] / 100.0_f64).ln());
        returns_b.push((next["BBB"] / 100.0_f64).ln());
    }

    pearson(&returns_a, &returns_b)
}

#[test]
fn log_return_correlation_converges_to_the_target() {
    for &rho in &[-0.6, 0.0, 0.5, 0.9] {
        let estimate = empirical_correlation(rho, 42);
        assert!(
            (estimate - rho).abs() < 0.05,
            "target {rho}, empirical {estimate}"
        );
    }
}

#[test]
fn cholesky_factor_reconstructs_the_matrix() {
    let tickers: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
    let entries = vec![
        vec![1.0, 0.55, 0.30, 0.10],
        vec![0.55, 1.0, 0.45, 0.20],
        vec![0.30, 0.45, 1.0, 0.35],
        vec![0.10, 0.20, 0.35, 1.0],
    ];
    let corr = CorrelationMatrix::new(tickers, entries.clone()).unwrap();
    let l = corr.cholesky();

    let n = entries.len();
    for i in 0..n {
        for j in 0..n {
            let mut reconstructed = 0.0;
            for k in 0..n {
                reconstructed += l[i][k] * l[j][k];
            }
            assert_relative_eq!(reconstructed, entries[i][j], epsilon = 1e-10);
        }
    }
}

#[test]
fn non_psd_input_cannot_be_constructed() {
    let tickers: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    // Pairwise correlations that are jointly infeasible.
    let entries = vec![
        vec![1.0, 0.9, -0.9],
        vec![0.9, 1.0, 0.9],
        vec![-0.9, 0.9, 1.0],
    ];
    assert!(CorrelationMatrix::new(tickers, entries).is_err());
}
