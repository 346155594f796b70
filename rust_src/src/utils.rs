//! Shared numerical helpers.

/// Half-width, in standard deviations, of the normal quadrature grid.
const GRID_HALF_WIDTH: f64 = 5.0;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

#[inline]
pub fn logsumexp(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = arr.iter().map(|x| (x - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Evenly spaced standard-normal grid with normalized density weights.
///
/// Nodes span `[-5, 5]`; weights are proportional to the N(0, 1) density
/// and sum to one.
pub fn normal_grid(n: usize) -> (Vec<f64>, Vec<f64>) {
    if n < 2 {
        return (vec![0.0], vec![1.0]);
    }
    let step = 2.0 * GRID_HALF_WIDTH / (n - 1) as f64;
    let mut nodes = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..n {
        let x = -GRID_HALF_WIDTH + i as f64 * step;
        nodes.push(x);
        weights.push((-0.5 * x * x).exp());
    }
    let sum: f64 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= sum;
    }
    (nodes, weights)
}

/// Converts unnormalized log posterior values into probabilities.
pub fn normalize_log_posterior(log_posterior: &[f64]) -> Vec<f64> {
    let log_norm = logsumexp(log_posterior);
    log_posterior
        .iter()
        .map(|&lp| (lp - log_norm).exp())
        .collect()
}
