//! Latent trait estimation: Newton-Raphson maximum likelihood with an
//! expected-a-posteriori fallback.
//!
//! The MLE does not exist when every response sits at the lowest category
//! or every response at the highest, so those patterns go straight to EAP.
//! Otherwise the MLE is tried first and EAP is used only if it fails to
//! converge. Either way the outcome is recorded on the examinee.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{Algorithm, Category, Estimator, Slots};
use crate::covariates::Covariates;
use crate::error::{check_len, CatError, Result};
use crate::examinee::{Administered, EapReason, Examinee, ThetaOutcome};
use crate::item_bank::ItemBank;
use crate::linalg;
use crate::utils::{normal_grid, normalize_log_posterior};

pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_ITER: usize = 20;
pub const DEFAULT_QUADRATURE_POINTS: usize = 41;

/// Multivariate normal prior for EAP, as written in a configuration file.
/// Empty fields default to a standard normal of the bank's dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Prior {
    pub mean: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

/// A validated normal prior: mean and the Cholesky factor of the covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalPrior {
    mean: Array1<f64>,
    chol: Array2<f64>,
}

impl NormalPrior {
    pub fn new(mean: Array1<f64>, covariance: &Array2<f64>) -> Result<Self> {
        let n = mean.len();
        check_len("prior covariance", n, covariance.nrows())?;
        check_len("prior covariance", n, covariance.ncols())?;
        let chol = linalg::cholesky(covariance)
            .ok_or_else(|| CatError::config("prior covariance is not positive definite"))?;
        Ok(Self { mean, chol })
    }

    pub fn standard(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            chol: Array2::eye(dim),
        }
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Product grid of `points` nodes per dimension mapped through the
    /// prior, with the log prior weight of each node.
    pub(crate) fn grid(&self, points: usize) -> Result<(Vec<Array1<f64>>, Vec<f64>)> {
        let dim = self.dim();
        let (nodes, weights) = normal_grid(points);
        let m = nodes.len();
        let total = m.checked_pow(dim as u32).ok_or_else(|| {
            CatError::config(format!("{m}^{dim} quadrature nodes is too many"))
        })?;

        let mut thetas = Vec::with_capacity(total);
        let mut log_weights = Vec::with_capacity(total);
        let mut idx = vec![0usize; dim];
        let mut z = Array1::<f64>::zeros(dim);
        for _ in 0..total {
            let mut log_w = 0.0;
            for (d, &i) in idx.iter().enumerate() {
                z[d] = nodes[i];
                log_w += weights[i].ln();
            }
            thetas.push(&self.mean + &self.chol.dot(&z));
            log_weights.push(log_w);

            for slot in idx.iter_mut() {
                *slot += 1;
                if *slot < m {
                    break;
                }
                *slot = 0;
            }
        }
        Ok((thetas, log_weights))
    }

    pub(crate) fn resolve(prior: &Prior, dim: usize) -> Result<Self> {
        let mean = if prior.mean.is_empty() {
            Array1::zeros(dim)
        } else {
            check_len("prior mean", dim, prior.mean.len())?;
            Array1::from(prior.mean.clone())
        };
        if prior.covariance.is_empty() {
            return Ok(Self {
                mean,
                chol: Array2::eye(dim),
            });
        }
        check_len("prior covariance", dim, prior.covariance.len())?;
        let mut cov = Array2::zeros((dim, dim));
        for (i, row) in prior.covariance.iter().enumerate() {
            check_len("prior covariance", dim, row.len())?;
            for (j, &v) in row.iter().enumerate() {
                cov[[i, j]] = v;
            }
        }
        Self::new(mean, &cov)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimateThetaConfig {
    /// Newton-Raphson stops once every step component is below this.
    pub tolerance: f64,
    pub max_iter: usize,
    /// Grid points per dimension for EAP.
    pub quadrature_points: usize,
    pub prior: Prior,
}

impl Default for EstimateThetaConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iter: DEFAULT_MAX_ITER,
            quadrature_points: DEFAULT_QUADRATURE_POINTS,
            prior: Prior::default(),
        }
    }
}

/// Newton-Raphson maximum likelihood estimate of theta from the items in
/// `history` that have continuous models.
///
/// `theta` is the starting point and, on success, the estimate; `err`
/// receives the inverse of the summed Fisher information there. Returns the
/// number of iterations used. On failure `theta` and `err` are untouched.
pub fn estimate_theta_mle(
    history: &[Administered],
    covariates: &Covariates,
    theta: &mut Array1<f64>,
    err: Option<&mut Array2<f64>>,
    tol: f64,
    max_iter: usize,
) -> Result<usize> {
    let n = theta.len();
    let mut current = theta.clone();
    let mut grad = Array1::<f64>::zeros(n);
    let mut hes = Array2::<f64>::zeros((n, n));

    for iter in 1..=max_iter {
        grad.fill(0.0);
        hes.fill(0.0);
        for a in history {
            if let Some(model) = a.item.continuous() {
                model.log_lik_dtheta(a.response, &current, covariates, &mut grad, &mut hes)?;
            }
        }

        let delta = linalg::solve(&hes, &grad)
            .ok_or(CatError::NonConvergence { iterations: iter })?;
        current -= &delta;
        if current.iter().any(|v| !v.is_finite()) {
            return Err(CatError::NonConvergence { iterations: iter });
        }

        let step = delta.iter().fold(0.0f64, |m, d| m.max(d.abs()));
        tracing::trace!(iter, step, "newton step");
        if step < tol {
            if let Some(err) = err {
                check_len("error matrix", n, err.nrows())?;
                check_len("error matrix", n, err.ncols())?;
                let mut inf = Array2::<f64>::zeros((n, n));
                for a in history {
                    if let Some(model) = a.item.continuous() {
                        model.fisher_inf(&current, covariates, &mut inf)?;
                    }
                }
                let inv = linalg::invert(&inf)
                    .ok_or(CatError::NonConvergence { iterations: iter })?;
                err.assign(&inv);
            }
            theta.assign(&current);
            return Ok(iter);
        }
    }

    Err(CatError::NonConvergence {
        iterations: max_iter,
    })
}

/// Grid nodes under `prior` with their normalized posterior weights given
/// the continuous-model items in `history`.
pub(crate) fn posterior_grid(
    history: &[Administered],
    covariates: &Covariates,
    prior: &NormalPrior,
    points: usize,
) -> Result<(Vec<Array1<f64>>, Vec<f64>)> {
    let (thetas, mut log_post) = prior.grid(points)?;
    for (theta, lp) in thetas.iter().zip(log_post.iter_mut()) {
        for a in history {
            if let Some(model) = a.item.continuous() {
                *lp += model.prob(a.response, theta, covariates)?.ln();
            }
        }
    }
    let post = normalize_log_posterior(&log_post);
    Ok((thetas, post))
}

/// Posterior mean and covariance of theta under a normal prior, by
/// quadrature on a product grid with `points` nodes per dimension.
pub fn estimate_theta_eap(
    history: &[Administered],
    covariates: &Covariates,
    prior: &NormalPrior,
    points: usize,
) -> Result<(Array1<f64>, Array2<f64>)> {
    let dim = prior.dim();
    let (thetas, post) = posterior_grid(history, covariates, prior, points)?;

    let mut mean = Array1::<f64>::zeros(dim);
    for (theta, &w) in thetas.iter().zip(&post) {
        mean.scaled_add(w, theta);
    }
    let mut cov = Array2::<f64>::zeros((dim, dim));
    for (theta, &w) in thetas.iter().zip(&post) {
        for i in 0..dim {
            for j in 0..dim {
                cov[[i, j]] += w * (theta[i] - mean[i]) * (theta[j] - mean[j]);
            }
        }
    }
    Ok((mean, cov))
}

/// Whether every continuous response is at its lowest category, or every
/// one at its highest.
fn is_extreme_pattern(history: &[Administered]) -> bool {
    let mut all_min = true;
    let mut all_max = true;
    for a in history {
        if let Some(model) = a.item.continuous() {
            all_min &= a.response == 0;
            all_max &= a.response == model.max_response();
        }
    }
    all_min || all_max
}

/// Estimates theta from items with continuous models; discrete-only items in
/// the history are ignored.
#[derive(Debug, Clone)]
pub struct EstimateTheta {
    tolerance: f64,
    max_iter: usize,
    points: usize,
    prior_config: Prior,
    prior: Option<NormalPrior>,
}

impl EstimateTheta {
    pub fn new(config: EstimateThetaConfig) -> Result<Self> {
        if !(config.tolerance > 0.0) {
            return Err(CatError::config("tolerance must be positive"));
        }
        if config.max_iter == 0 {
            return Err(CatError::config("max_iter must be at least 1"));
        }
        if config.quadrature_points < 2 {
            return Err(CatError::config("quadrature_points must be at least 2"));
        }
        Ok(Self {
            tolerance: config.tolerance,
            max_iter: config.max_iter,
            points: config.quadrature_points,
            prior_config: config.prior,
            prior: None,
        })
    }

    fn prior(&self) -> Result<&NormalPrior> {
        self.prior
            .as_ref()
            .ok_or_else(|| CatError::config("theta estimator used before registration"))
    }
}

impl Default for EstimateTheta {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iter: DEFAULT_MAX_ITER,
            points: DEFAULT_QUADRATURE_POINTS,
            prior_config: Prior::default(),
            prior: None,
        }
    }
}

impl Estimator for EstimateTheta {
    /// Starts every administration at the prior mean with a zero error.
    fn initialize(&self, _bank: &ItemBank, examinee: &mut Examinee) -> Result<()> {
        let prior = self.prior()?;
        examinee.set_theta_hat(prior.mean());
        examinee.init_theta_err(prior.dim());
        Ok(())
    }

    fn estimate(&self, examinee: &mut Examinee) -> Result<()> {
        let history = examinee.history();
        if !history.iter().any(|a| a.item.is_continuous()) {
            return Ok(());
        }
        let prior = self.prior()?;
        let covariates = examinee.covariates();

        let (outcome, theta, err) = if is_extreme_pattern(history) {
            let (theta, err) = estimate_theta_eap(history, covariates, prior, self.points)?;
            let reason = EapReason::ExtremePattern;
            (ThetaOutcome::Eap { reason }, theta, err)
        } else {
            let dim = prior.dim();
            let mut theta = examinee
                .theta_hat()
                .cloned()
                .unwrap_or_else(|| prior.mean().clone());
            let mut err = Array2::zeros((dim, dim));
            match estimate_theta_mle(
                history,
                covariates,
                &mut theta,
                Some(&mut err),
                self.tolerance,
                self.max_iter,
            ) {
                Ok(iterations) => (ThetaOutcome::Mle { iterations }, theta, err),
                Err(CatError::NonConvergence { iterations }) => {
                    tracing::warn!(
                        examinee = examinee.id(),
                        items = history.len(),
                        iterations,
                        "theta MLE did not converge, using EAP"
                    );
                    let (theta, err) =
                        estimate_theta_eap(history, covariates, prior, self.points)?;
                    let reason = EapReason::NonConvergence;
                    (ThetaOutcome::Eap { reason }, theta, err)
                }
                Err(e) => return Err(e),
            }
        };

        examinee.set_theta_hat(&theta);
        examinee.set_theta_err(&err);
        examinee.set_theta_outcome(outcome);
        Ok(())
    }
}

impl Algorithm for EstimateTheta {
    const CATEGORY: Category = Category::Estimate;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        let dim = bank.num_dims().ok_or_else(|| {
            CatError::config("theta estimation needs items with continuous models")
        })?;
        self.prior = Some(NormalPrior::resolve(&self.prior_config, dim)?);
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_estimator(this);
    }
}
