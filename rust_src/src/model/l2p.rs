//! Two-parameter logistic model.
//!
//! `P(1) = σ(Σ_d a_d θ_d + Σ_j β_j x_j − b)` with difficulty `Diff` and one
//! discrimination `Discr.d` per loaded dimension (1-based test dimension).

use ndarray::{Array1, Array2};

use super::{
    add_rank_one, check_matrix, check_param_buffers, check_response, check_theta,
    ContinuousModel, Dims, ParamSet,
};
use crate::covariates::Covariates;
use crate::error::Result;
use crate::utils::sigmoid;

const DIFF: usize = 0;

#[derive(Debug, Clone)]
pub struct L2p {
    dims: Dims,
    params: ParamSet,
}

/// Parameter names `Discr.d` for each loaded dimension.
pub(crate) fn discr_names(dims: &Dims) -> impl Iterator<Item = String> + '_ {
    dims.iter().map(|d| format!("Discr.{}", d + 1))
}

impl L2p {
    /// Discriminations start at 1, difficulty at 0.
    pub fn new(dims: Dims) -> Self {
        Self::with_covariates(dims, 0)
    }

    pub fn with_covariates(dims: Dims, num_covariates: usize) -> Self {
        let mut names = vec!["Diff".to_string()];
        names.extend(discr_names(&dims));
        let mut params = ParamSet::new(names, num_covariates);
        for i in 0..dims.num() {
            params.values[1 + i] = 1.0;
        }
        Self { dims, params }
    }

    /// Unidimensional item.
    pub fn unidimensional(discrimination: f64, difficulty: f64) -> Result<Self> {
        let mut model = Self::new(Dims::all(1)?);
        model.params.set(DIFF, difficulty)?;
        model.params.set(1, discrimination)?;
        Ok(model)
    }

    #[inline]
    pub fn difficulty(&self) -> f64 {
        self.params.values()[DIFF]
    }

    /// Discrimination on the `i`-th loaded dimension.
    #[inline]
    pub fn discrimination(&self, i: usize) -> f64 {
        self.params.values()[1 + i]
    }

    fn z(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        linear_predictor(&self.dims, &self.params, theta, covariates)
    }
}

/// `Σ a_d θ_d + Σ β_j x_j − b` for the `Diff`, `Discr.*`, ..., `Cov.*` layout.
pub(crate) fn linear_predictor(
    dims: &Dims,
    params: &ParamSet,
    theta: &Array1<f64>,
    covariates: &Covariates,
) -> Result<f64> {
    let values = params.values();
    let mut z = params.covariate_term(covariates)? - values[DIFF];
    for (i, d) in dims.iter().enumerate() {
        z += values[1 + i] * theta[d];
    }
    Ok(z)
}

/// Gradient of the linear predictor with respect to theta.
pub(crate) fn theta_loadings(dims: &Dims, params: &ParamSet) -> Vec<(usize, f64)> {
    dims.iter()
        .enumerate()
        .map(|(i, d)| (d, params.values()[1 + i]))
        .collect()
}

/// Gradient of the linear predictor with respect to `Diff`, `Discr.*` and
/// the covariate coefficients.
pub(crate) fn param_loadings(
    dims: &Dims,
    params: &ParamSet,
    theta: &Array1<f64>,
    covariates: &Covariates,
) -> Result<Vec<(usize, f64)>> {
    let mut v = Vec::with_capacity(1 + dims.num() + params.num_covariates());
    v.push((DIFF, -1.0));
    for (i, d) in dims.iter().enumerate() {
        v.push((1 + i, theta[d]));
    }
    let offset = params.covariate_offset();
    for (j, x) in params.covariate_values(covariates)?.into_iter().enumerate() {
        v.push((offset + j, x));
    }
    Ok(v)
}

impl ContinuousModel for L2p {
    fn kind(&self) -> &'static str {
        "L2p"
    }

    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn max_response(&self) -> u32 {
        1
    }

    fn prob(&self, resp: u32, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        check_response(resp, 1)?;
        check_theta(&self.dims, theta, None)?;
        let p = sigmoid(self.z(theta, covariates)?);
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    fn distance(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        check_theta(&self.dims, theta, None)?;
        Ok(self.z(theta, covariates)?.abs())
    }

    fn log_lik_dtheta(
        &self,
        resp: u32,
        theta: &Array1<f64>,
        covariates: &Covariates,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()> {
        check_response(resp, 1)?;
        check_theta(&self.dims, theta, Some((grad, hes)))?;
        let p = sigmoid(self.z(theta, covariates)?);
        let v = theta_loadings(&self.dims, &self.params);
        add_rank_one(resp as f64 - p, -p * (1.0 - p), &v, grad, hes);
        Ok(())
    }

    fn log_lik_dparam(
        &self,
        resp: u32,
        theta: &Array1<f64>,
        covariates: &Covariates,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()> {
        check_response(resp, 1)?;
        check_theta(&self.dims, theta, None)?;
        check_param_buffers(self.params.len(), grad, hes)?;
        let p = sigmoid(self.z(theta, covariates)?);
        let v = param_loadings(&self.dims, &self.params, theta, covariates)?;
        add_rank_one(resp as f64 - p, -p * (1.0 - p), &v, grad, hes);
        Ok(())
    }

    fn fisher_inf(
        &self,
        theta: &Array1<f64>,
        covariates: &Covariates,
        inf: &mut Array2<f64>,
    ) -> Result<()> {
        check_theta(&self.dims, theta, None)?;
        check_matrix("information matrix", self.dims.test_dim(), inf)?;
        let p = sigmoid(self.z(theta, covariates)?);
        let w = p * (1.0 - p);
        let v = theta_loadings(&self.dims, &self.params);
        for &(i, ai) in &v {
            for &(j, aj) in &v {
                inf[[i, j]] += w * ai * aj;
            }
        }
        Ok(())
    }
}
