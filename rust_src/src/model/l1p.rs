//! One-parameter logistic (Rasch) model.
//!
//! `P(1) = σ(Σ_d θ_d + Σ_j β_j x_j − b)` with difficulty `b` (`Diff`).

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
pub struct L1p {
    dims: Dims,
    params: ParamSet,
}

impl L1p {
    pub fn new(dims: Dims) -> Self {
        Self::with_covariates(dims, 0)
    }

    pub fn with_covariates(dims: Dims, num_covariates: usize) -> Self {
        Self {
            dims,
            params: ParamSet::new(vec!["Diff".into()], num_covariates),
        }
    }

    /// Unidimensional item with the given difficulty.
    pub fn with_difficulty(difficulty: f64) -> Result<Self> {
        let mut model = Self::new(Dims::all(1)?);
        model.params.set(DIFF, difficulty)?;
        Ok(model)
    }

    #[inline]
    pub fn difficulty(&self) -> f64 {
        self.params.values()[DIFF]
    }

    fn z(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        let mut z = self.params.covariate_term(covariates)? - self.difficulty();
        for d in self.dims.iter() {
            z += theta[d];
        }
        Ok(z)
    }
}

impl ContinuousModel for L1p {
    fn kind(&self) -> &'static str {
        "L1p"
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
        let v: Vec<(usize, f64)> = self.dims.iter().map(|d| (d, 1.0)).collect();
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
        let offset = self.params.covariate_offset();
        let mut v = vec![(DIFF, -1.0)];
        for (j, x) in self.params.covariate_values(covariates)?.into_iter().enumerate() {
            v.push((offset + j, x));
        }
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
        for i in self.dims.iter() {
            for j in self.dims.iter() {
                inf[[i, j]] += w;
            }
        }
        Ok(())
    }
}
