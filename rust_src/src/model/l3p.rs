//! Three-parameter logistic model: the 2PL with a lower asymptote.
//!
//! `P(1) = c + (1 − c) σ(z)` where `z` is the 2PL linear predictor and `c`
//! is the `Guess` parameter.

use ndarray::{Array1, Array2};

use super::l2p::{discr_names, linear_predictor, param_loadings, theta_loadings};
use super::{
    add_rank_one, check_param_buffers, check_response, check_theta, ContinuousModel, Dims,
    ParamSet,
};
use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::utils::sigmoid;

#[derive(Debug, Clone)]
pub struct L3p {
    dims: Dims,
    params: ParamSet,
}

/// First and second derivatives of the log-likelihood in `z` and `c`.
struct Partials {
    l_z: f64,
    l_zz: f64,
    l_c: f64,
    l_cc: f64,
    l_cz: f64,
}

impl L3p {
    pub fn new(dims: Dims) -> Self {
        Self::with_covariates(dims, 0)
    }

    pub fn with_covariates(dims: Dims, num_covariates: usize) -> Self {
        let mut names = vec!["Diff".to_string()];
        names.extend(discr_names(&dims));
        names.push("Guess".to_string());
        let mut params = ParamSet::new(names, num_covariates);
        for i in 0..dims.num() {
            params.values[1 + i] = 1.0;
        }
        Self { dims, params }
    }

    pub fn unidimensional(discrimination: f64, difficulty: f64, guess: f64) -> Result<Self> {
        let mut model = Self::new(Dims::all(1)?);
        model.params.set(0, difficulty)?;
        model.params.set(1, discrimination)?;
        model.set_guess(guess)?;
        Ok(model)
    }

    #[inline]
    fn guess_index(&self) -> usize {
        1 + self.dims.num()
    }

    #[inline]
    pub fn guess(&self) -> f64 {
        self.params.values()[self.guess_index()]
    }

    /// `c` must lie in `[0, 1)`.
    pub fn set_guess(&mut self, c: f64) -> Result<()> {
        if !(0.0..1.0).contains(&c) {
            return Err(CatError::config(format!("guessing parameter {c} not in [0, 1)")));
        }
        let i = self.guess_index();
        self.params.set(i, c)
    }

    fn partials(&self, resp: u32, s: f64) -> Partials {
        let c = self.guess();
        if resp == 1 {
            let p1 = c + (1.0 - c) * s;
            let w = (1.0 - c) * s * (1.0 - s);
            let w_z = w * (1.0 - 2.0 * s);
            let l_c = (1.0 - s) / p1;
            Partials {
                l_z: w / p1,
                l_zz: w_z / p1 - (w / p1).powi(2),
                l_c,
                l_cc: -l_c * l_c,
                l_cz: -s * (1.0 - s) / p1 - (1.0 - s) * w / (p1 * p1),
            }
        } else {
            Partials {
                l_z: -s,
                l_zz: -s * (1.0 - s),
                l_c: -1.0 / (1.0 - c),
                l_cc: -1.0 / ((1.0 - c) * (1.0 - c)),
                l_cz: 0.0,
            }
        }
    }
}

impl ContinuousModel for L3p {
    fn kind(&self) -> &'static str {
        "L3p"
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
        let c = self.guess();
        let s = sigmoid(linear_predictor(&self.dims, &self.params, theta, covariates)?);
        let p = c + (1.0 - c) * s;
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    fn distance(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        check_theta(&self.dims, theta, None)?;
        Ok(linear_predictor(&self.dims, &self.params, theta, covariates)?.abs())
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
        let s = sigmoid(linear_predictor(&self.dims, &self.params, theta, covariates)?);
        let d = self.partials(resp, s);
        let v = theta_loadings(&self.dims, &self.params);
        add_rank_one(d.l_z, d.l_zz, &v, grad, hes);
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
        let s = sigmoid(linear_predictor(&self.dims, &self.params, theta, covariates)?);
        let d = self.partials(resp, s);
        let v = param_loadings(&self.dims, &self.params, theta, covariates)?;
        add_rank_one(d.l_z, d.l_zz, &v, grad, hes);

        let g = self.guess_index();
        grad[g] += d.l_c;
        hes[[g, g]] += d.l_cc;
        for &(i, vi) in &v {
            hes[[g, i]] += d.l_cz * vi;
            hes[[i, g]] += d.l_cz * vi;
        }
        Ok(())
    }
}
