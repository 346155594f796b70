//! Item response models.
//!
//! Continuous models are evaluated at a latent trait vector `theta` of length
//! `test_dim`; discrete models at an [`Attributes`] pattern. Derivative and
//! information routines accumulate into caller-owned buffers sized for the
//! whole test (`test_dim` for theta derivatives, the parameter count for
//! parameter derivatives), touching only the entries the model loads on.

use std::fmt;

use ndarray::{Array1, Array2};

use crate::attributes::Attributes;
use crate::covariates::Covariates;
use crate::error::{check_len, CatError, Result};

pub mod dina;
pub mod l1p;
pub mod l2p;
pub mod l3p;
pub mod nida;
pub mod nominal;

pub use dina::Dina;
pub use l1p::L1p;
pub use l2p::L2p;
pub use l3p::L3p;
pub use nida::Nida;
pub use nominal::Nominal;

/// Which of the test's latent dimensions (or attributes) a model uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dims {
    test_dim: usize,
    dims: Vec<usize>,
}

impl Dims {
    /// `dims` must be non-empty, below `test_dim` and free of duplicates.
    /// They are stored sorted.
    pub fn new(test_dim: usize, mut dims: Vec<usize>) -> Result<Self> {
        if dims.is_empty() {
            return Err(CatError::config("a model must use at least one dimension"));
        }
        dims.sort_unstable();
        dims.dedup();
        if let Some(&d) = dims.iter().find(|&&d| d >= test_dim) {
            return Err(CatError::IndexOutOfRange {
                index: d,
                len: test_dim,
            });
        }
        Ok(Self { test_dim, dims })
    }

    /// Every dimension of a `test_dim`-dimensional test.
    pub fn all(test_dim: usize) -> Result<Self> {
        Self::new(test_dim, (0..test_dim).collect())
    }

    #[inline]
    pub fn test_dim(&self) -> usize {
        self.test_dim
    }

    #[inline]
    pub fn num(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dims.iter().copied()
    }
}

/// A model's parameter vector with its fixed name ↔ index mapping.
///
/// Covariate coefficients are always the trailing parameters and carry the
/// name of the covariate they multiply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    names: Vec<String>,
    values: Vec<f64>,
    num_covariates: usize,
}

impl ParamSet {
    pub(crate) fn new(mut names: Vec<String>, num_covariates: usize) -> Self {
        for i in 0..num_covariates {
            names.push(format!("Cov.{}", i + 1));
        }
        let values = vec![0.0; names.len()];
        Self {
            names,
            values,
            num_covariates,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn name(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CatError::UnknownName(format!("parameter {name}")))
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.values
            .get(index)
            .copied()
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(CatError::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Result<f64> {
        Ok(self.values[self.index_of(name)?])
    }

    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<()> {
        let i = self.index_of(name)?;
        self.values[i] = value;
        Ok(())
    }

    #[inline]
    pub fn num_covariates(&self) -> usize {
        self.num_covariates
    }

    /// Names of the covariates this model reads, in parameter order.
    pub fn covariate_names(&self) -> &[String] {
        &self.names[self.covariate_offset()..]
    }

    /// Renames a covariate, and with it the coefficient parameter.
    pub fn rename_covariate(&mut self, old: &str, new: &str) -> Result<()> {
        let offset = self.covariate_offset();
        let i = self.names[offset..]
            .iter()
            .position(|n| n == old)
            .map(|i| i + offset)
            .ok_or_else(|| CatError::UnknownName(format!("covariate {old}")))?;
        if old != new && self.names.iter().any(|n| n == new) {
            return Err(CatError::config(format!(
                "parameter name {new} is already in use"
            )));
        }
        self.names[i] = new.to_owned();
        Ok(())
    }

    #[inline]
    pub(crate) fn covariate_offset(&self) -> usize {
        self.names.len() - self.num_covariates
    }

    /// Values of this model's covariates, looked up by name.
    pub(crate) fn covariate_values(&self, covariates: &Covariates) -> Result<Vec<f64>> {
        self.covariate_names()
            .iter()
            .map(|name| covariates.get(name))
            .collect()
    }

    /// `Σ β_j x_j` over the model's covariates.
    pub(crate) fn covariate_term(&self, covariates: &Covariates) -> Result<f64> {
        let offset = self.covariate_offset();
        let mut sum = 0.0;
        for (j, name) in self.covariate_names().iter().enumerate() {
            sum += self.values[offset + j] * covariates.get(name)?;
        }
        Ok(sum)
    }
}

/// A response model over a continuous latent trait.
pub trait ContinuousModel: fmt::Debug + Send + Sync {
    /// Short model name, e.g. `"L2p"`.
    fn kind(&self) -> &'static str;

    fn dims(&self) -> &Dims;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    /// Responses range over `0..=max_response()`.
    fn max_response(&self) -> u32;

    fn prob(&self, resp: u32, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64>;

    /// Heuristic distance between `theta` and the item's location.
    fn distance(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64>;

    /// Adds the gradient and Hessian of `log P(resp)` with respect to theta.
    fn log_lik_dtheta(
        &self,
        resp: u32,
        theta: &Array1<f64>,
        covariates: &Covariates,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()>;

    /// Adds the gradient and Hessian of `log P(resp)` with respect to the
    /// model's own parameters.
    fn log_lik_dparam(
        &self,
        resp: u32,
        theta: &Array1<f64>,
        covariates: &Covariates,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()>;

    /// Adds the expected information `Σ_k P_k g_k g_kᵀ` at `theta` to `inf`,
    /// where `g_k` is the theta score of response `k`.
    fn fisher_inf(
        &self,
        theta: &Array1<f64>,
        covariates: &Covariates,
        inf: &mut Array2<f64>,
    ) -> Result<()> {
        let n = self.dims().test_dim();
        check_matrix("information matrix", n, inf)?;
        let mut grad = Array1::<f64>::zeros(n);
        let mut hes = Array2::<f64>::zeros((n, n));
        for k in 0..=self.max_response() {
            let p = self.prob(k, theta, covariates)?;
            grad.fill(0.0);
            self.log_lik_dtheta(k, theta, covariates, &mut grad, &mut hes)?;
            for i in self.dims().iter() {
                for j in self.dims().iter() {
                    inf[[i, j]] += p * grad[i] * grad[j];
                }
            }
        }
        Ok(())
    }

    fn num_params(&self) -> usize {
        self.params().len()
    }

    fn param(&self, name: &str) -> Result<f64> {
        self.params().get_by_name(name)
    }

    fn set_param(&mut self, name: &str, value: f64) -> Result<()> {
        self.params_mut().set_by_name(name, value)
    }
}

/// A response model over a discrete attribute pattern.
pub trait DiscreteModel: fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static str;

    /// Attributes the item requires, out of the test's attribute count.
    fn dims(&self) -> &Dims;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    fn max_response(&self) -> u32;

    fn prob(&self, resp: u32, attrs: &Attributes) -> Result<f64>;

    /// Adds the gradient and Hessian of `log P(resp)` with respect to the
    /// model's parameters.
    fn log_lik_dparam(
        &self,
        resp: u32,
        attrs: &Attributes,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()>;

    fn num_params(&self) -> usize {
        self.params().len()
    }

    fn param(&self, name: &str) -> Result<f64> {
        self.params().get_by_name(name)
    }

    fn set_param(&mut self, name: &str, value: f64) -> Result<()> {
        self.params_mut().set_by_name(name, value)
    }
}

#[inline]
pub(crate) fn check_response(resp: u32, max: u32) -> Result<()> {
    if resp > max {
        Err(CatError::InvalidResponse {
            response: resp,
            max,
        })
    } else {
        Ok(())
    }
}

pub(crate) fn check_matrix(what: &'static str, n: usize, m: &Array2<f64>) -> Result<()> {
    check_len(what, n, m.nrows())?;
    check_len(what, n, m.ncols())
}

/// Validates theta and, when given, the derivative buffers it pairs with.
pub(crate) fn check_theta(
    dims: &Dims,
    theta: &Array1<f64>,
    buffers: Option<(&Array1<f64>, &Array2<f64>)>,
) -> Result<()> {
    check_len("theta", dims.test_dim(), theta.len())?;
    if let Some((grad, hes)) = buffers {
        check_len("gradient", dims.test_dim(), grad.len())?;
        check_matrix("hessian", dims.test_dim(), hes)?;
    }
    Ok(())
}

pub(crate) fn check_param_buffers(n: usize, grad: &Array1<f64>, hes: &Array2<f64>) -> Result<()> {
    check_len("parameter gradient", n, grad.len())?;
    check_matrix("parameter hessian", n, hes)
}

pub(crate) fn check_attrs(dims: &Dims, attrs: &Attributes) -> Result<()> {
    check_len("attributes", dims.test_dim(), attrs.len())
}

/// Adds `l_z v` to `grad` and `l_zz v vᵀ` to `hes` for a sparse vector `v`
/// given as `(index, value)` pairs.
#[inline]
pub(crate) fn add_rank_one(
    l_z: f64,
    l_zz: f64,
    v: &[(usize, f64)],
    grad: &mut Array1<f64>,
    hes: &mut Array2<f64>,
) {
    for &(i, vi) in v {
        grad[i] += l_z * vi;
        for &(j, vj) in v {
            hes[[i, j]] += l_zz * vi * vj;
        }
    }
}
