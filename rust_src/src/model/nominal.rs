//! Multidimensional nominal response model.
//!
//! Categories `0..=m`, category 0 the baseline with `z_0 = 0`. For `k ≥ 1`,
//! `z_k = a_k·θ − b_k + Σ_j β_j x_j` and `P_k = exp z_k / Σ_l exp z_l`.
//! Parameters are `Diff.k` followed by `Discr.k.d` for each `k`, then the
//! covariate coefficients (shared by all categories).

use ndarray::{Array1, Array2};

use super::{
    check_matrix, check_param_buffers, check_response, check_theta, ContinuousModel, Dims,
    ParamSet,
};
use crate::covariates::Covariates;
use crate::error::{CatError, Result};

#[derive(Debug, Clone)]
pub struct Nominal {
    dims: Dims,
    params: ParamSet,
    max: u32,
}

impl Nominal {
    /// `num_categories` must be at least 3.
    pub fn new(num_categories: u32, dims: Dims) -> Result<Self> {
        Self::with_covariates(num_categories, dims, 0)
    }

    pub fn with_covariates(num_categories: u32, dims: Dims, num_covariates: usize) -> Result<Self> {
        if num_categories < 3 {
            return Err(CatError::config(format!(
                "nominal model needs at least 3 categories, got {num_categories}"
            )));
        }
        let max = num_categories - 1;
        let mut names = Vec::new();
        for k in 1..=max {
            names.push(format!("Diff.{k}"));
            for d in dims.iter() {
                names.push(format!("Discr.{k}.{}", d + 1));
            }
        }
        let mut params = ParamSet::new(names, num_covariates);
        let stride = 1 + dims.num();
        for k in 0..max as usize {
            for i in 0..dims.num() {
                params.values[k * stride + 1 + i] = 1.0;
            }
        }
        Ok(Self { dims, params, max })
    }

    #[inline]
    fn stride(&self) -> usize {
        1 + self.dims.num()
    }

    /// Index of `Diff.k` (`k ≥ 1`).
    #[inline]
    fn diff_index(&self, k: usize) -> usize {
        (k - 1) * self.stride()
    }

    #[inline]
    fn discr(&self, k: usize, i: usize) -> f64 {
        self.params.values()[self.diff_index(k) + 1 + i]
    }

    /// Linear predictors `z_0..=z_m`.
    fn predictors(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<Vec<f64>> {
        let shift = self.params.covariate_term(covariates)?;
        let mut z = vec![0.0; self.max as usize + 1];
        for (k, zk) in z.iter_mut().enumerate().skip(1) {
            let mut acc = shift - self.params.values()[self.diff_index(k)];
            for (i, d) in self.dims.iter().enumerate() {
                acc += self.discr(k, i) * theta[d];
            }
            *zk = acc;
        }
        Ok(z)
    }

    fn probabilities(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<Vec<f64>> {
        let z = self.predictors(theta, covariates)?;
        let max_z = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut p: Vec<f64> = z.iter().map(|&zk| (zk - max_z).exp()).collect();
        let sum: f64 = p.iter().sum();
        for pk in p.iter_mut() {
            *pk /= sum;
        }
        Ok(p)
    }

    /// Probability-weighted mean loading `ā = Σ_k P_k a_k` over the loaded
    /// dimensions.
    fn mean_loading(&self, p: &[f64]) -> Vec<f64> {
        let mut a_bar = vec![0.0; self.dims.num()];
        for (k, &pk) in p.iter().enumerate().skip(1) {
            for (i, slot) in a_bar.iter_mut().enumerate() {
                *slot += pk * self.discr(k, i);
            }
        }
        a_bar
    }

    /// Jacobian of `(z_0, ..., z_m)` with respect to the parameters, as
    /// sparse rows.
    fn jacobian(
        &self,
        theta: &Array1<f64>,
        covariates: &Covariates,
    ) -> Result<Vec<Vec<(usize, f64)>>> {
        let x = self.params.covariate_values(covariates)?;
        let offset = self.params.covariate_offset();
        let mut rows = vec![Vec::new()];
        for k in 1..=self.max as usize {
            let base = self.diff_index(k);
            let mut row = vec![(base, -1.0)];
            for (i, d) in self.dims.iter().enumerate() {
                row.push((base + 1 + i, theta[d]));
            }
            for (j, &xj) in x.iter().enumerate() {
                row.push((offset + j, xj));
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl ContinuousModel for Nominal {
    fn kind(&self) -> &'static str {
        "Nominal"
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
        self.max
    }

    fn prob(&self, resp: u32, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        check_response(resp, self.max)?;
        check_theta(&self.dims, theta, None)?;
        Ok(self.probabilities(theta, covariates)?[resp as usize])
    }

    /// Smallest `|z_k|`: how close theta is to a category boundary with the
    /// baseline.
    fn distance(&self, theta: &Array1<f64>, covariates: &Covariates) -> Result<f64> {
        check_theta(&self.dims, theta, None)?;
        let z = self.predictors(theta, covariates)?;
        Ok(z[1..].iter().map(|zk| zk.abs()).fold(f64::INFINITY, f64::min))
    }

    fn log_lik_dtheta(
        &self,
        resp: u32,
        theta: &Array1<f64>,
        covariates: &Covariates,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()> {
        check_response(resp, self.max)?;
        check_theta(&self.dims, theta, Some((grad, hes)))?;
        let p = self.probabilities(theta, covariates)?;
        let a_bar = self.mean_loading(&p);
        let r = resp as usize;

        for (i, d) in self.dims.iter().enumerate() {
            let a_r = if r == 0 { 0.0 } else { self.discr(r, i) };
            grad[d] += a_r - a_bar[i];
        }
        for (i, di) in self.dims.iter().enumerate() {
            for (j, dj) in self.dims.iter().enumerate() {
                let mut second = 0.0;
                for (k, &pk) in p.iter().enumerate().skip(1) {
                    second += pk * self.discr(k, i) * self.discr(k, j);
                }
                hes[[di, dj]] -= second - a_bar[i] * a_bar[j];
            }
        }
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
        check_response(resp, self.max)?;
        check_theta(&self.dims, theta, None)?;
        check_param_buffers(self.params.len(), grad, hes)?;
        let p = self.probabilities(theta, covariates)?;
        let jac = self.jacobian(theta, covariates)?;
        let r = resp as usize;

        // grad = Jᵀ (e_r − P)
        for (k, row) in jac.iter().enumerate() {
            let resid = if k == r { 1.0 - p[k] } else { -p[k] };
            for &(i, v) in row {
                grad[i] += resid * v;
            }
        }

        // hes = −Jᵀ (diag P − P Pᵀ) J
        let n = self.params.len();
        let mut mean_row = vec![0.0; n];
        for (k, row) in jac.iter().enumerate() {
            for &(i, v) in row {
                mean_row[i] += p[k] * v;
            }
        }
        for (k, row) in jac.iter().enumerate() {
            for &(i, vi) in row {
                for &(j, vj) in row {
                    hes[[i, j]] -= p[k] * vi * vj;
                }
            }
        }
        for i in 0..n {
            if mean_row[i] == 0.0 {
                continue;
            }
            for j in 0..n {
                hes[[i, j]] += mean_row[i] * mean_row[j];
            }
        }
        Ok(())
    }

    /// The theta score is `a_r − ā`, so the information is the probability
    /// weighted covariance of the category loadings.
    fn fisher_inf(
        &self,
        theta: &Array1<f64>,
        covariates: &Covariates,
        inf: &mut Array2<f64>,
    ) -> Result<()> {
        check_theta(&self.dims, theta, None)?;
        check_matrix("information matrix", self.dims.test_dim(), inf)?;
        let p = self.probabilities(theta, covariates)?;
        let a_bar = self.mean_loading(&p);
        for (i, di) in self.dims.iter().enumerate() {
            for (j, dj) in self.dims.iter().enumerate() {
                let mut second = 0.0;
                for (k, &pk) in p.iter().enumerate().skip(1) {
                    second += pk * self.discr(k, i) * self.discr(k, j);
                }
                inf[[di, dj]] += second - a_bar[i] * a_bar[j];
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::*;
    use ndarray::array;

    fn four_category_item() -> Nominal {
        let mut m = Nominal::with_covariates(4, Dims::all(2).unwrap(), 1).unwrap();
        let values = [
            ("Diff.1", -0.5),
            ("Discr.1.1", 0.8),
            ("Discr.1.2", 0.2),
            ("Diff.2", 0.1),
            ("Discr.2.1", 1.5),
            ("Discr.2.2", -0.4),
            ("Diff.3", 0.9),
            ("Discr.3.1", 2.1),
            ("Discr.3.2", 0.7),
            ("Cov.1", 0.3),
        ];
        for (name, v) in values {
            m.set_param(name, v).unwrap();
        }
        m
    }

    #[test]
    fn parameter_layout_groups_by_category() {
        let m = Nominal::new(3, Dims::all(1).unwrap()).unwrap();
        assert_eq!(
            m.params().names(),
            &["Diff.1", "Discr.1.1", "Diff.2", "Discr.2.1"]
        );
        assert_eq!(m.max_response(), 2);
        assert!(Nominal::new(2, Dims::all(1).unwrap()).is_err());
    }

    #[test]
    fn derivatives_agree_with_finite_differences() {
        let m = four_category_item();
        let cov: Covariates = [("Cov.1", 0.6)].into_iter().collect();
        for theta in [array![0.0, 0.0], array![1.1, -0.6], array![-2.0, 1.5]] {
            probabilities_sum_to_one(&m, &theta, &cov);
            theta_derivatives_match(&m, &theta, &cov, 1e-6);
            param_derivatives_match(&m, &theta, &cov, 1e-6);
        }
    }

    #[test]
    fn distance_is_nearest_boundary() {
        let mut m = Nominal::new(3, Dims::all(1).unwrap()).unwrap();
        m.set_param("Diff.1", 1.0).unwrap();
        m.set_param("Diff.2", 3.0).unwrap();
        let cov = Covariates::new();
        let d = m.distance(&array![0.5], &cov).unwrap();
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn closed_form_information_is_score_outer_product() {
        let m = four_category_item();
        let cov: Covariates = [("Cov.1", -0.2)].into_iter().collect();
        let theta = array![0.4, 0.9];
        let mut closed = Array2::zeros((2, 2));
        m.fisher_inf(&theta, &cov, &mut closed).unwrap();

        let mut summed = Array2::<f64>::zeros((2, 2));
        for k in 0..=m.max_response() {
            let p = m.prob(k, &theta, &cov).unwrap();
            let mut g = Array1::zeros(2);
            let mut h = Array2::zeros((2, 2));
            m.log_lik_dtheta(k, &theta, &cov, &mut g, &mut h).unwrap();
            for i in 0..2 {
                for j in 0..2 {
                    summed[[i, j]] += p * g[i] * g[j];
                }
            }
        }
        for (a, b) in closed.iter().zip(summed.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
