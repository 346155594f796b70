//! Noisy-input deterministic-and gate (NIDA) model.
//!
//! Each required attribute `d` contributes a factor `1 − s_d` when mastered
//! and `g_d` otherwise; `P(1)` is their product. Parameters are `Guess.d`
//! then `Slip.d` for every required attribute (1-based).

use ndarray::{Array1, Array2};

use super::dina::check_probability;
use super::{
    check_attrs, check_param_buffers, check_response, DiscreteModel, Dims, ParamSet,
};
use crate::attributes::Attributes;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Nida {
    dims: Dims,
    params: ParamSet,
}

impl Nida {
    /// Every attribute starts with the same guess and slip probabilities.
    pub fn new(dims: Dims, guess: f64, slip: f64) -> Result<Self> {
        check_probability("Guess", guess)?;
        check_probability("Slip", slip)?;
        let mut names: Vec<String> = dims.iter().map(|d| format!("Guess.{}", d + 1)).collect();
        names.extend(dims.iter().map(|d| format!("Slip.{}", d + 1)));
        let n = dims.num();
        let mut params = ParamSet::new(names, 0);
        for i in 0..n {
            params.values[i] = guess;
            params.values[n + i] = slip;
        }
        Ok(Self { dims, params })
    }

    /// For each required attribute: the index of the parameter the factor
    /// depends on, the factor, and its log-derivative in that parameter.
    fn factors(&self, attrs: &Attributes) -> Vec<(usize, f64, f64)> {
        let n = self.dims.num();
        let v = self.params.values();
        self.dims
            .iter()
            .enumerate()
            .map(|(i, d)| {
                if attrs.bit(d) {
                    let f = 1.0 - v[n + i];
                    (n + i, f, -1.0 / f)
                } else {
                    let f = v[i];
                    (i, f, 1.0 / f)
                }
            })
            .collect()
    }
}

impl DiscreteModel for Nida {
    fn kind(&self) -> &'static str {
        "NIDA"
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

    fn prob(&self, resp: u32, attrs: &Attributes) -> Result<f64> {
        check_response(resp, 1)?;
        check_attrs(&self.dims, attrs)?;
        let p: f64 = self.factors(attrs).iter().map(|&(_, f, _)| f).product();
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    fn log_lik_dparam(
        &self,
        resp: u32,
        attrs: &Attributes,
        grad: &mut Array1<f64>,
        hes: &mut Array2<f64>,
    ) -> Result<()> {
        check_response(resp, 1)?;
        check_attrs(&self.dims, attrs)?;
        check_param_buffers(self.params.len(), grad, hes)?;
        let factors = self.factors(attrs);

        if resp == 1 {
            for &(j, _, d) in &factors {
                grad[j] += d;
                hes[[j, j]] -= d * d;
            }
            return Ok(());
        }

        let p: f64 = factors.iter().map(|&(_, f, _)| f).product();
        let q = 1.0 - p;
        for &(j, _, dj) in &factors {
            grad[j] -= p * dj / q;
            for &(k, _, dk) in &factors {
                if j == k {
                    hes[[j, j]] -= p * p * dj * dj / (q * q);
                } else {
                    hes[[j, k]] -= p * dj * dk / (q * q);
                }
            }
        }
        Ok(())
    }
}
