//! Deterministic-input noisy-and gate (DINA) model.
//!
//! An examinee who has mastered every required attribute answers correctly
//! unless they slip (`1 − s`); anyone else answers correctly only by guessing
//! (`g`).

use ndarray::{Array1, Array2};

use super::{
    check_attrs, check_param_buffers, check_response, DiscreteModel, Dims, ParamSet,
};
use crate::attributes::Attributes;
use crate::error::{CatError, Result};

const GUESS: usize = 0;
const SLIP: usize = 1;

#[derive(Debug, Clone)]
pub struct Dina {
    dims: Dims,
    params: ParamSet,
}

pub(crate) fn check_probability(name: &str, v: f64) -> Result<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(CatError::config(format!("{name} = {v} is not a probability")))
    }
}

impl Dina {
    /// `dims` are the required attributes out of the test's attribute count.
    pub fn new(dims: Dims, guess: f64, slip: f64) -> Result<Self> {
        check_probability("Guess", guess)?;
        check_probability("Slip", slip)?;
        let mut params = ParamSet::new(vec!["Guess".into(), "Slip".into()], 0);
        params.values[GUESS] = guess;
        params.values[SLIP] = slip;
        Ok(Self { dims, params })
    }

    #[inline]
    pub fn guess(&self) -> f64 {
        self.params.values()[GUESS]
    }

    #[inline]
    pub fn slip(&self) -> f64 {
        self.params.values()[SLIP]
    }

    /// Whether `attrs` masters every required attribute.
    pub fn mastered(&self, attrs: &Attributes) -> bool {
        self.dims.iter().all(|d| attrs.bit(d))
    }
}

impl DiscreteModel for Dina {
    fn kind(&self) -> &'static str {
        "DINA"
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
        let p = if self.mastered(attrs) {
            1.0 - self.slip()
        } else {
            self.guess()
        };
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
        if self.mastered(attrs) {
            let s = self.slip();
            if resp == 1 {
                grad[SLIP] -= 1.0 / (1.0 - s);
                hes[[SLIP, SLIP]] -= 1.0 / ((1.0 - s) * (1.0 - s));
            } else {
                grad[SLIP] += 1.0 / s;
                hes[[SLIP, SLIP]] -= 1.0 / (s * s);
            }
        } else {
            let g = self.guess();
            if resp == 1 {
                grad[GUESS] += 1.0 / g;
                hes[[GUESS, GUESS]] -= 1.0 / (g * g);
            } else {
                grad[GUESS] -= 1.0 / (1.0 - g);
                hes[[GUESS, GUESS]] -= 1.0 / ((1.0 - g) * (1.0 - g));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::discrete_param_derivatives_match;

    fn item() -> Dina {
        Dina::new(Dims::new(3, vec![0, 2]).unwrap(), 0.2, 0.15).unwrap()
    }

    #[test]
    fn requires_every_attribute() {
        let m = item();
        let master: Attributes = "101".parse().unwrap();
        let partial: Attributes = "100".parse().unwrap();
        assert!((m.prob(1, &master).unwrap() - 0.85).abs() < 1e-15);
        assert!((m.prob(1, &partial).unwrap() - 0.2).abs() < 1e-15);
        assert!((m.prob(0, &partial).unwrap() - 0.8).abs() < 1e-15);
        let short: Attributes = "10".parse().unwrap();
        assert!(matches!(
            m.prob(1, &short),
            Err(CatError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn derivatives_agree_with_finite_differences() {
        let m = item();
        for pattern in Attributes::all(3).unwrap() {
            discrete_param_derivatives_match(&m, &pattern, 1e-5);
        }
    }

    #[test]
    fn parameters_must_be_probabilities() {
        assert!(Dina::new(Dims::all(1).unwrap(), 1.2, 0.1).is_err());
        assert!(Dina::new(Dims::all(1).unwrap(), 0.1, -0.1).is_err());
    }
}
