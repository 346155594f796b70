//! Examinees: true and estimated latent state plus administration history.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::attributes::Attributes;
use crate::covariates::Covariates;
use crate::item::Item;

/// One administered item and the response given to it.
#[derive(Debug, Clone)]
pub struct Administered {
    /// Position of the item in the test's bank.
    pub index: usize,
    pub item: Arc<Item>,
    pub response: u32,
}

/// Why the latest ability estimate came from the posterior mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapReason {
    /// All responses at the lowest, or all at the highest, category.
    ExtremePattern,
    /// Newton-Raphson failed to converge.
    NonConvergence,
}

/// How the latest `theta_hat` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThetaOutcome {
    Mle { iterations: usize },
    Eap { reason: EapReason },
}

impl ThetaOutcome {
    pub fn is_converged_mle(&self) -> bool {
        matches!(self, ThetaOutcome::Mle { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Examinee {
    id: String,
    true_theta: Option<Array1<f64>>,
    theta_hat: Option<Array1<f64>>,
    theta_err: Option<Array2<f64>>,
    true_alpha: Option<Attributes>,
    alpha_hat: Option<Attributes>,
    covariates: Covariates,
    history: Vec<Administered>,
    outcome: Option<ThetaOutcome>,
}

impl Examinee {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn true_theta(&self) -> Option<&Array1<f64>> {
        self.true_theta.as_ref()
    }

    pub fn set_true_theta(&mut self, theta: &Array1<f64>) {
        self.true_theta = Some(theta.clone());
    }

    pub fn theta_hat(&self) -> Option<&Array1<f64>> {
        self.theta_hat.as_ref()
    }

    pub fn set_theta_hat(&mut self, theta: &Array1<f64>) {
        self.theta_hat = Some(theta.clone());
    }

    pub fn theta_err(&self) -> Option<&Array2<f64>> {
        self.theta_err.as_ref()
    }

    pub fn set_theta_err(&mut self, err: &Array2<f64>) {
        self.theta_err = Some(err.clone());
    }

    /// Resets the error covariance to a `dim × dim` zero matrix.
    pub fn init_theta_err(&mut self, dim: usize) {
        self.theta_err = Some(Array2::zeros((dim, dim)));
    }

    pub fn true_alpha(&self) -> Option<&Attributes> {
        self.true_alpha.as_ref()
    }

    pub fn set_true_alpha(&mut self, alpha: &Attributes) {
        self.true_alpha = Some(*alpha);
    }

    pub fn alpha_hat(&self) -> Option<&Attributes> {
        self.alpha_hat.as_ref()
    }

    pub fn set_alpha_hat(&mut self, alpha: &Attributes) {
        self.alpha_hat = Some(*alpha);
    }

    pub fn covariates(&self) -> &Covariates {
        &self.covariates
    }

    pub fn covariates_mut(&mut self) -> &mut Covariates {
        &mut self.covariates
    }

    pub fn theta_outcome(&self) -> Option<ThetaOutcome> {
        self.outcome
    }

    pub(crate) fn set_theta_outcome(&mut self, outcome: ThetaOutcome) {
        self.outcome = Some(outcome);
    }

    /// Starts a new administration: clears the history and reserves room
    /// for `length_hint` items.
    pub fn prep(&mut self, length_hint: usize) {
        self.history.clear();
        self.history.reserve(length_hint);
        self.outcome = None;
    }

    pub(crate) fn add_item(&mut self, index: usize, item: Arc<Item>, response: u32) {
        self.history.push(Administered {
            index,
            item,
            response,
        });
    }

    pub fn num_items(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[Administered] {
        &self.history
    }

    pub fn last(&self) -> Option<&Administered> {
        self.history.last()
    }

    pub fn has_administered(&self, index: usize) -> bool {
        self.history.iter().any(|a| a.index == index)
    }

    /// `mask[i]` is true when bank item `i` has been administered.
    pub(crate) fn administered_mask(&self, bank_len: usize) -> Vec<bool> {
        let mut mask = vec![false; bank_len];
        for a in &self.history {
            if a.index < bank_len {
                mask[a.index] = true;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::L1p;
    use ndarray::array;

    #[test]
    fn setters_copy_their_input() {
        let mut e = Examinee::new("e1");
        let mut theta = array![0.5, -0.5];
        e.set_true_theta(&theta);
        theta[0] = 9.0;
        assert_eq!(e.true_theta().unwrap()[0], 0.5);
        e.init_theta_err(2);
        assert_eq!(e.theta_err().unwrap().shape(), &[2, 2]);
        assert!(e.theta_err().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn prep_starts_a_fresh_history() {
        let item = Arc::new(Item::with_continuous(L1p::with_difficulty(0.0).unwrap()));
        let mut e = Examinee::new("e2");
        e.add_item(3, item.clone(), 1);
        e.add_item(0, item, 0);
        assert_eq!(e.num_items(), 2);
        assert!(e.has_administered(3));
        assert_eq!(e.administered_mask(4), vec![true, false, false, true]);
        assert_eq!(e.last().unwrap().response, 0);
        e.prep(10);
        assert_eq!(e.num_items(), 0);
        assert!(!e.has_administered(3));
    }
}
