//! Maximum Fisher information selection.
//!
//! For a one-dimensional trait the item with the largest information at
//! `theta_hat` wins. For several dimensions the candidate's information is
//! added to the information already collected and the sum is reduced to a
//! scalar with [`FisherCriterion`].

use std::sync::Arc;

use ndarray::Array2;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::chooser::choose;
use super::{Algorithm, Category, Selector, Slots};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item_bank::ItemBank;
use crate::linalg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FisherCriterion {
    /// Maximize the determinant of the accumulated information.
    #[default]
    #[serde(alias = "d", alias = "D")]
    DOptimal,
    /// Minimize the trace of its inverse.
    #[serde(alias = "a", alias = "A")]
    AOptimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxFisherConfig {
    pub num: usize,
    pub criterion: FisherCriterion,
}

impl Default for MaxFisherConfig {
    fn default() -> Self {
        Self {
            num: 1,
            criterion: FisherCriterion::DOptimal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaxFisher {
    num: usize,
    criterion: FisherCriterion,
}

impl MaxFisher {
    pub fn new(config: MaxFisherConfig) -> Result<Self> {
        if config.num == 0 {
            return Err(CatError::config("max-fisher num must be at least 1"));
        }
        Ok(Self {
            num: config.num,
            criterion: config.criterion,
        })
    }

    /// Score to minimize for a candidate, given the information collected
    /// so far.
    fn score(&self, base: &Array2<f64>, item: &Array2<f64>) -> f64 {
        let n = base.nrows();
        if n == 1 {
            return -item[[0, 0]];
        }
        let total = base + item;
        match self.criterion {
            FisherCriterion::DOptimal => -linalg::determinant(&total),
            FisherCriterion::AOptimal => match linalg::invert(&total) {
                Some(inv) => (0..n).map(|i| inv[[i, i]]).sum(),
                None => f64::INFINITY,
            },
        }
    }
}

impl Selector for MaxFisher {
    fn select(
        &self,
        bank: &ItemBank,
        examinee: &Examinee,
        eligible: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<Option<usize>> {
        let theta = examinee
            .theta_hat()
            .ok_or(CatError::MissingState("theta estimate"))?;
        let covariates = examinee.covariates();
        let n = theta.len();

        let mut base = Array2::<f64>::zeros((n, n));
        for a in examinee.history() {
            if let Some(model) = a.item.continuous() {
                model.fisher_inf(theta, covariates, &mut base)?;
            }
        }

        let mut inf = Array2::<f64>::zeros((n, n));
        choose(
            self.num,
            eligible,
            |i| match bank.get_item(i)?.continuous() {
                Some(model) => {
                    inf.fill(0.0);
                    model.fisher_inf(theta, covariates, &mut inf)?;
                    Ok(self.score(&base, &inf))
                }
                None => Ok(f64::INFINITY),
            },
            rng,
        )
    }
}

impl Algorithm for MaxFisher {
    const CATEGORY: Category = Category::Select;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        if bank.num_dims().is_none() {
            return Err(CatError::config(
                "max-fisher selection needs items with continuous models",
            ));
        }
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_selector(this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use crate::model::{ContinuousModel, Dims, L2p};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn picks_the_most_informative_item() {
        let mut bank = ItemBank::new();
        for (a, b) in [(1.0, 0.0), (2.0, 2.0), (1.8, 0.1), (0.5, 0.0)] {
            bank.add_item(Item::with_continuous(L2p::unidimensional(a, b).unwrap()))
                .unwrap();
        }
        let mut e = Examinee::new("e");
        e.set_theta_hat(&array![0.0]);
        let mut rng = Pcg64::seed_from_u64(0);
        let alg = MaxFisher::new(MaxFisherConfig::default()).unwrap();
        let eligible = [0, 1, 2, 3];
        let got = alg.select(&bank, &e, &eligible, &mut rng).unwrap().unwrap();

        let info = |i: usize| {
            let mut m = Array2::zeros((1, 1));
            bank.get_item(i)
                .unwrap()
                .continuous()
                .unwrap()
                .fisher_inf(&array![0.0], e.covariates(), &mut m)
                .unwrap();
            m[[0, 0]]
        };
        assert_eq!(got, 2);
        for i in eligible {
            assert!(info(got) >= info(i));
        }
    }

    #[test]
    fn multidimensional_criteria_favor_the_weak_dimension() {
        let mut bank = ItemBank::new();
        let loads = [vec![0], vec![1]];
        for dims in loads {
            let mut m = L2p::new(Dims::new(2, dims).unwrap());
            let name = m.params().names()[1].clone();
            m.set_param(&name, 1.5).unwrap();
            bank.add_item(Item::with_continuous(m)).unwrap();
        }
        for _ in 0..3 {
            bank.add_item(Item::with_continuous(L2p::new(Dims::new(2, vec![0]).unwrap())))
                .unwrap();
        }

        // three items on dimension 1 already given
        let mut e = Examinee::new("e");
        e.set_theta_hat(&array![0.0, 0.0]);
        for i in 2..5 {
            e.add_item(i, bank.get_item(i).unwrap().clone(), 1);
        }
        let mut rng = Pcg64::seed_from_u64(0);
        for criterion in [FisherCriterion::DOptimal, FisherCriterion::AOptimal] {
            let alg = MaxFisher::new(MaxFisherConfig { num: 1, criterion }).unwrap();
            let got = alg.select(&bank, &e, &[0, 1], &mut rng).unwrap();
            assert_eq!(got, Some(1), "{criterion:?}");
        }
    }

    #[test]
    fn criterion_parses_short_names() {
        let c: MaxFisherConfig = toml::from_str("num = 2\ncriterion = \"A\"").unwrap();
        assert_eq!(c.criterion, FisherCriterion::AOptimal);
        assert_eq!(c.num, 2);
    }
}
