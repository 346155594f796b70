//! Kullback-Leibler selection for continuous models.
//!
//! An item's index is the KL divergence between its response distribution
//! at `theta_hat` and at other values of theta, averaged over a region
//! around the estimate. Early in a test the estimate is poor, so the index
//! rewards items that discriminate over a range of theta rather than at a
//! single point. The item with the largest index wins.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::chooser::choose;
use super::estimate_theta::{posterior_grid, NormalPrior, Prior};
use super::{Algorithm, Category, Selector, Slots};
use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item_bank::ItemBank;
use crate::linalg;
use crate::model::ContinuousModel;

pub const DEFAULT_KL_POINTS: usize = 21;

/// Where the divergence is averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KlRegion {
    /// The box `theta_hat ± c / sqrt(n)` after `n` items (`n = 1` before the
    /// first).
    #[default]
    Box,
    /// The ellipsoid `(θ - θ̂)ᵀ I (θ - θ̂) <= c²`, with `I` the information of
    /// the items given so far. While `I` is singular the box is used.
    Ellipse,
    /// All of theta, weighted by the posterior under the configured prior.
    Posterior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxKlIrtConfig {
    pub num: usize,
    pub region: KlRegion,
    /// Scale of the box and ellipsoid.
    pub c: f64,
    /// Grid points per dimension.
    pub points: usize,
    /// Population prior for the posterior weight. Empty fields mean a
    /// standard normal.
    pub prior: Prior,
}

impl Default for MaxKlIrtConfig {
    fn default() -> Self {
        Self {
            num: 1,
            region: KlRegion::Box,
            c: 3.0,
            points: DEFAULT_KL_POINTS,
            prior: Prior::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaxKlIrt {
    num: usize,
    region: KlRegion,
    c: f64,
    points: usize,
    prior_config: Prior,
    prior: Option<NormalPrior>,
}

/// Nodes and weights summing to one.
type Region = (Vec<Array1<f64>>, Vec<f64>);

impl MaxKlIrt {
    pub fn new(config: MaxKlIrtConfig) -> Result<Self> {
        if config.num == 0 {
            return Err(CatError::config("max-kl-irt num must be at least 1"));
        }
        if !(config.c > 0.0 && config.c.is_finite()) {
            return Err(CatError::config("max-kl-irt c must be positive"));
        }
        if config.points < 2 {
            return Err(CatError::config("max-kl-irt points must be at least 2"));
        }
        Ok(Self {
            num: config.num,
            region: config.region,
            c: config.c,
            points: config.points,
            prior_config: config.prior,
            prior: None,
        })
    }

    /// KL index of `model` for the examinee's current state.
    pub fn index(&self, model: &dyn ContinuousModel, examinee: &Examinee) -> Result<f64> {
        let theta = examinee
            .theta_hat()
            .ok_or(CatError::MissingState("theta estimate"))?;
        let region = self.region(examinee, theta)?;
        averaged_divergence(model, theta, examinee.covariates(), &region)
    }

    fn region(&self, examinee: &Examinee, theta: &Array1<f64>) -> Result<Region> {
        match self.region {
            KlRegion::Box => self.cube(examinee, theta),
            KlRegion::Ellipse => match information_axes(examinee, theta)? {
                Some(axes) => match self.ellipsoid(theta, &axes)? {
                    Some(region) => Ok(region),
                    None => self.cube(examinee, theta),
                },
                None => self.cube(examinee, theta),
            },
            KlRegion::Posterior => {
                let prior = self.prior.as_ref().ok_or_else(|| {
                    CatError::config("max-kl-irt selector used before registration")
                })?;
                posterior_grid(
                    examinee.history(),
                    examinee.covariates(),
                    prior,
                    self.points,
                )
            }
        }
    }

    fn cube(&self, examinee: &Examinee, theta: &Array1<f64>) -> Result<Region> {
        let n = examinee.num_items().max(1);
        let half = self.c / (n as f64).sqrt();
        let nodes: Vec<Array1<f64>> = unit_grid(self.points, theta.len())?
            .into_iter()
            .map(|u| theta + &(u * half))
            .collect();
        let w = 1.0 / nodes.len() as f64;
        let weights = vec![w; nodes.len()];
        Ok((nodes, weights))
    }

    /// `None` when no grid point falls inside the unit ball.
    fn ellipsoid(&self, theta: &Array1<f64>, axes: &Array2<f64>) -> Result<Option<Region>> {
        let nodes: Vec<Array1<f64>> = unit_grid(self.points, theta.len())?
            .into_iter()
            .filter(|u| u.dot(u) <= 1.0)
            .map(|u| theta + &(axes.dot(&u) * self.c))
            .collect();
        if nodes.is_empty() {
            return Ok(None);
        }
        let w = 1.0 / nodes.len() as f64;
        let weights = vec![w; nodes.len()];
        Ok(Some((nodes, weights)))
    }
}

/// Midpoints of `points` equal cells per axis of `[-1, 1]^dim`.
fn unit_grid(points: usize, dim: usize) -> Result<Vec<Array1<f64>>> {
    let total = points.checked_pow(dim as u32).ok_or_else(|| {
        CatError::config(format!("{points}^{dim} grid points is too many"))
    })?;
    let step = 2.0 / points as f64;
    let mut out = Vec::with_capacity(total);
    let mut idx = vec![0usize; dim];
    for _ in 0..total {
        out.push(idx.iter().map(|&i| -1.0 + (i as f64 + 0.5) * step).collect());
        for slot in idx.iter_mut() {
            *slot += 1;
            if *slot < points {
                break;
            }
            *slot = 0;
        }
    }
    Ok(out)
}

/// Cholesky factor of the inverse information collected so far, or `None`
/// while the information is singular.
fn information_axes(examinee: &Examinee, theta: &Array1<f64>) -> Result<Option<Array2<f64>>> {
    let n = theta.len();
    let mut info = Array2::<f64>::zeros((n, n));
    for a in examinee.history() {
        if let Some(model) = a.item.continuous() {
            model.fisher_inf(theta, examinee.covariates(), &mut info)?;
        }
    }
    Ok(linalg::cholesky(&info)
        .and_then(|_| linalg::invert(&info))
        .and_then(|inv| linalg::cholesky(&inv)))
}

/// KL divergence of the response distribution at `to` from the one at
/// `from`.
pub fn kl_divergence(
    model: &dyn ContinuousModel,
    from: &Array1<f64>,
    to: &Array1<f64>,
    covariates: &Covariates,
) -> Result<f64> {
    let p = response_distribution(model, from, covariates)?;
    divergence(model, &p, to, covariates)
}

fn response_distribution(
    model: &dyn ContinuousModel,
    theta: &Array1<f64>,
    covariates: &Covariates,
) -> Result<Vec<f64>> {
    (0..=model.max_response())
        .map(|k| model.prob(k, theta, covariates))
        .collect()
}

fn divergence(
    model: &dyn ContinuousModel,
    p: &[f64],
    to: &Array1<f64>,
    covariates: &Covariates,
) -> Result<f64> {
    let mut d = 0.0;
    for (k, &pk) in (0u32..).zip(p) {
        if pk > 0.0 {
            d += pk * (pk / model.prob(k, to, covariates)?).ln();
        }
    }
    Ok(d)
}

fn averaged_divergence(
    model: &dyn ContinuousModel,
    theta: &Array1<f64>,
    covariates: &Covariates,
    (nodes, weights): &Region,
) -> Result<f64> {
    let p = response_distribution(model, theta, covariates)?;
    let mut total = 0.0;
    for (node, &w) in nodes.iter().zip(weights) {
        if w > 0.0 {
            total += w * divergence(model, &p, node, covariates)?;
        }
    }
    Ok(total)
}

impl Selector for MaxKlIrt {
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
        let region = self.region(examinee, theta)?;
        choose(
            self.num,
            eligible,
            |i| match bank.get_item(i)?.continuous() {
                Some(model) => {
                    Ok(-averaged_divergence(model.as_ref(), theta, covariates, &region)?)
                }
                None => Ok(f64::INFINITY),
            },
            rng,
        )
    }
}

impl Algorithm for MaxKlIrt {
    const CATEGORY: Category = Category::Select;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        let dim = bank.num_dims().ok_or_else(|| {
            CatError::config("max-kl-irt selection needs items with continuous models")
        })?;
        if self.region == KlRegion::Posterior {
            self.prior = Some(NormalPrior::resolve(&self.prior_config, dim)?);
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
    use crate::model::{Dims, L1p, L2p};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn bank(params: &[(f64, f64)]) -> ItemBank {
        let mut bank = ItemBank::new();
        for &(a, b) in params {
            bank.add_item(Item::with_continuous(L2p::unidimensional(a, b).unwrap()))
                .unwrap();
        }
        bank
    }

    fn at(theta: f64) -> Examinee {
        let mut e = Examinee::new("e");
        e.set_theta_hat(&array![theta]);
        e
    }

    #[test]
    fn divergence_vanishes_only_at_the_estimate() {
        let m = L2p::unidimensional(1.5, 0.3).unwrap();
        let c = Covariates::new();
        let here = kl_divergence(&m, &array![0.2], &array![0.2], &c).unwrap();
        let there = kl_divergence(&m, &array![0.2], &array![1.0], &c).unwrap();
        assert!(here.abs() < 1e-12);
        assert!(there > 0.0);
    }

    #[test]
    fn discriminating_items_near_the_estimate_win() {
        let bank = bank(&[(0.5, 0.0), (2.0, 3.0), (1.8, 0.1), (1.0, -0.5)]);
        let e = at(0.0);
        let mut rng = Pcg64::seed_from_u64(0);
        for region in [KlRegion::Box, KlRegion::Ellipse, KlRegion::Posterior] {
            let mut alg = MaxKlIrt::new(MaxKlIrtConfig {
                region,
                ..MaxKlIrtConfig::default()
            })
            .unwrap();
            alg.bind(&bank).unwrap();
            let got = alg.select(&bank, &e, &[0, 1, 2, 3], &mut rng).unwrap();
            assert_eq!(got, Some(2), "{region:?}");
        }
    }

    #[test]
    fn box_shrinks_as_items_accumulate() {
        let bank = bank(&[(1.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 0.0)]);
        let mut e = at(0.0);
        let alg = MaxKlIrt::new(MaxKlIrtConfig::default()).unwrap();
        let m = L1p::with_difficulty(0.0).unwrap();
        let before = alg.index(&m, &e).unwrap();
        for i in 0..4 {
            e.add_item(i, bank.get_item(i).unwrap().clone(), (i % 2) as u32);
        }
        let after = alg.index(&m, &e).unwrap();
        assert!(after < before, "{after} vs {before}");
    }

    #[test]
    fn ellipse_follows_collected_information() {
        let mut bank = ItemBank::new();
        for dims in [vec![0], vec![1], vec![0], vec![0], vec![1]] {
            let mut m = L2p::new(Dims::new(2, dims).unwrap());
            let name = m.params().names()[1].clone();
            m.set_param(&name, 1.5).unwrap();
            bank.add_item(Item::with_continuous(m)).unwrap();
        }
        // dimension 1 is measured twice, dimension 2 once
        let mut e = Examinee::new("e");
        e.set_theta_hat(&array![0.0, 0.0]);
        for (i, r) in [(2, 1), (3, 0), (4, 1)] {
            e.add_item(i, bank.get_item(i).unwrap().clone(), r);
        }
        let mut alg = MaxKlIrt::new(MaxKlIrtConfig {
            region: KlRegion::Ellipse,
            points: 9,
            ..MaxKlIrtConfig::default()
        })
        .unwrap();
        alg.bind(&bank).unwrap();
        let got = alg
            .select(&bank, &e, &[0, 1], &mut Pcg64::seed_from_u64(0))
            .unwrap();
        assert_eq!(got, Some(1));
    }

    #[test]
    fn posterior_region_needs_registration() {
        let alg = MaxKlIrt::new(MaxKlIrtConfig {
            region: KlRegion::Posterior,
            ..MaxKlIrtConfig::default()
        })
        .unwrap();
        let m = L1p::with_difficulty(0.0).unwrap();
        assert!(alg.index(&m, &at(0.0)).unwrap_err().is_configuration());
    }

    #[test]
    fn invalid_settings_and_banks_are_rejected() {
        let bad = [
            MaxKlIrtConfig {
                num: 0,
                ..MaxKlIrtConfig::default()
            },
            MaxKlIrtConfig {
                c: 0.0,
                ..MaxKlIrtConfig::default()
            },
            MaxKlIrtConfig {
                points: 1,
                ..MaxKlIrtConfig::default()
            },
        ];
        for config in bad {
            assert!(MaxKlIrt::new(config).unwrap_err().is_configuration());
        }
        let mut alg = MaxKlIrt::new(MaxKlIrtConfig::default()).unwrap();
        assert!(alg.bind(&ItemBank::new()).is_err());

        let c: MaxKlIrtConfig =
            toml::from_str("region = \"posterior\"\n[prior]\nmean = [0.5]").unwrap();
        assert_eq!(c.region, KlRegion::Posterior);
        assert_eq!(c.prior.mean, vec![0.5]);
        assert_eq!(c.points, DEFAULT_KL_POINTS);
    }
}
