//! Kullback-Leibler selection for discrete models.
//!
//! An item's index is the sum over every attribute pattern of the KL
//! divergence between its response distribution at `alpha_hat` and at that
//! pattern, optionally weighted by the pattern's posterior probability. The
//! item with the largest index separates the current classification best
//! from the alternatives.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::chooser::choose;
use super::{Algorithm, Category, Selector, Slots};
use crate::attributes::Attributes;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item_bank::ItemBank;
use crate::model::DiscreteModel;
use crate::utils::normalize_log_posterior;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxKlDiscrConfig {
    pub num: usize,
    /// Weight each pattern by its posterior probability.
    pub posterior: bool,
    /// Prior probabilities of the `2^K` patterns, indexed by integer
    /// encoding. Empty means uniform. Only used with `posterior`.
    pub prior: Vec<f64>,
}

impl Default for MaxKlDiscrConfig {
    fn default() -> Self {
        Self {
            num: 1,
            posterior: false,
            prior: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaxKlDiscr {
    num: usize,
    posterior: bool,
    prior: Vec<f64>,
    num_attrs: usize,
    log_prior: Vec<f64>,
}

impl MaxKlDiscr {
    pub fn new(config: MaxKlDiscrConfig) -> Result<Self> {
        if config.num == 0 {
            return Err(CatError::config("max-kl-discr num must be at least 1"));
        }
        if config.prior.iter().any(|p| !(p.is_finite() && *p >= 0.0)) {
            return Err(CatError::config(
                "max-kl-discr prior probabilities must be non-negative",
            ));
        }
        if !config.prior.is_empty() && config.prior.iter().sum::<f64>() <= 0.0 {
            return Err(CatError::config("max-kl-discr prior must have positive mass"));
        }
        Ok(Self {
            num: config.num,
            posterior: config.posterior,
            prior: config.prior,
            num_attrs: 0,
            log_prior: Vec::new(),
        })
    }

    /// KL index of `model` for the examinee's current state.
    pub fn index(&self, model: &dyn DiscreteModel, examinee: &Examinee) -> Result<f64> {
        let alpha = examinee
            .alpha_hat()
            .ok_or(CatError::MissingState("attribute estimate"))?;
        let weights = self.pattern_weights(examinee)?;
        summed_divergence(model, alpha, &weights)
    }

    /// Every pattern with its weight: one each, or its posterior
    /// probability given the discrete-model items answered so far.
    fn pattern_weights(&self, examinee: &Examinee) -> Result<Vec<(Attributes, f64)>> {
        let patterns: Vec<Attributes> = Attributes::all(self.num_attrs)?.collect();
        if !self.posterior {
            return Ok(patterns.into_iter().map(|a| (a, 1.0)).collect());
        }
        if self.log_prior.len() != patterns.len() {
            return Err(CatError::config(
                "max-kl-discr selector used before registration",
            ));
        }

        let mut log_post = Vec::with_capacity(patterns.len());
        for alpha in &patterns {
            let mut lp = self.log_prior[alpha.as_int() as usize];
            for a in examinee.history() {
                if let Some(model) = a.item.discrete() {
                    lp += model.prob(a.response, alpha)?.ln();
                }
            }
            log_post.push(lp);
        }
        let post = normalize_log_posterior(&log_post);
        Ok(patterns.into_iter().zip(post).collect())
    }
}

/// KL divergence of the response distribution at `to` from the one at
/// `from`.
pub fn kl_divergence(model: &dyn DiscreteModel, from: &Attributes, to: &Attributes) -> Result<f64> {
    let p = response_distribution(model, from)?;
    divergence(model, &p, to)
}

fn response_distribution(model: &dyn DiscreteModel, alpha: &Attributes) -> Result<Vec<f64>> {
    (0..=model.max_response())
        .map(|k| model.prob(k, alpha))
        .collect()
}

fn divergence(model: &dyn DiscreteModel, p: &[f64], to: &Attributes) -> Result<f64> {
    let mut d = 0.0;
    for (k, &pk) in (0u32..).zip(p) {
        if pk > 0.0 {
            d += pk * (pk / model.prob(k, to)?).ln();
        }
    }
    Ok(d)
}

fn summed_divergence(
    model: &dyn DiscreteModel,
    alpha: &Attributes,
    weights: &[(Attributes, f64)],
) -> Result<f64> {
    let p = response_distribution(model, alpha)?;
    let mut total = 0.0;
    for (pattern, w) in weights {
        if *w > 0.0 {
            total += w * divergence(model, &p, pattern)?;
        }
    }
    Ok(total)
}

impl Selector for MaxKlDiscr {
    fn select(
        &self,
        bank: &ItemBank,
        examinee: &Examinee,
        eligible: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<Option<usize>> {
        let alpha = examinee
            .alpha_hat()
            .ok_or(CatError::MissingState("attribute estimate"))?;
        let weights = self.pattern_weights(examinee)?;
        choose(
            self.num,
            eligible,
            |i| match bank.get_item(i)?.discrete() {
                Some(model) => Ok(-summed_divergence(model.as_ref(), alpha, &weights)?),
                None => Ok(f64::INFINITY),
            },
            rng,
        )
    }
}

impl Algorithm for MaxKlDiscr {
    const CATEGORY: Category = Category::Select;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        let num_attrs = bank.num_attrs().ok_or_else(|| {
            CatError::config("max-kl-discr selection needs items with discrete models")
        })?;
        let num_patterns = Attributes::all(num_attrs)?.count();
        self.log_prior = if self.prior.is_empty() {
            vec![0.0; num_patterns]
        } else if self.prior.len() == num_patterns {
            let mass: f64 = self.prior.iter().sum();
            self.prior.iter().map(|p| (p / mass).ln()).collect()
        } else {
            return Err(CatError::config(format!(
                "max-kl-discr prior has {} entries, expected {num_patterns}",
                self.prior.len()
            )));
        };
        self.num_attrs = num_attrs;
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_selector(this);
    }
}
