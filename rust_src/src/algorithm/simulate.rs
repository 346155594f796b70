//! Simulated responses drawn from the examinee's true latent state.

use std::sync::Arc;

use rand::{Rng, RngCore};

use super::{Algorithm, Category, Responder, Slots};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item::Item;

/// Inverse-CDF draw over categories `0..=max`.
fn draw<F>(max: u32, mut prob: F, rng: &mut dyn RngCore) -> Result<u32>
where
    F: FnMut(u32) -> Result<f64>,
{
    let u: f64 = rng.random();
    let mut cumulative = 0.0;
    for k in 0..max {
        cumulative += prob(k)?;
        if u < cumulative {
            return Ok(k);
        }
    }
    Ok(max)
}

/// Answers items with continuous models at the true `theta`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulateTheta;

impl Responder for SimulateTheta {
    fn respond(
        &self,
        _index: usize,
        item: &Item,
        examinee: &Examinee,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u32>> {
        let Some(model) = item.continuous() else {
            return Ok(None);
        };
        let theta = examinee
            .true_theta()
            .ok_or(CatError::MissingState("true theta"))?;
        let covariates = examinee.covariates();
        let resp = draw(
            model.max_response(),
            |k| model.prob(k, theta, covariates),
            rng,
        )?;
        Ok(Some(resp))
    }
}

impl Algorithm for SimulateTheta {
    const CATEGORY: Category = Category::Simulate;

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_simulator(this);
    }
}

/// Answers items with discrete models at the true attribute pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulateAlpha;

impl Responder for SimulateAlpha {
    fn respond(
        &self,
        _index: usize,
        item: &Item,
        examinee: &Examinee,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u32>> {
        let Some(model) = item.discrete() else {
            return Ok(None);
        };
        let alpha = examinee
            .true_alpha()
            .ok_or(CatError::MissingState("true attribute pattern"))?;
        let resp = draw(model.max_response(), |k| model.prob(k, alpha), rng)?;
        Ok(Some(resp))
    }
}

impl Algorithm for SimulateAlpha {
    const CATEGORY: Category = Category::Simulate;

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_simulator(this);
    }
}
