//! Select the item whose location is closest to the current ability
//! estimate, optionally randomizing among the closest few.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::chooser::choose;
use super::{Algorithm, Category, Selector, Slots};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item_bank::ItemBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClosestDifficultyConfig {
    /// Randomize among this many closest items; 1 picks the closest.
    pub num: usize,
}

impl Default for ClosestDifficultyConfig {
    fn default() -> Self {
        Self { num: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct ClosestDifficulty {
    num: usize,
}

impl ClosestDifficulty {
    pub fn new(config: ClosestDifficultyConfig) -> Result<Self> {
        if config.num == 0 {
            return Err(CatError::config("closest-difficulty num must be at least 1"));
        }
        Ok(Self { num: config.num })
    }

    /// Deterministic closest match.
    pub fn exact() -> Self {
        Self { num: 1 }
    }

    pub fn num(&self) -> usize {
        self.num
    }
}

impl Selector for ClosestDifficulty {
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
        choose(
            self.num,
            eligible,
            |i| match bank.get_item(i)?.continuous() {
                Some(model) => model.distance(theta, covariates),
                None => Ok(f64::INFINITY),
            },
            rng,
        )
    }
}

impl Algorithm for ClosestDifficulty {
    const CATEGORY: Category = Category::Select;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        if bank.num_dims().is_none() {
            return Err(CatError::config(
                "closest-difficulty selection needs items with continuous models",
            ));
        }
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_selector(this);
    }
}
