//! Attribute pattern estimation by exhaustive maximum likelihood.

use std::sync::Arc;

use super::{Algorithm, Category, Estimator, Slots};
use crate::attributes::Attributes;
use crate::error::{CatError, Result};
use crate::examinee::{Administered, Examinee};
use crate::item_bank::ItemBank;

/// Most likely of the `2^num_attrs` patterns given the discrete-model items
/// in `history`. Ties go to the smallest integer encoding.
pub fn estimate_alpha_mle(history: &[Administered], num_attrs: usize) -> Result<Attributes> {
    let mut best: Option<(f64, Attributes)> = None;
    for alpha in Attributes::all(num_attrs)? {
        let mut log_lik = 0.0;
        for a in history {
            if let Some(model) = a.item.discrete() {
                log_lik += model.prob(a.response, &alpha)?.ln();
            }
        }
        match best {
            Some((b, _)) if log_lik <= b => {}
            _ => best = Some((log_lik, alpha)),
        }
    }
    match best {
        Some((_, alpha)) => Ok(alpha),
        None => Attributes::new(num_attrs),
    }
}

/// Estimates `alpha_hat` from items with discrete models.
#[derive(Debug, Clone, Default)]
pub struct EstimateAlpha {
    num_attrs: usize,
}

impl EstimateAlpha {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for EstimateAlpha {
    fn initialize(&self, _bank: &ItemBank, examinee: &mut Examinee) -> Result<()> {
        examinee.set_alpha_hat(&Attributes::new(self.num_attrs)?);
        Ok(())
    }

    fn estimate(&self, examinee: &mut Examinee) -> Result<()> {
        if !examinee.history().iter().any(|a| a.item.is_discrete()) {
            return Ok(());
        }
        let alpha = estimate_alpha_mle(examinee.history(), self.num_attrs)?;
        tracing::trace!(examinee = examinee.id(), alpha = %alpha, "attribute estimate");
        examinee.set_alpha_hat(&alpha);
        Ok(())
    }
}

impl Algorithm for EstimateAlpha {
    const CATEGORY: Category = Category::Estimate;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        self.num_attrs = bank.num_attrs().ok_or_else(|| {
            CatError::config("attribute estimation needs items with discrete models")
        })?;
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_estimator(this);
    }
}
