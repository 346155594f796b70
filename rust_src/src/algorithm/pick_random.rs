//! Uniformly random item selection.

use std::sync::Arc;

use rand::{Rng, RngCore};

use super::{Algorithm, Category, Selector, Slots};
use crate::error::Result;
use crate::examinee::Examinee;
use crate::item_bank::ItemBank;

#[derive(Debug, Clone, Copy, Default)]
pub struct PickRandom;

impl PickRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for PickRandom {
    fn select(
        &self,
        _bank: &ItemBank,
        _examinee: &Examinee,
        eligible: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<Option<usize>> {
        if eligible.is_empty() {
            return Ok(None);
        }
        Ok(Some(eligible[rng.random_range(0..eligible.len())]))
    }
}

impl Algorithm for PickRandom {
    const CATEGORY: Category = Category::Select;

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_selector(this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn draws_only_eligible_items() {
        let bank = ItemBank::new();
        let e = Examinee::new("x");
        let mut rng = Pcg64::seed_from_u64(3);
        let eligible = [1, 4, 9];
        let mut hits = [0usize; 10];
        for _ in 0..300 {
            let i = PickRandom
                .select(&bank, &e, &eligible, &mut rng)
                .unwrap()
                .unwrap();
            hits[i] += 1;
        }
        assert_eq!(hits.iter().sum::<usize>(), 300);
        for i in eligible {
            assert!(hits[i] > 50);
        }
    }
}
