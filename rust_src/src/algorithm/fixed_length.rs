//! Stop after a fixed number of items.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Algorithm, Category, Slots, StopCriterion};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedLengthConfig {
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct FixedLength {
    length: usize,
}

impl FixedLength {
    pub fn new(config: FixedLengthConfig) -> Result<Self> {
        if config.length == 0 {
            return Err(CatError::config("test length must be at least 1"));
        }
        Ok(Self {
            length: config.length,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl StopCriterion for FixedLength {
    fn should_stop(&self, examinee: &Examinee) -> bool {
        examinee.num_items() >= self.length
    }
}

impl Algorithm for FixedLength {
    const CATEGORY: Category = Category::Stop;

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_stop(this);
    }
}
