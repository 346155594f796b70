//! Ordered, append-only collections of items.

use std::sync::Arc;

use crate::characteristic::{Characteristic, CharacteristicRegistry};
use crate::error::{CatError, Result};
use crate::item::Item;

#[derive(Debug, Default)]
pub struct ItemBank {
    items: Vec<Arc<Item>>,
    test_dim: Option<usize>,
    num_attrs: Option<usize>,
    registry: CharacteristicRegistry,
}

impl ItemBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// `size_hint` only preallocates.
    pub fn with_capacity(size_hint: usize) -> Self {
        Self {
            items: Vec::with_capacity(size_hint),
            ..Self::default()
        }
    }

    /// Appends an item and returns its index.
    ///
    /// Every continuous model in a bank must share one latent dimensionality
    /// and every discrete model one attribute count.
    pub fn add_item(&mut self, mut item: Item) -> Result<usize> {
        if let Some(model) = item.continuous() {
            let dim = model.dims().test_dim();
            match self.test_dim {
                Some(expected) if expected != dim => {
                    return Err(CatError::DimensionMismatch {
                        what: "item latent dimension",
                        expected,
                        found: dim,
                    })
                }
                _ => {}
            }
        }
        if let Some(model) = item.discrete() {
            let k = model.dims().test_dim();
            match self.num_attrs {
                Some(expected) if expected != k => {
                    return Err(CatError::DimensionMismatch {
                        what: "item attribute count",
                        expected,
                        found: k,
                    })
                }
                _ => {}
            }
        }

        if let Some(model) = item.continuous() {
            self.test_dim = Some(model.dims().test_dim());
        }
        if let Some(model) = item.discrete() {
            self.num_attrs = Some(model.dims().test_dim());
        }
        let index = self.items.len();
        item.set_default_id(format!("item-{}", index + 1));
        self.items.push(Arc::new(item));
        Ok(index)
    }

    pub fn get_item(&self, index: usize) -> Result<&Arc<Item>> {
        self.items.get(index).ok_or(CatError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.iter()
    }

    /// Latent dimensionality of the continuous models, if any.
    pub fn num_dims(&self) -> Option<usize> {
        self.test_dim
    }

    /// Attribute count of the discrete models, if any.
    pub fn num_attrs(&self) -> Option<usize> {
        self.num_attrs
    }

    /// Whether every item has a continuous model.
    pub fn is_continuous(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.is_continuous())
    }

    /// Whether every item has a discrete model.
    pub fn is_discrete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.is_discrete())
    }

    pub fn max_response(&self) -> u32 {
        self.items.iter().map(|i| i.max_response()).max().unwrap_or(0)
    }

    pub fn characteristics(&self) -> &CharacteristicRegistry {
        &self.registry
    }

    pub fn register_characteristic(&self, name: &str) -> Characteristic {
        self.registry.register(name)
    }
}
