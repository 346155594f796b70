//! Administrable items.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::characteristic::Characteristic;
use crate::error::{CatError, Result};
use crate::model::{ContinuousModel, DiscreteModel};

/// A test item: a continuous model, a discrete model, or both, plus a set of
/// characteristic tags. Only the tags can change after construction.
pub struct Item {
    id: String,
    continuous: Option<Arc<dyn ContinuousModel>>,
    discrete: Option<Arc<dyn DiscreteModel>>,
    characteristics: RwLock<BTreeSet<Characteristic>>,
}

impl Item {
    /// An empty `id` is replaced when the item is added to a bank.
    pub fn new(
        id: impl Into<String>,
        continuous: Option<Arc<dyn ContinuousModel>>,
        discrete: Option<Arc<dyn DiscreteModel>>,
    ) -> Result<Self> {
        let id = id.into();
        match (&continuous, &discrete) {
            (None, None) => {
                return Err(CatError::InvalidItem(format!(
                    "item {id:?} has neither a continuous nor a discrete model"
                )))
            }
            (Some(c), Some(d)) if c.max_response() != d.max_response() => {
                return Err(CatError::InvalidItem(format!(
                    "item {id:?}: continuous model allows responses up to {}, discrete model up to {}",
                    c.max_response(),
                    d.max_response()
                )))
            }
            _ => {}
        }
        Ok(Self {
            id,
            continuous,
            discrete,
            characteristics: RwLock::new(BTreeSet::new()),
        })
    }

    pub fn with_continuous(model: impl ContinuousModel + 'static) -> Self {
        Self {
            id: String::new(),
            continuous: Some(Arc::new(model)),
            discrete: None,
            characteristics: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn with_discrete(model: impl DiscreteModel + 'static) -> Self {
        Self {
            id: String::new(),
            continuous: None,
            discrete: Some(Arc::new(model)),
            characteristics: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_default_id(&mut self, id: String) {
        if self.id.is_empty() {
            self.id = id;
        }
    }

    pub fn continuous(&self) -> Option<&Arc<dyn ContinuousModel>> {
        self.continuous.as_ref()
    }

    pub fn discrete(&self) -> Option<&Arc<dyn DiscreteModel>> {
        self.discrete.as_ref()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous.is_some()
    }

    pub fn is_discrete(&self) -> bool {
        self.discrete.is_some()
    }

    pub fn max_response(&self) -> u32 {
        match (&self.continuous, &self.discrete) {
            (Some(c), _) => c.max_response(),
            (None, Some(d)) => d.max_response(),
            (None, None) => 0,
        }
    }

    pub fn add_characteristic(&self, c: Characteristic) {
        self.tags_mut().insert(c);
    }

    pub fn remove_characteristic(&self, c: Characteristic) -> bool {
        self.tags_mut().remove(&c)
    }

    pub fn has_characteristic(&self, c: Characteristic) -> bool {
        self.characteristics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&c)
    }

    pub fn clear_characteristics(&self) {
        self.tags_mut().clear();
    }

    /// Snapshot of the current tags in code order. Each call starts over.
    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.characteristics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    fn tags_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<Characteristic>> {
        self.characteristics
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("continuous", &self.continuous.as_ref().map(|m| m.kind()))
            .field("discrete", &self.discrete.as_ref().map(|m| m.kind()))
            .finish()
    }
}
