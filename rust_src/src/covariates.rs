//! Named examinee covariates.

use std::collections::BTreeMap;

use crate::error::{CatError, Result};

/// Real-valued examinee covariates keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Covariates {
    values: BTreeMap<String, f64>,
}

impl Covariates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CatError::UnknownName(format!("covariate {name}")))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Covariates {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut c = Covariates::new();
        for (name, value) in iter {
            c.set(name, value);
        }
        c
    }
}
