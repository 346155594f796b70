//! Name registry for item characteristics (content areas, formats, ...).
//!
//! A registry is owned by an [`ItemBank`](crate::ItemBank); codes are stable
//! for the registry's lifetime and never reused.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Integer code for a registered characteristic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Characteristic(u32);

impl Characteristic {
    #[inline]
    pub fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Names {
    by_name: HashMap<String, Characteristic>,
    by_code: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CharacteristicRegistry {
    inner: RwLock<Names>,
}

impl CharacteristicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the code for `name`, allocating one on first use.
    pub fn register(&self, name: &str) -> Characteristic {
        if let Some(c) = self.from_name(name) {
            return c;
        }
        let mut names = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&c) = names.by_name.get(name) {
            return c;
        }
        let c = Characteristic(names.by_code.len() as u32);
        names.by_code.push(name.to_owned());
        names.by_name.insert(name.to_owned(), c);
        tracing::debug!(name, code = c.0, "registered characteristic");
        c
    }

    pub fn from_name(&self, name: &str) -> Option<Characteristic> {
        let names = self.inner.read().unwrap_or_else(|e| e.into_inner());
        names.by_name.get(name).copied()
    }

    pub fn as_str(&self, c: Characteristic) -> Option<String> {
        let names = self.inner.read().unwrap_or_else(|e| e.into_inner());
        names.by_code.get(c.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_code
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
