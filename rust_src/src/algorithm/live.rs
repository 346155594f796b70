//! Live administration: responses come from outside the engine.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use super::{Algorithm, Category, Responder, Slots};
use crate::error::Result;
use crate::examinee::Examinee;
use crate::item::Item;

/// Supplies an examinee's response to a presented item. The call is
/// synchronous; the engine waits for it to return.
pub trait ResponseSource: Send + Sync {
    fn response(&self, index: usize, item: &Item, examinee: &Examinee) -> Result<u32>;
}

impl<F> ResponseSource for F
where
    F: Fn(usize, &Item, &Examinee) -> Result<u32> + Send + Sync,
{
    fn response(&self, index: usize, item: &Item, examinee: &Examinee) -> Result<u32> {
        self(index, item, examinee)
    }
}

pub struct LiveAdminister<S> {
    source: S,
}

impl<S: ResponseSource> LiveAdminister<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S> fmt::Debug for LiveAdminister<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveAdminister").finish_non_exhaustive()
    }
}

impl<S: ResponseSource> Responder for LiveAdminister<S> {
    fn respond(
        &self,
        index: usize,
        item: &Item,
        examinee: &Examinee,
        _rng: &mut dyn RngCore,
    ) -> Result<Option<u32>> {
        let resp = self.source.response(index, item, examinee)?;
        tracing::debug!(examinee = examinee.id(), item = item.id(), resp, "live response");
        Ok(Some(resp))
    }
}

impl<S: ResponseSource + 'static> Algorithm for LiveAdminister<S> {
    const CATEGORY: Category = Category::Administer;

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_administrator(this);
    }
}
