//! Item exposure counting.
//!
//! Counts are kept per bank position in atomics, so examinees administered
//! concurrently through the same test update them without a test-wide lock.
//! An examinee is counted once the administration completes; one that fails
//! part way leaves the examinee count unchanged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Algorithm, Category, Recorder, Slots};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item::Item;
use crate::item_bank::ItemBank;

#[derive(Debug, Default)]
pub struct ExposureCounter {
    counts: Vec<AtomicU64>,
    examinees: AtomicU64,
}

impl ExposureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of examinees who have been administered `index`.
    pub fn count(&self, index: usize) -> Result<u64> {
        self.counts
            .get(index)
            .map(|c| c.load(Ordering::Relaxed))
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.counts.len(),
            })
    }

    /// Fraction of examinees so far who were administered `index`.
    pub fn rate(&self, index: usize) -> Result<f64> {
        let count = self.count(index)?;
        let n = self.num_examinees();
        Ok(if n == 0 { 0.0 } else { count as f64 / n as f64 })
    }

    pub fn rates(&self) -> Vec<f64> {
        let n = self.num_examinees();
        self.counts
            .iter()
            .map(|c| {
                if n == 0 {
                    0.0
                } else {
                    c.load(Ordering::Relaxed) as f64 / n as f64
                }
            })
            .collect()
    }

    pub fn max_rate(&self) -> f64 {
        self.rates().into_iter().fold(0.0, f64::max)
    }

    /// Sum of all per-item counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn num_examinees(&self) -> u64 {
        self.examinees.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Zeroes every count, e.g. before reusing a test for a new cohort.
    pub fn reset(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
        self.examinees.store(0, Ordering::Relaxed);
    }
}

impl Recorder for ExposureCounter {
    fn record(&self, index: usize, _item: &Item, _response: u32, _examinee: &Examinee) {
        if let Some(c) = self.counts.get(index) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn finalize(&self, _examinee: &Examinee) -> Result<()> {
        self.examinees.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Algorithm for ExposureCounter {
    const CATEGORY: Category = Category::Record;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        self.counts = (0..bank.len()).map(|_| AtomicU64::new(0)).collect();
        self.examinees = AtomicU64::new(0);
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_recorder(this);
    }
}
