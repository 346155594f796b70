//! Classification accuracy of attribute estimates.
//!
//! After each examinee, `alpha_hat` is compared with `true_alpha`: whole
//! pattern agreement, per-attribute agreement and the number of
//! misclassified attributes are tallied, optionally per true pattern.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{Algorithm, Category, Recorder, Slots};
use crate::attributes::Attributes;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item::Item;
use crate::item_bank::ItemBank;

#[derive(Debug, Default, Clone)]
struct Tallies {
    examinees: u64,
    correct_patterns: u64,
    correct_attribute: Vec<u64>,
    /// `misclassified[n]`: examinees with exactly `n` wrong attributes.
    misclassified: Vec<u64>,
    /// true pattern → (examinees, correctly classified)
    by_pattern: BTreeMap<Attributes, (u64, u64)>,
}

/// Snapshot of the classification rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRatesSummary {
    pub num_examinees: u64,
    pub pattern_rate: f64,
    pub attribute_rates: Vec<f64>,
    /// Entry `n` is the fraction with exactly `n` misclassified attributes.
    pub misclassify_freq: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct ClassRates {
    by_pattern: bool,
    num_attrs: usize,
    tallies: Mutex<Tallies>,
}

impl ClassRates {
    /// With `by_pattern`, rates are also kept for each true pattern.
    pub fn new(by_pattern: bool) -> Self {
        Self {
            by_pattern,
            ..Self::default()
        }
    }

    fn tallies(&self) -> std::sync::MutexGuard<'_, Tallies> {
        self.tallies.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn num_examinees(&self) -> u64 {
        self.tallies().examinees
    }

    pub fn summary(&self) -> ClassRatesSummary {
        let t = self.tallies();
        let rate = |count: u64| {
            if t.examinees == 0 {
                0.0
            } else {
                count as f64 / t.examinees as f64
            }
        };
        ClassRatesSummary {
            num_examinees: t.examinees,
            pattern_rate: rate(t.correct_patterns),
            attribute_rates: t.correct_attribute.iter().map(|&c| rate(c)).collect(),
            misclassify_freq: t.misclassified.iter().map(|&c| rate(c)).collect(),
        }
    }

    /// Examinees seen with true pattern `alpha`. `None` unless tracking by
    /// pattern.
    pub fn num_examinees_by_pattern(&self, alpha: &Attributes) -> Option<u64> {
        if !self.by_pattern {
            return None;
        }
        Some(self.tallies().by_pattern.get(alpha).map_or(0, |&(n, _)| n))
    }

    /// Classification rate among examinees whose true pattern is `alpha`.
    pub fn rate_by_pattern(&self, alpha: &Attributes) -> Option<f64> {
        if !self.by_pattern {
            return None;
        }
        let t = self.tallies();
        Some(match t.by_pattern.get(alpha) {
            Some(&(n, correct)) if n > 0 => correct as f64 / n as f64,
            _ => 0.0,
        })
    }
}

impl Recorder for ClassRates {
    fn record(&self, _index: usize, _item: &Item, _response: u32, _examinee: &Examinee) {}

    fn finalize(&self, examinee: &Examinee) -> Result<()> {
        let truth = examinee
            .true_alpha()
            .ok_or(CatError::MissingState("true attribute pattern"))?;
        let estimate = examinee
            .alpha_hat()
            .ok_or(CatError::MissingState("attribute estimate"))?;
        if truth.len() != self.num_attrs || estimate.len() != self.num_attrs {
            return Err(CatError::DimensionMismatch {
                what: "attribute pattern",
                expected: self.num_attrs,
                found: truth.len().min(estimate.len()),
            });
        }

        let wrong = truth.hamming(estimate) as usize;
        let mut t = self.tallies();
        t.examinees += 1;
        for i in 0..self.num_attrs {
            if truth.bit(i) == estimate.bit(i) {
                t.correct_attribute[i] += 1;
            }
        }
        if wrong == 0 {
            t.correct_patterns += 1;
        }
        t.misclassified[wrong] += 1;
        if self.by_pattern {
            let entry = t.by_pattern.entry(*truth).or_insert((0, 0));
            entry.0 += 1;
            if wrong == 0 {
                entry.1 += 1;
            }
        }
        Ok(())
    }
}

impl Algorithm for ClassRates {
    const CATEGORY: Category = Category::Record;

    fn bind(&mut self, bank: &ItemBank) -> Result<()> {
        let k = bank.num_attrs().ok_or_else(|| {
            CatError::config("classification rates need items with discrete models")
        })?;
        self.num_attrs = k;
        *self.tallies() = Tallies {
            correct_attribute: vec![0; k],
            misclassified: vec![0; k + 1],
            ..Tallies::default()
        };
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots) {
        slots.add_recorder(this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dims, Dina};

    fn bound(by_pattern: bool) -> ClassRates {
        let mut bank = ItemBank::new();
        bank.add_item(Item::with_discrete(
            Dina::new(Dims::all(3).unwrap(), 0.1, 0.1).unwrap(),
        ))
        .unwrap();
        let mut rates = ClassRates::new(by_pattern);
        rates.bind(&bank).unwrap();
        rates
    }

    fn examinee(truth: &str, estimate: &str) -> Examinee {
        let mut e = Examinee::new("e");
        e.set_true_alpha(&truth.parse().unwrap());
        e.set_alpha_hat(&estimate.parse().unwrap());
        e
    }

    #[test]
    fn tallies_patterns_and_attributes() {
        let rates = bound(true);
        rates.finalize(&examinee("101", "101")).unwrap();
        rates.finalize(&examinee("101", "100")).unwrap();
        rates.finalize(&examinee("011", "100")).unwrap();
        rates.finalize(&examinee("000", "000")).unwrap();

        let s = rates.summary();
        assert_eq!(s.num_examinees, 4);
        assert_eq!(s.pattern_rate, 0.5);
        assert_eq!(s.attribute_rates, vec![0.75, 0.75, 0.5]);
        assert_eq!(s.misclassify_freq, vec![0.5, 0.25, 0.0, 0.25]);

        let p: Attributes = "101".parse().unwrap();
        assert_eq!(rates.num_examinees_by_pattern(&p), Some(2));
        assert_eq!(rates.rate_by_pattern(&p), Some(0.5));
    }

    #[test]
    fn pattern_tracking_is_opt_in() {
        let rates = bound(false);
        rates.finalize(&examinee("101", "101")).unwrap();
        let p: Attributes = "101".parse().unwrap();
        assert_eq!(rates.rate_by_pattern(&p), None);
    }

    #[test]
    fn missing_truth_is_an_error() {
        let rates = bound(false);
        let mut e = Examinee::new("e");
        e.set_alpha_hat(&"000".parse().unwrap());
        assert!(matches!(rates.finalize(&e), Err(CatError::MissingState(_))));
    }
}
