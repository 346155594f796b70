//! Batch simulation: drawing banks and examinees, and administering a test
//! to many examinees in parallel.

use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::administration::Test;
use crate::attributes::Attributes;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item::Item;
use crate::item_bank::ItemBank;
use crate::model::L1p;

/// Administers `test` to every examinee. Examinee `i` gets its own `Pcg64`
/// seeded with `seed + i`, so results do not depend on scheduling.
pub fn administer_batch(test: &Test, examinees: &mut [Examinee], seed: u64) -> Result<()> {
    examinees
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(i, examinee)| {
            let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(i as u64));
            test.administer(examinee, &mut rng)
        })?;

    let summary = BatchSummary::from_examinees(examinees);
    tracing::info!(
        test = %test.name(),
        examinees = summary.num_examinees,
        mean_length = summary.mean_length,
        theta_mae = ?summary.theta_mae,
        "batch administered"
    );
    Ok(())
}

/// Aggregate accuracy of a simulated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub num_examinees: usize,
    pub mean_length: f64,
    /// Mean absolute error of `theta_hat` against `true_theta`, over every
    /// dimension of every examinee that has both.
    pub theta_mae: Option<f64>,
    pub theta_rmse: Option<f64>,
    /// Fraction of examinees whose attribute estimate matches exactly.
    pub pattern_rate: Option<f64>,
}

impl BatchSummary {
    pub fn from_examinees(examinees: &[Examinee]) -> Self {
        let n = examinees.len();
        let mean_length = if n == 0 {
            0.0
        } else {
            examinees.iter().map(|e| e.num_items()).sum::<usize>() as f64 / n as f64
        };

        let mut abs = 0.0;
        let mut sq = 0.0;
        let mut count = 0usize;
        for e in examinees {
            if let (Some(truth), Some(est)) = (e.true_theta(), e.theta_hat()) {
                for (t, h) in truth.iter().zip(est.iter()) {
                    let d = h - t;
                    abs += d.abs();
                    sq += d * d;
                    count += 1;
                }
            }
        }
        let (theta_mae, theta_rmse) = if count == 0 {
            (None, None)
        } else {
            (Some(abs / count as f64), Some((sq / count as f64).sqrt()))
        };

        let classified: Vec<bool> = examinees
            .iter()
            .filter_map(|e| match (e.true_alpha(), e.alpha_hat()) {
                (Some(t), Some(h)) => Some(t == h),
                _ => None,
            })
            .collect();
        let pattern_rate = if classified.is_empty() {
            None
        } else {
            Some(classified.iter().filter(|&&c| c).count() as f64 / classified.len() as f64)
        };

        Self {
            num_examinees: n,
            mean_length,
            theta_mae,
            theta_rmse,
            pattern_rate,
        }
    }
}

/// A one-dimensional Rasch bank with difficulties drawn from
/// `N(mean, sd^2)`.
pub fn rasch_bank<R: Rng + ?Sized>(
    num_items: usize,
    mean: f64,
    sd: f64,
    rng: &mut R,
) -> Result<ItemBank> {
    let normal = Normal::new(mean, sd)
        .map_err(|e| CatError::config(format!("difficulty distribution: {e}")))?;
    let mut bank = ItemBank::with_capacity(num_items);
    for _ in 0..num_items {
        let b = normal.sample(rng);
        bank.add_item(Item::with_continuous(L1p::with_difficulty(b)?))?;
    }
    Ok(bank)
}

/// Examinees `examinee-1..=n` with true theta drawn from a standard normal in
/// each of `dim` dimensions.
pub fn normal_examinees<R: Rng + ?Sized>(n: usize, dim: usize, rng: &mut R) -> Vec<Examinee> {
    (0..n)
        .map(|i| {
            let theta: Array1<f64> = (0..dim).map(|_| StandardNormal.sample(rng)).collect();
            let mut e = Examinee::new(format!("examinee-{}", i + 1));
            e.set_true_theta(&theta);
            e
        })
        .collect()
}

/// Examinees with true attribute patterns drawn uniformly from the `2^K`
/// patterns.
pub fn uniform_alpha_examinees<R: Rng + ?Sized>(
    n: usize,
    num_attrs: usize,
    rng: &mut R,
) -> Result<Vec<Examinee>> {
    Attributes::new(num_attrs)?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut alpha = Attributes::new(num_attrs)?;
        for k in 0..num_attrs {
            alpha.set(k, rng.random::<bool>())?;
        }
        let mut e = Examinee::new(format!("examinee-{}", i + 1));
        e.set_true_alpha(&alpha);
        out.push(e);
    }
    Ok(out)
}
