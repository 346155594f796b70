//! Shared "best item, or one of the best few" selection helper.

use rand::{Rng, RngCore};

use crate::error::Result;

/// Picks the eligible item minimizing `criterion`.
///
/// With `num == 1` the first minimum in `eligible` order wins. With
/// `num > 1` one of the `num` smallest is drawn uniformly, ties broken by
/// position in `eligible`. NaN scores rank last.
pub fn choose<F>(
    num: usize,
    eligible: &[usize],
    mut criterion: F,
    rng: &mut dyn RngCore,
) -> Result<Option<usize>>
where
    F: FnMut(usize) -> Result<f64>,
{
    if eligible.is_empty() {
        return Ok(None);
    }

    if num <= 1 {
        let mut best = eligible[0];
        let mut best_score = score(criterion(best)?);
        for &index in &eligible[1..] {
            let s = score(criterion(index)?);
            if s < best_score {
                best = index;
                best_score = s;
            }
        }
        return Ok(Some(best));
    }

    let mut scored = Vec::with_capacity(eligible.len());
    for (pos, &index) in eligible.iter().enumerate() {
        scored.push((score(criterion(index)?), pos, index));
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let k = num.min(scored.len());
    let pick = rng.random_range(0..k);
    Ok(Some(scored[pick].2))
}

#[inline]
fn score(v: f64) -> f64 {
    if v.is_nan() {
        f64::INFINITY
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn single_choice_takes_first_minimum() {
        let mut rng = Pcg64::seed_from_u64(1);
        let scores = [3.0, 1.0, 2.0, 1.0];
        let eligible = [0, 1, 2, 3];
        let got = choose(1, &eligible, |i| Ok(scores[i]), &mut rng).unwrap();
        assert_eq!(got, Some(1));
        let got = choose(1, &[2, 3], |i| Ok(scores[i]), &mut rng).unwrap();
        assert_eq!(got, Some(3));
        assert_eq!(choose(1, &[], |i| Ok(scores[i]), &mut rng).unwrap(), None);
    }

    #[test]
    fn randomized_choice_stays_within_the_k_best() {
        let mut rng = Pcg64::seed_from_u64(7);
        let scores = [0.5, 4.0, 0.1, 3.0, 0.3, f64::NAN];
        let eligible: Vec<usize> = (0..scores.len()).collect();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let got = choose(3, &eligible, |i| Ok(scores[i]), &mut rng)
                .unwrap()
                .unwrap();
            assert!([0, 2, 4].contains(&got));
            seen.insert(got);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn criterion_errors_propagate() {
        let mut rng = Pcg64::seed_from_u64(0);
        let err = choose(
            1,
            &[0],
            |_| Err(crate::CatError::MissingState("theta estimate")),
            &mut rng,
        );
        assert!(err.is_err());
    }
}
