use std::sync::Arc;

use mirt_cat::algorithm::{
    ClassRates, ClosestDifficulty, ClosestDifficultyConfig, EstimateAlpha, EstimateTheta,
    ExposureCounter, FixedLength, FixedLengthConfig, LiveAdminister, MaxFisher,
    MaxFisherConfig, MaxKlDiscr, MaxKlDiscrConfig, PickRandom, SimulateAlpha, SimulateTheta,
};
use mirt_cat::model::{Dims, Dina, L1p, L2p, Nominal};
use mirt_cat::simulation::{administer_batch, normal_examinees, uniform_alpha_examinees};
use mirt_cat::{
    Attributes, CatError, ContinuousModel, DiscreteModel, Examinee, Item, ItemBank, Result,
    Test, ThetaOutcome,
};
use ndarray::array;
use rand::SeedableRng;
use rand_pcg::Pcg64;

fn fixed(length: usize) -> FixedLength {
    FixedLength::new(FixedLengthConfig { length }).unwrap()
}

fn l2p_bank(n: usize) -> Arc<ItemBank> {
    let mut bank = ItemBank::with_capacity(n);
    for i in 0..n {
        let a = 0.8 + (i % 5) as f64 * 0.2;
        let b = -2.5 + 5.0 * i as f64 / n as f64;
        bank.add_item(Item::with_continuous(L2p::unidimensional(a, b).unwrap()))
            .unwrap();
    }
    Arc::new(bank)
}

#[test]
fn exposure_counts_sum_to_examinees_times_length() {
    let mut test = Test::new("exposure", l2p_bank(60));
    test.register(SimulateTheta).unwrap();
    test.register(ClosestDifficulty::new(ClosestDifficultyConfig { num: 3 }).unwrap())
        .unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(8)).unwrap();
    let exposure = test.register(ExposureCounter::new()).unwrap();

    let mut rng = Pcg64::seed_from_u64(10);
    let mut people = normal_examinees(40, 1, &mut rng);
    administer_batch(&test, &mut people, 500).unwrap();

    assert_eq!(exposure.num_examinees(), 40);
    assert_eq!(exposure.total(), 40 * 8);
    let rate_sum: f64 = exposure.rates().iter().sum();
    assert!((rate_sum - 8.0).abs() < 1e-9);
    for e in &people {
        assert_eq!(e.num_items(), 8);
        let mut seen: Vec<usize> = e.history().iter().map(|h| h.index).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }
}

#[test]
fn failed_administrations_are_not_counted_as_examinees() {
    let mut test = Test::new("short", l2p_bank(3));
    test.register(SimulateTheta).unwrap();
    test.register(PickRandom).unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(5)).unwrap();
    let exposure = test.register(ExposureCounter::new()).unwrap();

    let mut e = Examinee::new("e");
    e.set_true_theta(&array![0.0]);
    let err = test.administer(&mut e, &mut Pcg64::seed_from_u64(3)).unwrap_err();
    assert!(matches!(err, CatError::BankExhausted));
    assert_eq!(exposure.num_examinees(), 0);
    assert_eq!(exposure.total(), 3);
}

#[test]
fn max_fisher_administers_without_repeats() {
    let mut test = Test::new("fisher", l2p_bank(30));
    test.register(SimulateTheta).unwrap();
    test.register(MaxFisher::new(MaxFisherConfig::default()).unwrap())
        .unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(12)).unwrap();

    let mut e = Examinee::new("e");
    e.set_true_theta(&array![0.5]);
    test.administer(&mut e, &mut Pcg64::seed_from_u64(3)).unwrap();
    assert_eq!(e.num_items(), 12);
    assert!(e.theta_err().is_some());
    assert!(e.theta_outcome().is_some());
}

#[test]
fn live_administration_uses_the_response_source() {
    let mut test = Test::new("live", l2p_bank(20));
    test.register(PickRandom).unwrap();
    test.register(LiveAdminister::new(
        |_index: usize, item: &Item, _e: &Examinee| -> Result<u32> {
            let b = item
                .continuous()
                .ok_or(CatError::MissingState("continuous model"))?
                .param("Diff")?;
            Ok(u32::from(b < 0.0))
        },
    ))
    .unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(10)).unwrap();
    assert!(!test.is_simulation());

    let mut e = Examinee::new("live");
    test.administer(&mut e, &mut Pcg64::seed_from_u64(0)).unwrap();
    assert_eq!(e.num_items(), 10);
    for h in e.history() {
        let b = h.item.continuous().unwrap().param("Diff").unwrap();
        assert_eq!(h.response, u32::from(b < 0.0));
    }
    assert!(e.theta_hat().is_some());
}

#[test]
fn live_errors_propagate() {
    let mut test = Test::new("live", l2p_bank(5));
    test.register(PickRandom).unwrap();
    test.register(LiveAdminister::new(
        |_: usize, _: &Item, _: &Examinee| -> Result<u32> { Err(CatError::config("offline")) },
    ))
    .unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(2)).unwrap();

    let mut e = Examinee::new("e");
    let err = test.administer(&mut e, &mut Pcg64::seed_from_u64(0)).unwrap_err();
    assert!(matches!(err, CatError::Config(_)));
}

#[test]
fn extreme_patterns_are_scored_by_eap() {
    let mut test = Test::new("extreme", l2p_bank(20));
    test.register(PickRandom).unwrap();
    test.register(LiveAdminister::new(
        |_: usize, _: &Item, _: &Examinee| -> Result<u32> { Ok(1) },
    ))
    .unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(5)).unwrap();

    let mut e = Examinee::new("e");
    test.administer(&mut e, &mut Pcg64::seed_from_u64(0)).unwrap();
    assert!(matches!(
        e.theta_outcome(),
        Some(ThetaOutcome::Eap { .. })
    ));
    let theta = e.theta_hat().unwrap()[0];
    assert!(theta > 0.0 && theta.is_finite());
}

#[test]
fn nominal_items_can_be_administered() {
    let mut bank = ItemBank::new();
    for i in 0..15 {
        let mut m = Nominal::new(3, Dims::all(1).unwrap()).unwrap();
        m.set_param("Diff.1", -1.0 + 0.1 * i as f64).unwrap();
        m.set_param("Diff.2", 0.5 + 0.1 * i as f64).unwrap();
        m.set_param("Discr.2.1", 2.0).unwrap();
        bank.add_item(Item::with_continuous(m)).unwrap();
    }
    assert_eq!(bank.max_response(), 2);

    let mut test = Test::new("nominal", Arc::new(bank));
    test.register(SimulateTheta).unwrap();
    test.register(ClosestDifficulty::exact()).unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(fixed(10)).unwrap();

    let mut e = Examinee::new("e");
    e.set_true_theta(&array![0.0]);
    test.administer(&mut e, &mut Pcg64::seed_from_u64(8)).unwrap();
    assert_eq!(e.num_items(), 10);
    assert!(e.history().iter().all(|h| h.response <= 2));
}

fn dina_bank(num_attrs: usize, per_attr: usize) -> Arc<ItemBank> {
    let mut bank = ItemBank::new();
    for k in 0..num_attrs {
        for _ in 0..per_attr {
            let dims = Dims::new(num_attrs, vec![k]).unwrap();
            bank.add_item(Item::with_discrete(Dina::new(dims, 0.05, 0.05).unwrap()))
                .unwrap();
        }
    }
    Arc::new(bank)
}

#[test]
fn attribute_patterns_are_recovered() {
    let bank = dina_bank(3, 4);
    let length = bank.len();
    let mut test = Test::new("dina", bank);
    test.register(SimulateAlpha).unwrap();
    test.register(PickRandom).unwrap();
    test.register(EstimateAlpha::new()).unwrap();
    test.register(fixed(length)).unwrap();
    let rates = test.register(ClassRates::new(true)).unwrap();

    let mut rng = Pcg64::seed_from_u64(21);
    let mut people = uniform_alpha_examinees(300, 3, &mut rng).unwrap();
    administer_batch(&test, &mut people, 77).unwrap();

    let summary = rates.summary();
    assert_eq!(summary.num_examinees, 300);
    assert!(summary.pattern_rate > 0.85, "{summary:?}");
    assert!(summary.attribute_rates.iter().all(|&r| r > 0.9));
    let total: f64 = summary.misclassify_freq.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);

    let per_pattern: u64 = Attributes::all(3)
        .unwrap()
        .map(|p| rates.num_examinees_by_pattern(&p).unwrap())
        .sum();
    assert_eq!(per_pattern, 300);
}

#[test]
fn kl_selection_spreads_items_over_attributes() {
    let bank = dina_bank(3, 4);
    let mut test = Test::new("dina-kl", bank);
    test.register(SimulateAlpha).unwrap();
    test.register(
        MaxKlDiscr::new(MaxKlDiscrConfig {
            posterior: true,
            ..MaxKlDiscrConfig::default()
        })
        .unwrap(),
    )
    .unwrap();
    test.register(EstimateAlpha::new()).unwrap();
    test.register(fixed(6)).unwrap();
    let rates = test.register(ClassRates::new(false)).unwrap();

    let mut rng = Pcg64::seed_from_u64(5);
    let mut people = uniform_alpha_examinees(300, 3, &mut rng).unwrap();
    administer_batch(&test, &mut people, 13).unwrap();

    // items 4k..4k+4 measure attribute k
    for e in &people {
        let mut first: Vec<usize> = e.history()[..3].iter().map(|h| h.index / 4).collect();
        first.sort_unstable();
        assert_eq!(first, vec![0, 1, 2]);
    }
    let summary = rates.summary();
    assert!(summary.pattern_rate > 0.7, "{summary:?}");
}

#[test]
fn theta_estimation_needs_a_continuous_bank() {
    let mut test = Test::new("dina", dina_bank(2, 1));
    let err = test.register(EstimateTheta::default()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn mixed_items_feed_both_estimators() {
    let mut bank = ItemBank::new();
    for i in 0..8 {
        let b = -1.0 + 0.25 * i as f64;
        let cont: Arc<dyn ContinuousModel> = Arc::new(L1p::with_difficulty(b).unwrap());
        let disc: Arc<dyn DiscreteModel> = Arc::new(
            Dina::new(Dims::new(2, vec![i % 2]).unwrap(), 0.1, 0.1).unwrap(),
        );
        bank.add_item(Item::new("", Some(cont), Some(disc)).unwrap())
            .unwrap();
    }
    assert!(bank.is_continuous() && bank.is_discrete());

    let mut test = Test::new("mixed", Arc::new(bank));
    test.register(SimulateTheta).unwrap();
    test.register(PickRandom).unwrap();
    test.register(EstimateTheta::default()).unwrap();
    test.register(EstimateAlpha::new()).unwrap();
    test.register(fixed(6)).unwrap();

    let mut e = Examinee::new("e");
    e.set_true_theta(&array![0.0]);
    test.administer(&mut e, &mut Pcg64::seed_from_u64(4)).unwrap();
    assert!(e.theta_hat().is_some());
    assert_eq!(e.alpha_hat().map(|a| a.len()), Some(2));
}
