//! Declarative test configuration.
//!
//! ```toml
//! name = "closest-5"
//! length = 30
//! exposure = true
//!
//! [selection]
//! kind = "closest-difficulty"
//! num = 5
//!
//! [estimation]
//! max_iter = 20
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::administration::Test;
use crate::algorithm::{
    ClosestDifficulty, ClosestDifficultyConfig, EstimateAlpha, EstimateTheta,
    EstimateThetaConfig, ExposureCounter, FixedLength, FixedLengthConfig, MaxFisher,
    MaxFisherConfig, MaxKlDiscr, MaxKlDiscrConfig, MaxKlIrt, MaxKlIrtConfig, PickRandom,
    SimulateAlpha, SimulateTheta,
};
use crate::error::{CatError, Result};
use crate::item_bank::ItemBank;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SelectionConfig {
    #[default]
    Random,
    ClosestDifficulty(ClosestDifficultyConfig),
    MaxFisher(MaxFisherConfig),
    MaxKlIrt(MaxKlIrtConfig),
    MaxKlDiscr(MaxKlDiscrConfig),
}

/// A simulation test: one selection strategy, estimation of whichever
/// latent state the bank's models measure, fixed-length stopping and
/// optional exposure tracking.
///
/// Theta is simulated and estimated when the bank has continuous models and
/// the attribute pattern when it has discrete ones. A bank with both gets
/// attribute estimation only when `estimate_alpha` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub name: String,
    pub length: usize,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub estimation: EstimateThetaConfig,
    #[serde(default)]
    pub estimate_alpha: bool,
    #[serde(default)]
    pub exposure: bool,
}

/// A configured test and, when exposure tracking was requested, the
/// counter's handle.
#[derive(Debug)]
pub struct BuiltTest {
    pub test: Test,
    pub exposure: Option<Arc<ExposureCounter>>,
}

impl TestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: TestConfig = toml::from_str(s)?;
        Ok(config)
    }

    /// Several tests from `[[test]]` tables.
    pub fn many_from_toml_str(s: &str) -> Result<Vec<Self>> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Suite {
            test: Vec<TestConfig>,
        }
        let suite: Suite = toml::from_str(s)?;
        Ok(suite.test)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CatError::config(e.to_string()))
    }

    /// Registers the configured algorithms on a new test over `bank`.
    pub fn build(&self, bank: Arc<ItemBank>) -> Result<BuiltTest> {
        let theta = bank.num_dims().is_some();
        let alpha = bank.num_attrs().is_some() && (self.estimate_alpha || !theta);
        if !theta && !alpha {
            return Err(CatError::config(format!(
                "test {:?} needs a bank with item models",
                self.name
            )));
        }
        let mut test = Test::new(self.name.clone(), bank).with_length_hint(self.length);

        if theta {
            test.register(SimulateTheta)?;
        }
        if alpha {
            test.register(SimulateAlpha)?;
        }

        match &self.selection {
            SelectionConfig::Random => {
                test.register(PickRandom)?;
            }
            SelectionConfig::ClosestDifficulty(c) => {
                test.register(ClosestDifficulty::new(*c)?)?;
            }
            SelectionConfig::MaxFisher(c) => {
                test.register(MaxFisher::new(*c)?)?;
            }
            SelectionConfig::MaxKlIrt(c) => {
                test.register(MaxKlIrt::new(c.clone())?)?;
            }
            SelectionConfig::MaxKlDiscr(c) => {
                test.register(MaxKlDiscr::new(c.clone())?)?;
            }
        }

        if theta {
            test.register(EstimateTheta::new(self.estimation.clone())?)?;
        }
        if alpha {
            test.register(EstimateAlpha::new())?;
        }

        test.register(FixedLength::new(FixedLengthConfig {
            length: self.length,
        })?)?;

        let exposure = if self.exposure {
            Some(test.register(ExposureCounter::new())?)
        } else {
            None
        };

        Ok(BuiltTest { test, exposure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Category, FisherCriterion, KlRegion};
    use crate::attributes::Attributes;
    use crate::examinee::Examinee;
    use crate::item::Item;
    use crate::model::{ContinuousModel, Dims, Dina, DiscreteModel, L1p};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn bank() -> Arc<ItemBank> {
        let mut bank = ItemBank::new();
        for b in [-1.0, 0.0, 1.0] {
            bank.add_item(Item::with_continuous(L1p::with_difficulty(b).unwrap()))
                .unwrap();
        }
        Arc::new(bank)
    }

    #[test]
    fn parses_documented_example() {
        let c = TestConfig::from_toml_str(
            r#"
            name = "closest-5"
            length = 30
            exposure = true

            [selection]
            kind = "closest-difficulty"
            num = 5

            [estimation]
            max_iter = 20
            "#,
        )
        .unwrap();
        assert_eq!(
            c.selection,
            SelectionConfig::ClosestDifficulty(ClosestDifficultyConfig { num: 5 })
        );
        assert_eq!(c.estimation.max_iter, 20);
        assert_eq!(c.estimation.quadrature_points, 41);
        assert!(c.exposure);
    }

    #[test]
    fn defaults_to_random_selection() {
        let c = TestConfig::from_toml_str("name = \"r\"\nlength = 2").unwrap();
        assert_eq!(c.selection, SelectionConfig::Random);
        assert!(!c.exposure);
        let built = c.build(bank()).unwrap();
        assert!(built.exposure.is_none());
        assert_eq!(built.test.count(Category::Select), 1);
        assert_eq!(built.test.count(Category::Record), 0);
    }

    #[test]
    fn builds_every_category() {
        let c = TestConfig {
            name: "fisher".into(),
            length: 2,
            selection: SelectionConfig::MaxFisher(MaxFisherConfig {
                num: 1,
                criterion: FisherCriterion::AOptimal,
            }),
            estimation: EstimateThetaConfig::default(),
            estimate_alpha: false,
            exposure: true,
        };
        let built = c.build(bank()).unwrap();
        assert!(built.exposure.is_some());
        for category in [
            Category::Simulate,
            Category::Select,
            Category::Estimate,
            Category::Stop,
            Category::Record,
        ] {
            assert_eq!(built.test.count(category), 1, "{category}");
        }
        let text = c.to_toml_string().unwrap();
        assert_eq!(TestConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let zero_length = TestConfig::from_toml_str("name = \"z\"\nlength = 0").unwrap();
        assert!(zero_length.build(bank()).unwrap_err().is_configuration());

        let err = TestConfig::from_toml_str("name = \"x\"\nlength = 3\ncolour = \"red\"")
            .unwrap_err();
        assert!(matches!(err, CatError::ConfigParse(_)));

        let err = TestConfig::from_toml_str(
            "name = \"x\"\nlength = 3\n[selection]\nkind = \"closest-difficulty\"\nnum = 0",
        )
        .unwrap()
        .build(bank())
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn reads_a_suite() {
        let suite = TestConfig::many_from_toml_str(
            r#"
            [[test]]
            name = "random"
            length = 30

            [[test]]
            name = "closest"
            length = 30
            selection = { kind = "closest-difficulty" }
            "#,
        )
        .unwrap();
        assert_eq!(suite.len(), 2);
        assert_eq!(
            suite[1].selection,
            SelectionConfig::ClosestDifficulty(ClosestDifficultyConfig::default())
        );
    }

    fn dina_bank() -> Arc<ItemBank> {
        let mut bank = ItemBank::new();
        for k in [0, 1, 0, 1] {
            let dims = Dims::new(2, vec![k]).unwrap();
            bank.add_item(Item::with_discrete(Dina::new(dims, 0.1, 0.1).unwrap()))
                .unwrap();
        }
        Arc::new(bank)
    }

    #[test]
    fn discrete_banks_estimate_attributes_only() {
        for text in [
            "name = \"cd\"\nlength = 2\nestimate_alpha = true",
            "name = \"cd\"\nlength = 2\n[selection]\nkind = \"max-kl-discr\"\nposterior = true",
        ] {
            let built = TestConfig::from_toml_str(text)
                .unwrap()
                .build(dina_bank())
                .unwrap();
            assert_eq!(built.test.count(Category::Simulate), 1, "{text}");
            assert_eq!(built.test.count(Category::Estimate), 1, "{text}");

            let mut e = Examinee::new("e");
            e.set_true_alpha(&Attributes::from_int(2, 3).unwrap());
            built
                .test
                .administer(&mut e, &mut Pcg64::seed_from_u64(1))
                .unwrap();
            assert_eq!(e.num_items(), 2);
            assert!(e.theta_hat().is_none());
            assert_eq!(e.alpha_hat().map(|a| a.len()), Some(2));
        }
    }

    #[test]
    fn mixed_banks_estimate_attributes_on_request() {
        let mut bank = ItemBank::new();
        for i in 0..4 {
            let cont: Arc<dyn ContinuousModel> =
                Arc::new(L1p::with_difficulty(i as f64 - 1.5).unwrap());
            let disc: Arc<dyn DiscreteModel> =
                Arc::new(Dina::new(Dims::new(2, vec![i % 2]).unwrap(), 0.1, 0.1).unwrap());
            bank.add_item(Item::new("", Some(cont), Some(disc)).unwrap())
                .unwrap();
        }
        let bank = Arc::new(bank);

        let mut c = TestConfig::from_toml_str("name = \"mixed\"\nlength = 3").unwrap();
        let built = c.build(Arc::clone(&bank)).unwrap();
        assert_eq!(built.test.count(Category::Simulate), 1);
        assert_eq!(built.test.count(Category::Estimate), 1);

        c.estimate_alpha = true;
        let built = c.build(bank).unwrap();
        assert_eq!(built.test.count(Category::Simulate), 2);
        assert_eq!(built.test.count(Category::Estimate), 2);
        let mut e = Examinee::new("e");
        e.set_true_theta(&array![0.0]);
        e.set_true_alpha(&Attributes::from_int(2, 1).unwrap());
        built
            .test
            .administer(&mut e, &mut Pcg64::seed_from_u64(2))
            .unwrap();
        assert!(e.theta_hat().is_some());
        assert!(e.alpha_hat().is_some());
    }

    #[test]
    fn selects_by_kl_divergence() {
        let c = TestConfig::from_toml_str(
            r#"
            name = "kl"
            length = 2
            [selection]
            kind = "max-kl-irt"
            region = "ellipse"
            c = 2.0
            "#,
        )
        .unwrap();
        let SelectionConfig::MaxKlIrt(kl) = &c.selection else {
            panic!("{:?}", c.selection);
        };
        assert_eq!(kl.region, KlRegion::Ellipse);
        assert_eq!(kl.c, 2.0);
        let built = c.build(bank()).unwrap();
        assert_eq!(built.test.count(Category::Select), 1);

        let discrete = TestConfig::from_toml_str(
            "name = \"kl\"\nlength = 2\n[selection]\nkind = \"max-kl-discr\"",
        )
        .unwrap();
        assert!(discrete.build(bank()).unwrap_err().is_configuration());
        assert!(c.build(Arc::new(ItemBank::new())).unwrap_err().is_configuration());
    }
}
