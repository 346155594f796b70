//! Computerized adaptive testing engine.
//!
//! A [`Test`] administers items from an [`ItemBank`] to an [`Examinee`],
//! driven by plug-in algorithms registered per category:
//! - selection (random, closest difficulty, maximum Fisher information,
//!   Kullback-Leibler divergence for theta or attribute patterns)
//! - simulated or live responses
//! - ability estimation (Newton-Raphson MLE with an EAP fallback) and
//!   attribute-pattern estimation for cognitive diagnosis models
//! - stopping rules
//! - recorders for item exposure and classification accuracy
//!
//! Items carry a continuous IRT model (1PL, 2PL, 3PL, nominal) and/or a
//! discrete cognitive diagnosis model (DINA, NIDA) with analytic
//! derivatives and Fisher information.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rand::SeedableRng;
//! use rand_pcg::Pcg64;
//! use mirt_cat::config::TestConfig;
//! use mirt_cat::simulation::{administer_batch, normal_examinees, rasch_bank};
//!
//! # fn main() -> mirt_cat::Result<()> {
//! let mut rng = Pcg64::seed_from_u64(7);
//! let bank = Arc::new(rasch_bank(400, 0.0, 1.0, &mut rng)?);
//! let config = TestConfig::from_toml_str(
//!     "name = \"closest\"\nlength = 30\nexposure = true\n[selection]\nkind = \"closest-difficulty\"",
//! )?;
//! let built = config.build(bank)?;
//! let mut examinees = normal_examinees(1000, 1, &mut rng);
//! administer_batch(&built.test, &mut examinees, 11)?;
//! # Ok(())
//! # }
//! ```

pub mod administration;
pub mod algorithm;
pub mod attributes;
pub mod characteristic;
pub mod config;
pub mod covariates;
pub mod error;
pub mod examinee;
pub mod item;
pub mod item_bank;
pub mod linalg;
pub mod model;
pub mod simulation;
pub mod utils;

pub use administration::Test;
pub use algorithm::{Algorithm, Category};
pub use attributes::Attributes;
pub use characteristic::{Characteristic, CharacteristicRegistry};
pub use covariates::Covariates;
pub use error::{CatError, Result};
pub use examinee::{Administered, EapReason, Examinee, ThetaOutcome};
pub use item::Item;
pub use item_bank::ItemBank;
pub use model::{ContinuousModel, Dims, DiscreteModel, ParamSet};
