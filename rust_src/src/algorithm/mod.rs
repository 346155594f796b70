//! Algorithm plug-ins and the capability traits a [`Test`](crate::Test)
//! drives.
//!
//! Every algorithm belongs to exactly one [`Category`]. Registration calls
//! [`Algorithm::bind`] with the test's item bank (to validate and size any
//! per-item state) and then [`Algorithm::install`] to place the shared
//! handle into the matching slot list. Within a category, algorithms run in
//! registration order.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::error::Result;
use crate::examinee::Examinee;
use crate::item::Item;
use crate::item_bank::ItemBank;

pub mod chooser;
pub mod class_rates;
pub mod closest_difficulty;
pub mod estimate_alpha;
pub mod estimate_theta;
pub mod exposure;
pub mod fixed_length;
pub mod live;
pub mod max_fisher;
pub mod max_kl_discr;
pub mod max_kl_irt;
pub mod pick_random;
pub mod simulate;

pub use class_rates::{ClassRates, ClassRatesSummary};
pub use closest_difficulty::{ClosestDifficulty, ClosestDifficultyConfig};
pub use estimate_alpha::{estimate_alpha_mle, EstimateAlpha};
pub use estimate_theta::{
    estimate_theta_eap, estimate_theta_mle, EstimateTheta, EstimateThetaConfig, NormalPrior, Prior,
};
pub use exposure::ExposureCounter;
pub use fixed_length::{FixedLength, FixedLengthConfig};
pub use live::{LiveAdminister, ResponseSource};
pub use max_fisher::{FisherCriterion, MaxFisher, MaxFisherConfig};
pub use max_kl_discr::{MaxKlDiscr, MaxKlDiscrConfig};
pub use max_kl_irt::{KlRegion, MaxKlIrt, MaxKlIrtConfig};
pub use pick_random::PickRandom;
pub use simulate::{SimulateAlpha, SimulateTheta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Draws responses from the examinee's true latent state.
    Simulate,
    /// Chooses the next item.
    Select,
    /// Obtains responses from outside the engine.
    Administer,
    /// Updates the latent estimate from the history.
    Estimate,
    /// Decides when to end the test.
    Stop,
    /// Observes administered items (exposure, classification tallies).
    Record,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Simulate => "simulate",
            Category::Select => "select",
            Category::Administer => "administer",
            Category::Estimate => "estimate",
            Category::Stop => "stop",
            Category::Record => "record",
        };
        f.write_str(name)
    }
}

/// Picks the next item.
pub trait Selector: Send + Sync {
    /// `eligible` lists the bank indices not yet administered, in bank order,
    /// and is never empty. Returning `None` defers to the next selector.
    fn select(
        &self,
        bank: &ItemBank,
        examinee: &Examinee,
        eligible: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<Option<usize>>;
}

/// Produces a response for an item. Simulation responders return `None` for
/// items they cannot answer (e.g. no discrete model).
pub trait Responder: Send + Sync {
    fn respond(
        &self,
        index: usize,
        item: &Item,
        examinee: &Examinee,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u32>>;
}

/// Re-derives an estimate from the examinee's full history.
pub trait Estimator: Send + Sync {
    /// Called once before the first item.
    fn initialize(&self, _bank: &ItemBank, _examinee: &mut Examinee) -> Result<()> {
        Ok(())
    }

    fn estimate(&self, examinee: &mut Examinee) -> Result<()>;
}

pub trait StopCriterion: Send + Sync {
    fn should_stop(&self, examinee: &Examinee) -> bool;
}

/// Observes each administered item.
pub trait Recorder: Send + Sync {
    fn initialize(&self, _examinee: &Examinee) {}

    fn record(&self, index: usize, item: &Item, response: u32, examinee: &Examinee);

    /// Called once after the last item.
    fn finalize(&self, _examinee: &Examinee) -> Result<()> {
        Ok(())
    }
}

/// Per-category lists of installed algorithms.
#[derive(Default)]
pub struct Slots {
    pub(crate) simulate: Vec<Arc<dyn Responder>>,
    pub(crate) select: Vec<Arc<dyn Selector>>,
    pub(crate) administer: Vec<Arc<dyn Responder>>,
    pub(crate) estimate: Vec<Arc<dyn Estimator>>,
    pub(crate) stop: Vec<Arc<dyn StopCriterion>>,
    pub(crate) record: Vec<Arc<dyn Recorder>>,
}

impl Slots {
    pub fn add_simulator(&mut self, alg: Arc<dyn Responder>) {
        self.simulate.push(alg);
    }

    pub fn add_selector(&mut self, alg: Arc<dyn Selector>) {
        self.select.push(alg);
    }

    pub fn add_administrator(&mut self, alg: Arc<dyn Responder>) {
        self.administer.push(alg);
    }

    pub fn add_estimator(&mut self, alg: Arc<dyn Estimator>) {
        self.estimate.push(alg);
    }

    pub fn add_stop(&mut self, alg: Arc<dyn StopCriterion>) {
        self.stop.push(alg);
    }

    pub fn add_recorder(&mut self, alg: Arc<dyn Recorder>) {
        self.record.push(alg);
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Simulate => self.simulate.len(),
            Category::Select => self.select.len(),
            Category::Administer => self.administer.len(),
            Category::Estimate => self.estimate.len(),
            Category::Stop => self.stop.len(),
            Category::Record => self.record.len(),
        }
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("simulate", &self.simulate.len())
            .field("select", &self.select.len())
            .field("administer", &self.administer.len())
            .field("estimate", &self.estimate.len())
            .field("stop", &self.stop.len())
            .field("record", &self.record.len())
            .finish()
    }
}

/// Registration glue implemented by every concrete algorithm.
pub trait Algorithm: Send + Sync + Sized + 'static {
    const CATEGORY: Category;

    /// Validates against, or sizes per-item state for, the test's bank.
    fn bind(&mut self, _bank: &ItemBank) -> Result<()> {
        Ok(())
    }

    fn install(this: Arc<Self>, slots: &mut Slots);
}
