//! The administration engine.
//!
//! A [`Test`] pairs an item bank with registered algorithms and runs each
//! examinee through
//! `Idle → Selecting → Responding → Estimating → Recording → CheckingStop`,
//! looping back to `Selecting` until a stop criterion fires. Every pass adds
//! exactly one item to the examinee's history, so a stop criterion bounded by
//! item count always terminates the loop.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::algorithm::{Algorithm, Category, Slots};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::item::Item;
use crate::item_bank::ItemBank;

/// Where an administration currently is, with the data each step hands to
/// the next.
enum Phase {
    Idle,
    Selecting,
    Responding {
        index: usize,
        item: Arc<Item>,
    },
    Estimating {
        index: usize,
        item: Arc<Item>,
        response: u32,
    },
    Recording {
        index: usize,
        item: Arc<Item>,
        response: u32,
    },
    CheckingStop,
    Done,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Selecting => "selecting",
            Phase::Responding { .. } => "responding",
            Phase::Estimating { .. } => "estimating",
            Phase::Recording { .. } => "recording",
            Phase::CheckingStop => "checking-stop",
            Phase::Done => "done",
        }
    }
}

pub struct Test {
    name: String,
    bank: Arc<ItemBank>,
    slots: Slots,
    length_hint: usize,
}

impl Test {
    pub fn new(name: impl Into<String>, bank: Arc<ItemBank>) -> Self {
        Self {
            name: name.into(),
            bank,
            slots: Slots::default(),
            length_hint: 0,
        }
    }

    /// Expected number of items per examinee; only used to preallocate.
    pub fn with_length_hint(mut self, length_hint: usize) -> Self {
        self.length_hint = length_hint;
        self
    }

    pub fn set_length_hint(&mut self, length_hint: usize) {
        self.length_hint = length_hint;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank(&self) -> &Arc<ItemBank> {
        &self.bank
    }

    /// Number of algorithms registered in `category`.
    pub fn count(&self, category: Category) -> usize {
        self.slots.count(category)
    }

    /// Binds `alg` to this test's bank and appends it to its category.
    /// The returned handle shares state with the registered instance.
    pub fn register<A: Algorithm>(&mut self, mut alg: A) -> Result<Arc<A>> {
        alg.bind(&self.bank)?;
        let handle = Arc::new(alg);
        A::install(Arc::clone(&handle), &mut self.slots);
        tracing::debug!(
            test = %self.name,
            category = %A::CATEGORY,
            algorithm = std::any::type_name::<A>(),
            position = self.slots.count(A::CATEGORY),
            "registered algorithm"
        );
        Ok(handle)
    }

    /// Whether responses are simulated rather than supplied externally.
    pub fn is_simulation(&self) -> bool {
        !self.slots.simulate.is_empty()
    }

    fn check_configuration(&self) -> Result<()> {
        let required = [Category::Select, Category::Estimate, Category::Stop];
        for category in required {
            if self.slots.count(category) == 0 {
                return Err(CatError::config(format!(
                    "test {:?} has no {category} algorithm",
                    self.name
                )));
            }
        }
        match (self.slots.simulate.is_empty(), self.slots.administer.is_empty()) {
            (true, true) => Err(CatError::config(format!(
                "test {:?} has neither a simulate nor an administer algorithm",
                self.name
            ))),
            (false, false) => Err(CatError::config(format!(
                "test {:?} has both simulate and administer algorithms",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Runs one examinee through the test.
    ///
    /// Configuration problems are reported before anything is administered.
    /// The examinee's history is reset on entry.
    pub fn administer(&self, examinee: &mut Examinee, rng: &mut dyn RngCore) -> Result<()> {
        self.check_configuration()?;

        let mut phase = Phase::Idle;
        loop {
            tracing::trace!(test = %self.name, examinee = examinee.id(), phase = phase.name());
            phase = match phase {
                Phase::Idle => {
                    examinee.prep(self.length_hint);
                    for est in &self.slots.estimate {
                        est.initialize(&self.bank, examinee)?;
                    }
                    for rec in &self.slots.record {
                        rec.initialize(examinee);
                    }
                    Phase::Selecting
                }
                Phase::Selecting => {
                    let index = self.select(examinee, rng)?;
                    let item = Arc::clone(self.bank.get_item(index)?);
                    Phase::Responding { index, item }
                }
                Phase::Responding { index, item } => {
                    let response = self.respond(index, &item, examinee, rng)?;
                    tracing::debug!(
                        test = %self.name,
                        examinee = examinee.id(),
                        index,
                        item = item.id(),
                        response,
                        "administered item"
                    );
                    examinee.add_item(index, Arc::clone(&item), response);
                    Phase::Estimating {
                        index,
                        item,
                        response,
                    }
                }
                Phase::Estimating {
                    index,
                    item,
                    response,
                } => {
                    for est in &self.slots.estimate {
                        est.estimate(examinee)?;
                    }
                    Phase::Recording {
                        index,
                        item,
                        response,
                    }
                }
                Phase::Recording {
                    index,
                    item,
                    response,
                } => {
                    for rec in &self.slots.record {
                        rec.record(index, &item, response, examinee);
                    }
                    Phase::CheckingStop
                }
                Phase::CheckingStop => {
                    if self.slots.stop.iter().any(|s| s.should_stop(examinee)) {
                        Phase::Done
                    } else {
                        Phase::Selecting
                    }
                }
                Phase::Done => break,
            };
        }

        for rec in &self.slots.record {
            rec.finalize(examinee)?;
        }
        Ok(())
    }

    fn select(&self, examinee: &Examinee, rng: &mut dyn RngCore) -> Result<usize> {
        let len = self.bank.len();
        let administered = examinee.administered_mask(len);
        let eligible: Vec<usize> = (0..len).filter(|&i| !administered[i]).collect();
        if eligible.is_empty() {
            return Err(CatError::BankExhausted);
        }

        for selector in &self.slots.select {
            if let Some(index) = selector.select(&self.bank, examinee, &eligible, rng)? {
                if index >= len {
                    return Err(CatError::IndexOutOfRange { index, len });
                }
                if administered[index] {
                    return Err(CatError::AlreadyAdministered { index });
                }
                return Ok(index);
            }
        }
        Err(CatError::NoSelection)
    }

    fn respond(
        &self,
        index: usize,
        item: &Item,
        examinee: &Examinee,
        rng: &mut dyn RngCore,
    ) -> Result<u32> {
        let responders = if self.is_simulation() {
            &self.slots.simulate
        } else {
            &self.slots.administer
        };
        for responder in responders {
            if let Some(response) = responder.respond(index, item, examinee, rng)? {
                let max = item.max_response();
                if response > max {
                    return Err(CatError::InvalidResponse { response, max });
                }
                return Ok(response);
            }
        }
        Err(CatError::config(format!(
            "no responder can answer item {:?}",
            item.id()
        )))
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("items", &self.bank.len())
            .field("slots", &self.slots)
            .field("length_hint", &self.length_hint)
            .finish()
    }
}
