//! Error types for the adaptive testing engine.
//!
//! Configuration problems are raised eagerly (at registration or on entry to
//! [`Test::administer`](crate::Test::administer)), never in the middle of an
//! administration loop. Numerical non-convergence is its own variant so that
//! callers can tell an unreliable estimate from a converged one.

use thiserror::Error;

/// Errors produced by models, data structures, algorithms and the engine.
#[derive(Debug, Error)]
pub enum CatError {
    /// Missing algorithm category or an invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A TOML test configuration could not be parsed.
    #[error("could not parse test configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A vector, matrix or attribute pattern has the wrong size.
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A parameter, covariate or characteristic name lookup missed.
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// An index is outside the valid range of a collection.
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// An item was constructed without any response model.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// A response category outside `0..=max`.
    #[error("response {response} is outside 0..={max}")]
    InvalidResponse { response: u32, max: u32 },

    /// A selection algorithm picked an item the examinee has already seen.
    #[error("item {index} has already been administered to this examinee")]
    AlreadyAdministered { index: usize },

    /// Every item in the bank has been administered.
    #[error("no eligible items remain in the item bank")]
    BankExhausted,

    /// Every registered selection algorithm declined to choose an item.
    #[error("no selection algorithm produced an item")]
    NoSelection,

    /// State required by an algorithm has not been set on the examinee.
    #[error("examinee has no {0}")]
    MissingState(&'static str),

    /// Newton-Raphson iteration did not converge.
    #[error("estimation did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// A malformed attribute pattern.
    #[error("invalid attribute pattern: {0}")]
    InvalidPattern(String),
}

impl CatError {
    /// Returns `true` for errors that indicate a misconfigured test rather
    /// than a problem with a particular examinee.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CatError::Config(_) | CatError::ConfigParse(_))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CatError::Config(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CatError>;

/// Checks that a supplied length matches what a model or bank expects.
#[inline]
pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CatError::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}
