//! Due-status engine and notification feed.
//!
//! # Responsibility
//! - Classify one company from its history, cadence, anchor and `today`.
//! - Fan classification out over all companies and bucket the results.
//!
//! # Invariants
//! - Nothing in this module reads a clock, touches storage or mutates input.
//! - Identical inputs always produce identical output, including ordering.

pub mod engine;
pub mod feed;

use crate::model::cadence::CadenceValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// A company whose cadence cannot drive the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Neither the company nor its category has rules.
    EmptyCadence,
    /// Stored rules do not form a valid cadence.
    InvalidCadence(CadenceValidationError),
    /// The computed due date falls outside the supported calendar.
    DueDateOutOfRange,
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCadence => write!(f, "no cadence rules configured"),
            Self::InvalidCadence(err) => write!(f, "invalid cadence: {err}"),
            Self::DueDateOutOfRange => write!(f, "next due date is out of range"),
        }
    }
}

impl Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCadence(err) => Some(err),
            Self::EmptyCadence | Self::DueDateOutOfRange => None,
        }
    }
}

impl From<CadenceValidationError> for ConfigurationError {
    fn from(value: CadenceValidationError) -> Self {
        Self::InvalidCadence(value)
    }
}
