//! Cadence rules: the ordered, cyclic communication plan for a company.
//!
//! # Responsibility
//! - Define one method/interval step and the ordered sequence of steps.
//! - Answer "which rule comes after this one" without cyclic references.
//!
//! # Invariants
//! - Rules inside a `Cadence` are sorted by `sequence` and positions are unique.
//! - Every rule has a non-empty normalized method and `interval_days >= 1`.
//! - The rule after the last one is the first one (index modulo length).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

use super::company::{normalize_category, CompanyId};

/// One step of a cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationMethodRule {
    /// Normalized method name, e.g. `email` or `call`.
    pub method: String,
    /// Position within the cadence. Lower runs first.
    pub sequence: u32,
    /// Days after the previous communication before this step is due.
    pub interval_days: u32,
}

impl CommunicationMethodRule {
    pub fn new(method: &str, sequence: u32, interval_days: u32) -> Self {
        Self {
            method: normalize_method(method),
            sequence,
            interval_days,
        }
    }

    pub fn validate(&self) -> Result<(), CadenceValidationError> {
        if self.method.is_empty() {
            return Err(CadenceValidationError::EmptyMethod {
                sequence: self.sequence,
            });
        }
        if self.interval_days == 0 {
            return Err(CadenceValidationError::ZeroInterval {
                method: self.method.clone(),
            });
        }
        Ok(())
    }
}

/// Rejected cadence definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CadenceValidationError {
    EmptyMethod { sequence: u32 },
    ZeroInterval { method: String },
    DuplicateSequence(u32),
}

impl Display for CadenceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMethod { sequence } => {
                write!(f, "cadence rule at position {sequence} has an empty method")
            }
            Self::ZeroInterval { method } => {
                write!(f, "cadence rule `{method}` must have interval_days >= 1")
            }
            Self::DuplicateSequence(sequence) => {
                write!(f, "cadence position {sequence} is used more than once")
            }
        }
    }
}

impl Error for CadenceValidationError {}

/// Where a set of cadence rules applies.
///
/// Company rules take precedence over the rules of the company's category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CadenceScope {
    Company(CompanyId),
    Category(String),
}

impl CadenceScope {
    /// Builds a category scope with a normalized key.
    pub fn category(raw: &str) -> Self {
        Self::Category(normalize_category(raw))
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            Self::Company(_) => "company",
            Self::Category(_) => "category",
        }
    }

    pub(crate) fn key(&self) -> String {
        match self {
            Self::Company(id) => id.to_string(),
            Self::Category(name) => name.clone(),
        }
    }
}

/// Validated, ordered cadence.
///
/// An empty cadence is representable so that stores can hand back "nothing
/// configured"; the engine reports it as a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cadence {
    rules: Vec<CommunicationMethodRule>,
}

impl Cadence {
    /// Validates each rule and orders them by `sequence`.
    pub fn new(mut rules: Vec<CommunicationMethodRule>) -> Result<Self, CadenceValidationError> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.sequence) {
                return Err(CadenceValidationError::DuplicateSequence(rule.sequence));
            }
        }
        rules.sort_by_key(|rule| rule.sequence);
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CommunicationMethodRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CommunicationMethodRule> {
        self.rules.get(index)
    }

    /// Index of the step that follows `index`, wrapping to the start.
    ///
    /// Returns 0 for an empty cadence; callers check emptiness first.
    pub fn next_index(&self, index: usize) -> usize {
        if self.rules.is_empty() {
            return 0;
        }
        (index + 1) % self.rules.len()
    }

    /// Finds the first rule for `method`, scanning cyclically from `start`.
    pub fn position_of(&self, method: &str, start: usize) -> Option<usize> {
        let len = self.rules.len();
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&index| self.rules[index].method == method)
    }
}

/// Normalizes a method name for storage and comparison.
pub fn normalize_method(raw: &str) -> String {
    raw.trim().to_lowercase()
}
