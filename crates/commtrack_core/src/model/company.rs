//! Company master-data record.
//!
//! # Responsibility
//! - Carry the fields the engine reads: identity, name, category, anchor.
//! - Validate names before they reach storage.
//!
//! # Invariants
//! - `id` is stable and never reused for another company.
//! - `anchor_date` is the due date used while no communication is logged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a tracked company.
pub type CompanyId = Uuid;

/// Tracked company as seen by the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    /// Display name shown in feed entries.
    pub name: String,
    /// Category key used to pick the default cadence.
    pub category: String,
    /// Due date for the first communication. Usually the onboarding date.
    pub anchor_date: NaiveDate,
    /// Inactive companies are kept for history but left out of the feed.
    pub is_active: bool,
}

/// Validation failures for company fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyValidationError {
    EmptyName,
    EmptyCategory,
}

impl Display for CompanyValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "company name cannot be empty"),
            Self::EmptyCategory => write!(f, "company category cannot be empty"),
        }
    }
}

impl Error for CompanyValidationError {}

impl Company {
    /// Creates an active company with a generated ID.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        anchor_date: NaiveDate,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), name, category, anchor_date)
    }

    /// Creates an active company with a caller-provided ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: CompanyId,
        name: impl Into<String>,
        category: impl Into<String>,
        anchor_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            category: normalize_category(&category.into()),
            anchor_date,
            is_active: true,
        }
    }

    /// Checks required fields.
    pub fn validate(&self) -> Result<(), CompanyValidationError> {
        if self.name.trim().is_empty() {
            return Err(CompanyValidationError::EmptyName);
        }
        if self.category.trim().is_empty() {
            return Err(CompanyValidationError::EmptyCategory);
        }
        Ok(())
    }
}

/// Normalizes a category key to its stored form.
pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_lowercase()
}
