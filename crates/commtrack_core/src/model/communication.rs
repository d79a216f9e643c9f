//! Logged communication events.
//!
//! # Invariants
//! - Events are immutable once appended.
//! - `sequence` is assigned by storage and strictly increases with insertion
//!   order; it breaks ties between events on the same date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::company::CompanyId;

/// Stable identifier for one logged communication.
pub type CommunicationId = Uuid;

/// One interaction logged against one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationEvent {
    pub id: CommunicationId,
    pub company_id: CompanyId,
    /// Normalized method name.
    pub method: String,
    /// Calendar date of the interaction.
    pub date: NaiveDate,
    pub notes: String,
    /// Insertion order assigned by the store.
    pub sequence: i64,
}

/// Count of logged events for one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCount {
    pub method: String,
    pub count: u64,
}
