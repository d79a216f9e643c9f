//! Per-company due-status classification.
//!
//! # Invariants
//! - With history: `next_due_date = last date + interval(next rule)`.
//! - Without history: `next_due_date = anchor`.
//! - `Overdue` iff `next_due_date < today`, `DueToday` iff equal.
//! - A last method missing from the cadence falls back to the first rule and
//!   sets `cadence_fallback`; it is never an error.

use super::ConfigurationError;
use crate::model::cadence::Cadence;
use crate::model::communication::CommunicationEvent;
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Classification bucket for one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    OnTrack,
    DueToday,
    Overdue,
}

impl DueState {
    /// Compares calendar dates only.
    pub fn from_dates(next_due_date: NaiveDate, today: NaiveDate) -> Self {
        if next_due_date < today {
            Self::Overdue
        } else if next_due_date == today {
            Self::DueToday
        } else {
            Self::OnTrack
        }
    }

    /// Label used by dashboard notification lists.
    pub fn label(self) -> &'static str {
        match self {
            Self::OnTrack => "upcoming",
            Self::DueToday => "due today",
            Self::Overdue => "overdue",
        }
    }
}

/// Derived schedule state for one company. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueStatus {
    pub last_communication_date: Option<NaiveDate>,
    pub last_method: Option<String>,
    pub next_due_date: NaiveDate,
    pub next_method: String,
    pub state: DueState,
    /// The last method was not part of the cadence; the first rule was used.
    pub cadence_fallback: bool,
}

impl DueStatus {
    /// Signed days from `today` to the due date. Negative when overdue.
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        self.next_due_date.signed_duration_since(today).num_days()
    }
}

/// Classifies one company.
///
/// `history` must belong to a single company and be ordered by date, then by
/// insertion order. `today` is supplied by the caller.
///
/// # Errors
/// - `ConfigurationError::EmptyCadence` when `cadence` has no rules.
/// - `ConfigurationError::DueDateOutOfRange` when date arithmetic overflows.
pub fn classify(
    history: &[CommunicationEvent],
    cadence: &Cadence,
    anchor: NaiveDate,
    today: NaiveDate,
) -> Result<DueStatus, ConfigurationError> {
    let first = cadence.get(0).ok_or(ConfigurationError::EmptyCadence)?;

    let Some(last) = history.last() else {
        return Ok(DueStatus {
            last_communication_date: None,
            last_method: None,
            next_due_date: anchor,
            next_method: first.method.clone(),
            state: DueState::from_dates(anchor, today),
            cadence_fallback: false,
        });
    };

    let (next_index, cadence_fallback) = match last_rule_position(history, cadence) {
        Some(index) => (cadence.next_index(index), false),
        None => (0, true),
    };
    let next_rule = cadence.get(next_index).unwrap_or(first);
    let next_due_date = last
        .date
        .checked_add_days(Days::new(u64::from(next_rule.interval_days)))
        .ok_or(ConfigurationError::DueDateOutOfRange)?;

    Ok(DueStatus {
        last_communication_date: Some(last.date),
        last_method: Some(last.method.clone()),
        next_due_date,
        next_method: next_rule.method.clone(),
        state: DueState::from_dates(next_due_date, today),
        cadence_fallback,
    })
}

/// Walks the history through the cadence and returns the rule index matched
/// by the last event, or `None` when its method is not in the cadence.
///
/// Each event is matched by scanning forward from the step expected after the
/// previous match, so a method used at several positions resolves to the one
/// the sequence has actually reached.
fn last_rule_position(history: &[CommunicationEvent], cadence: &Cadence) -> Option<usize> {
    let mut expected = 0;
    let mut matched = None;
    for event in history {
        matched = cadence.position_of(&event.method, expected);
        if let Some(index) = matched {
            expected = cadence.next_index(index);
        }
    }
    matched
}
