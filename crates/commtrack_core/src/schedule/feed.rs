//! Notification feed over all tracked companies.
//!
//! # Responsibility
//! - Run the engine for every company snapshot.
//! - Bucket results into overdue / due today / upcoming.
//! - Keep one broken cadence from blanking the whole feed.
//!
//! # Invariants
//! - Buckets are ordered by `next_due_date ASC, company_name ASC, company_id
//!   ASC`, whatever the worker count.
//! - A company that cannot be classified is counted and listed as an issue,
//!   never included in a bucket.

use super::engine::{classify, DueState, DueStatus};
use super::ConfigurationError;
use crate::model::cadence::{Cadence, CommunicationMethodRule};
use crate::model::communication::CommunicationEvent;
use crate::model::company::{Company, CompanyId};
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::time::Instant;

const MAX_DEFAULT_WORKERS: usize = 8;
/// Below this size classification stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 64;

/// Tuning for feed construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Upper bound on classification threads. `0` is treated as `1`.
    pub workers: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS);
        Self { workers }
    }
}

/// Everything the engine needs for one company, read from storage.
#[derive(Debug, Clone)]
pub struct CompanySnapshot {
    pub company: Company,
    /// Effective rules as stored; validated when classified.
    pub rules: Vec<CommunicationMethodRule>,
    /// Ordered oldest first.
    pub history: Vec<CommunicationEvent>,
}

impl CompanySnapshot {
    /// Validates the rules and runs the engine.
    pub fn classify(&self, today: NaiveDate) -> Result<DueStatus, ConfigurationError> {
        let cadence = Cadence::new(self.rules.clone())?;
        classify(&self.history, &cadence, self.company.anchor_date, today)
    }
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub company_id: CompanyId,
    pub company_name: String,
    /// `overdue`, `due today` or `upcoming`.
    pub kind: &'static str,
    pub next_method: String,
    pub next_due_date: NaiveDate,
    pub last_communication_date: Option<NaiveDate>,
    pub last_method: Option<String>,
    /// Signed days until due; negative when overdue.
    pub days_until_due: i64,
    pub message: String,
    pub cadence_fallback: bool,
}

impl CompanySummary {
    fn new(company: &Company, status: DueStatus, today: NaiveDate) -> Self {
        let days_until_due = status.days_until_due(today);
        Self {
            company_id: company.id,
            company_name: company.name.clone(),
            kind: status.state.label(),
            message: due_message(status.state, days_until_due),
            next_method: status.next_method,
            next_due_date: status.next_due_date,
            last_communication_date: status.last_communication_date,
            last_method: status.last_method,
            days_until_due,
            cadence_fallback: status.cadence_fallback,
        }
    }
}

/// A company left out of the feed because of its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationIssue {
    pub company_id: CompanyId,
    pub company_name: String,
    pub reason: String,
}

/// Dashboard notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub as_of: NaiveDate,
    pub overdue: Vec<CompanySummary>,
    pub due_today: Vec<CompanySummary>,
    pub upcoming: Vec<CompanySummary>,
    pub configuration_error_count: usize,
    pub configuration_issues: Vec<ConfigurationIssue>,
}

impl Feed {
    /// Overdue and due-today entries, the list the notification badge counts.
    pub fn notifications(&self) -> impl Iterator<Item = &CompanySummary> {
        self.overdue.iter().chain(self.due_today.iter())
    }
}

type Outcome = Result<CompanySummary, ConfigurationIssue>;

/// Builds the feed for `today` from pre-loaded snapshots.
pub fn build_feed(snapshots: &[CompanySnapshot], today: NaiveDate, options: &FeedOptions) -> Feed {
    let started_at = Instant::now();
    let workers = options.workers.max(1);

    let outcomes: Vec<Outcome> = if workers == 1 || snapshots.len() < PARALLEL_THRESHOLD {
        snapshots
            .iter()
            .map(|snapshot| classify_snapshot(snapshot, today))
            .collect()
    } else {
        classify_parallel(snapshots, today, workers)
    };

    let mut feed = Feed {
        as_of: today,
        overdue: Vec::new(),
        due_today: Vec::new(),
        upcoming: Vec::new(),
        configuration_error_count: 0,
        configuration_issues: Vec::new(),
    };

    for outcome in outcomes {
        match outcome {
            Ok(summary) => match summary.days_until_due {
                days if days < 0 => feed.overdue.push(summary),
                0 => feed.due_today.push(summary),
                _ => feed.upcoming.push(summary),
            },
            Err(issue) => {
                warn!(
                    "event=feed_company_skipped module=schedule status=error company_id={} reason={}",
                    issue.company_id, issue.reason
                );
                feed.configuration_issues.push(issue);
            }
        }
    }

    for bucket in [&mut feed.overdue, &mut feed.due_today, &mut feed.upcoming] {
        bucket.sort_by(|a, b| {
            a.next_due_date
                .cmp(&b.next_due_date)
                .then_with(|| a.company_name.cmp(&b.company_name))
                .then_with(|| a.company_id.cmp(&b.company_id))
        });
    }
    feed.configuration_issues.sort_by(|a, b| {
        a.company_name
            .cmp(&b.company_name)
            .then_with(|| a.company_id.cmp(&b.company_id))
    });
    feed.configuration_error_count = feed.configuration_issues.len();

    info!(
        "event=feed_build module=schedule status=ok companies={} overdue={} due_today={} upcoming={} config_errors={} workers={} duration_ms={}",
        snapshots.len(),
        feed.overdue.len(),
        feed.due_today.len(),
        feed.upcoming.len(),
        feed.configuration_error_count,
        workers,
        started_at.elapsed().as_millis()
    );
    feed
}

fn classify_snapshot(snapshot: &CompanySnapshot, today: NaiveDate) -> Outcome {
    snapshot
        .classify(today)
        .map(|status| CompanySummary::new(&snapshot.company, status, today))
        .map_err(|err| ConfigurationIssue {
            company_id: snapshot.company.id,
            company_name: snapshot.company.name.clone(),
            reason: err.to_string(),
        })
}

fn classify_parallel(snapshots: &[CompanySnapshot], today: NaiveDate, workers: usize) -> Vec<Outcome> {
    let chunk_size = snapshots.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = snapshots
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|snapshot| classify_snapshot(snapshot, today))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}

fn due_message(state: DueState, days_until_due: i64) -> String {
    match state {
        DueState::Overdue => format!("overdue by {}", day_count(-days_until_due)),
        DueState::DueToday => "due today".to_string(),
        DueState::OnTrack => format!("due in {}", day_count(days_until_due)),
    }
}

fn day_count(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

#[cfg(test)]
mod tests {
    use super::{build_feed, due_message, CompanySnapshot, FeedOptions};
    use crate::model::cadence::CommunicationMethodRule;
    use crate::model::communication::CommunicationEvent;
    use crate::model::company::Company;
    use crate::schedule::engine::DueState;
    use chrono::{Days, NaiveDate};
    use uuid::Uuid;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .expect("valid base date")
            .checked_add_days(Days::new(offset))
            .expect("valid offset")
    }

    fn default_rules() -> Vec<CommunicationMethodRule> {
        vec![
            CommunicationMethodRule::new("email", 1, 7),
            CommunicationMethodRule::new("call", 2, 3),
        ]
    }

    fn snapshot(name: &str, last_email_day: Option<u64>) -> CompanySnapshot {
        let company = Company::new(name, "default", day(0));
        let history = last_email_day
            .map(|offset| {
                vec![CommunicationEvent {
                    id: Uuid::new_v4(),
                    company_id: company.id,
                    method: "email".to_string(),
                    date: day(offset),
                    notes: String::new(),
                    sequence: 1,
                }]
            })
            .unwrap_or_default();
        CompanySnapshot {
            company,
            rules: default_rules(),
            history,
        }
    }

    #[test]
    fn buckets_and_orders_companies() {
        let snapshots = vec![
            snapshot("Zeta", Some(0)),
            snapshot("Alpha", Some(0)),
            snapshot("Beta", Some(2)),
            snapshot("Gamma", Some(6)),
        ];

        let feed = build_feed(&snapshots, day(5), &FeedOptions { workers: 1 });

        let overdue: Vec<_> = feed.overdue.iter().map(|s| s.company_name.as_str()).collect();
        assert_eq!(overdue, vec!["Alpha", "Zeta"]);
        assert_eq!(feed.overdue[0].message, "overdue by 2 days");
        assert_eq!(feed.overdue[0].kind, "overdue");

        let due_today: Vec<_> = feed.due_today.iter().map(|s| s.company_name.as_str()).collect();
        assert_eq!(due_today, vec!["Beta"]);
        assert_eq!(feed.due_today[0].message, "due today");

        assert_eq!(feed.upcoming.len(), 1);
        assert_eq!(feed.upcoming[0].message, "due in 4 days");
        assert_eq!(feed.notifications().count(), 3);
    }

    #[test]
    fn broken_cadence_is_counted_not_fatal() {
        let mut broken = snapshot("Broken", Some(0));
        broken.rules.clear();
        let snapshots = vec![broken, snapshot("Healthy", Some(0))];

        let feed = build_feed(&snapshots, day(1), &FeedOptions { workers: 1 });

        assert_eq!(feed.configuration_error_count, 1);
        assert_eq!(feed.configuration_issues[0].company_name, "Broken");
        assert_eq!(feed.upcoming.len(), 1);
        assert_eq!(feed.upcoming[0].company_name, "Healthy");
    }

    #[test]
    fn parallel_and_sequential_feeds_match() {
        let snapshots: Vec<_> = (0..200u64)
            .map(|index| snapshot(&format!("Company {:03}", index % 50), Some(index % 9)))
            .collect();

        let sequential = build_feed(&snapshots, day(6), &FeedOptions { workers: 1 });
        let parallel = build_feed(&snapshots, day(6), &FeedOptions { workers: 4 });

        assert_eq!(sequential, parallel);
        assert_eq!(
            sequential.overdue.len() + sequential.due_today.len() + sequential.upcoming.len(),
            200
        );
    }

    #[test]
    fn zero_workers_is_treated_as_one() {
        let snapshots = vec![snapshot("Solo", None)];
        let feed = build_feed(&snapshots, day(0), &FeedOptions { workers: 0 });
        assert_eq!(feed.due_today.len(), 1);
    }

    #[test]
    fn messages_use_singular_day() {
        assert_eq!(due_message(DueState::Overdue, -1), "overdue by 1 day");
        assert_eq!(due_message(DueState::OnTrack, 1), "due in 1 day");
    }
}
