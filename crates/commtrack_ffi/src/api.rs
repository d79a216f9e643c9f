//! FFI use-case API for dashboard-facing calls.
//!
//! # Responsibility
//! - Expose the notification feed query and the log-communication command.
//! - Parse wire input (ISO dates, UUID strings) into typed core requests.
//! - Keep error semantics simple: envelopes with `ok` + message, plus the
//!   offending field for rejected input.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - "Today" is read from the local clock here, never inside core.
//! - Structured payloads are returned as camelCase JSON strings.

use chrono::{Local, NaiveDate};
use commtrack_core::db::open_db;
use commtrack_core::service::communication_service::{FIELD_COMPANY_IDS, FIELD_DATE};
use commtrack_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CadenceRepository, CommunicationService, CommunicationServiceError, CompanyId,
    DueStatusService, FeedOptions,
    LogCommunicationRequest, SqliteCadenceRepository, SqliteCommunicationRepository,
    SqliteCompanyRepository,
};
use log::error;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "commtrack.sqlite3";
const DB_PATH_ENV: &str = "COMMTRACK_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Response envelope for the notification feed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    pub ok: bool,
    /// `{asOf, overdue, dueToday, upcoming, configurationErrorCount,
    /// configurationIssues}` on success.
    pub feed_json: Option<String>,
    /// Overdue plus due-today companies, shown on the notification badge.
    pub notification_count: u32,
    /// Human-readable summary or failure reason.
    pub message: String,
}

impl FeedResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            feed_json: None,
            notification_count: 0,
            message: message.into(),
        }
    }
}

/// Response envelope for the log-communication command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCommunicationResponse {
    pub ok: bool,
    /// Created communication IDs, one per distinct company.
    pub event_ids: Vec<String>,
    /// Rejected input field (`companyIds|method|date`), when validation failed.
    pub error_field: Option<String>,
    pub message: String,
}

impl LogCommunicationResponse {
    fn rejected(field: &str, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            event_ids: Vec::new(),
            error_field: Some(field.to_string()),
            message: reason.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            event_ids: Vec::new(),
            error_field: None,
            message: message.into(),
        }
    }
}

/// Response envelope for the method picker of the log dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodsResponse {
    pub ok: bool,
    /// Distinct methods used by any cadence rule, sorted.
    pub methods: Vec<String>,
    pub message: String,
}

/// Response envelope for history reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryResponse {
    pub ok: bool,
    /// JSON array of communications on success.
    pub items_json: Option<String>,
    pub message: String,
}

/// Builds the notification feed.
///
/// `as_of` is an ISO date (`YYYY-MM-DD`); `None` uses the local calendar date.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_query(as_of: Option<String>) -> FeedResponse {
    let today = match resolve_as_of(as_of.as_deref()) {
        Ok(today) => today,
        Err(reason) => return FeedResponse::failure(reason),
    };

    let result = with_connection(|conn| {
        let service = DueStatusService::new(
            SqliteCompanyRepository::new(conn),
            SqliteCadenceRepository::new(conn),
            SqliteCommunicationRepository::new(conn),
        );
        let feed = service
            .build_feed(today, &FeedOptions::default())
            .map_err(|err| err.to_string())?;
        let message = format!(
            "{} overdue, {} due today, {} upcoming.",
            feed.overdue.len(),
            feed.due_today.len(),
            feed.upcoming.len()
        );
        let badge = u32::try_from(feed.notifications().count()).unwrap_or(u32::MAX);
        serde_json::to_string(&feed)
            .map(|json| (json, badge, message))
            .map_err(|err| format!("feed serialization failed: {err}"))
    });

    match result {
        Ok((json, notification_count, message)) => FeedResponse {
            ok: true,
            feed_json: Some(json),
            notification_count,
            message,
        },
        Err(err) => {
            error!("event=ffi_feed_query module=ffi status=error error={err}");
            FeedResponse::failure(format!("feed_query failed: {err}"))
        }
    }
}

/// Logs one communication against one or more companies.
///
/// Input semantics:
/// - `company_ids`: company UUID strings; duplicates are collapsed.
/// - `date`: ISO date, must not be after the local calendar date.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - All-or-nothing: on any failure no company history changes.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn log_communication(
    company_ids: Vec<String>,
    method: String,
    date: String,
    notes: String,
) -> LogCommunicationResponse {
    let company_ids = match parse_company_ids(&company_ids) {
        Ok(ids) => ids,
        Err(reason) => return LogCommunicationResponse::rejected(FIELD_COMPANY_IDS, reason),
    };
    let date = match parse_date(&date) {
        Ok(date) => date,
        Err(reason) => return LogCommunicationResponse::rejected(FIELD_DATE, reason),
    };
    let request = LogCommunicationRequest {
        company_ids,
        method,
        date,
        notes,
    };
    let today = Local::now().date_naive();

    let result = with_connection(|conn| {
        Ok(communication_service(conn).log_communication(&request, today))
    });

    match result {
        Ok(Ok(events)) => LogCommunicationResponse {
            ok: true,
            message: format!("Logged communication for {} company(ies).", events.len()),
            event_ids: events.iter().map(|event| event.id.to_string()).collect(),
            error_field: None,
        },
        Ok(Err(CommunicationServiceError::Validation(err))) => {
            LogCommunicationResponse::rejected(err.field, err.reason)
        }
        Ok(Err(err)) => {
            LogCommunicationResponse::failure(format!("log_communication failed: {err}"))
        }
        Err(err) => LogCommunicationResponse::failure(format!("log_communication failed: {err}")),
    }
}

/// Returns the latest communications of one company, newest first.
///
/// `limit` defaults to 5 and is clamped to 50.
#[flutter_rust_bridge::frb(sync)]
pub fn recent_communications(company_id: String, limit: Option<u32>) -> HistoryResponse {
    let company_id = match Uuid::parse_str(company_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            return HistoryResponse {
                ok: false,
                items_json: None,
                message: format!("invalid company id `{company_id}`"),
            };
        }
    };

    let result = with_connection(|conn| {
        let recent = communication_service(conn)
            .recent_communications(company_id, limit)
            .map_err(|err| err.to_string())?;
        serde_json::to_string(&recent.items).map_err(|err| err.to_string())
    });

    match result {
        Ok(json) => HistoryResponse {
            ok: true,
            items_json: Some(json),
            message: String::new(),
        },
        Err(err) => HistoryResponse {
            ok: false,
            items_json: None,
            message: format!("recent_communications failed: {err}"),
        },
    }
}

/// Lists the methods a communication can be logged with.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn known_methods() -> MethodsResponse {
    let result = with_connection(|conn| {
        SqliteCadenceRepository::new(conn)
            .list_known_methods()
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(methods) => MethodsResponse {
            ok: true,
            methods,
            message: String::new(),
        },
        Err(err) => MethodsResponse {
            ok: false,
            methods: Vec::new(),
            message: format!("known_methods failed: {err}"),
        },
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn with_connection<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
    f(&conn)
}

fn communication_service(
    conn: &Connection,
) -> CommunicationService<
    SqliteCompanyRepository<'_>,
    SqliteCadenceRepository<'_>,
    SqliteCommunicationRepository<'_>,
> {
    CommunicationService::new(
        SqliteCompanyRepository::new(conn),
        SqliteCadenceRepository::new(conn),
        SqliteCommunicationRepository::new(conn),
    )
}

fn resolve_as_of(as_of: Option<&str>) -> Result<NaiveDate, String> {
    match as_of.map(str::trim) {
        Some(value) if !value.is_empty() => parse_date(value),
        _ => Ok(Local::now().date_naive()),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    value
        .trim()
        .parse::<NaiveDate>()
        .map_err(|_| format!("expected ISO date YYYY-MM-DD, got `{value}`"))
}

fn parse_company_ids(values: &[String]) -> Result<Vec<CompanyId>, String> {
    values
        .iter()
        .map(|value| {
            Uuid::parse_str(value.trim()).map_err(|_| format!("invalid company id `{value}`"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, feed_query, init_logging, known_methods, log_communication, parse_date,
        ping, recent_communications, resolve_db_path,
    };
    use chrono::{Days, Local};
    use commtrack_core::db::open_db;
    use commtrack_core::{
        CadenceRepository, CadenceScope, CommunicationMethodRule, Company, CompanyRepository,
        SqliteCadenceRepository, SqliteCompanyRepository,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn parse_date_rejects_non_iso_input() {
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("03/01/2024").is_err());
        assert!(parse_date(" 2024-03-01 ").is_ok());
    }

    #[test]
    fn log_then_feed_reports_company_due_today() {
        let category = unique_token("ffi-feed");
        let company = seed_company(&category, 1);
        let today = Local::now().date_naive();

        let logged = log_communication(
            vec![company.id.to_string()],
            format!("{category}-email"),
            (today - Days::new(1)).to_string(),
            "intro call notes".to_string(),
        );
        assert!(logged.ok, "{}", logged.message);
        assert_eq!(logged.event_ids.len(), 1);

        let response = feed_query(Some(today.to_string()));
        assert!(response.ok, "{}", response.message);
        let feed: serde_json::Value =
            serde_json::from_str(response.feed_json.as_deref().expect("feed json")).unwrap();
        let due_today = feed["dueToday"].as_array().expect("dueToday array");
        assert!(due_today
            .iter()
            .any(|entry| entry["companyId"] == company.id.to_string()));
        assert!(response.notification_count >= 1);

        let methods = known_methods();
        assert!(methods.ok, "{}", methods.message);
        assert!(methods.methods.contains(&format!("{category}-email")));

        let history = recent_communications(company.id.to_string(), None);
        assert!(history.ok, "{}", history.message);
        assert!(history
            .items_json
            .expect("history json")
            .contains("intro call notes"));
    }

    #[test]
    fn log_communication_rejects_future_date_and_bad_ids() {
        let category = unique_token("ffi-reject");
        let company = seed_company(&category, 3);
        let tomorrow = Local::now().date_naive() + Days::new(1);

        let future = log_communication(
            vec![company.id.to_string()],
            format!("{category}-email"),
            tomorrow.to_string(),
            String::new(),
        );
        assert!(!future.ok);
        assert_eq!(future.error_field.as_deref(), Some("date"));

        let bad_id = log_communication(
            vec!["not-a-uuid".to_string()],
            format!("{category}-email"),
            "2024-01-01".to_string(),
            String::new(),
        );
        assert!(!bad_id.ok);
        assert_eq!(bad_id.error_field.as_deref(), Some("companyIds"));
    }

    #[test]
    fn feed_query_rejects_malformed_as_of() {
        let response = feed_query(Some("yesterday".to_string()));
        assert!(!response.ok);
        assert!(response.feed_json.is_none());
        assert_eq!(response.notification_count, 0);
    }

    fn seed_company(category: &str, interval_days: u32) -> Company {
        let conn = open_db(resolve_db_path()).expect("open db");
        let company = Company::new(category, category, Local::now().date_naive());
        SqliteCompanyRepository::new(&conn)
            .create_company(&company)
            .expect("create company");
        SqliteCadenceRepository::new(&conn)
            .replace_rules(
                &CadenceScope::Company(company.id),
                &[CommunicationMethodRule::new(
                    &format!("{category}-email"),
                    1,
                    interval_days,
                )],
            )
            .expect("set cadence");
        company
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
