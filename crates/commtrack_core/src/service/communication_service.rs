//! Communication logging and history use-cases.
//!
//! # Responsibility
//! - Validate and append a logged communication for one or more companies.
//! - Serve the history views (recent per company, calendar range, method
//!   frequency).
//!
//! # Invariants
//! - A rejected log request writes nothing for any company.
//! - A successful log request writes exactly one event per distinct company,
//!   all sharing method, date and notes.
//! - Logging a communication dated after `today` is rejected.
//! - Method and company checks are repeated inside the write transaction; a
//!   rule or company removed in between rejects the request like an upfront
//!   check would.

use crate::model::cadence::normalize_method;
use crate::model::communication::{CommunicationEvent, MethodCount};
use crate::model::company::CompanyId;
use crate::repo::cadence_repo::CadenceRepository;
use crate::repo::communication_repo::{CommunicationRepository, NewCommunication};
use crate::repo::company_repo::CompanyRepository;
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const RECENT_DEFAULT_LIMIT: u32 = 5;
const RECENT_LIMIT_MAX: u32 = 50;

pub const FIELD_COMPANY_IDS: &str = "companyIds";
pub const FIELD_METHOD: &str = "method";
pub const FIELD_DATE: &str = "date";
pub const FIELD_RANGE: &str = "range";

/// Command payload for logging one communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCommunicationRequest {
    pub company_ids: Vec<CompanyId>,
    pub method: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

/// Rejected input, reported as `{field, reason}` to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.reason)
    }
}

impl Error for ValidationError {}

/// Service error for communication use-cases.
#[derive(Debug)]
pub enum CommunicationServiceError {
    Validation(ValidationError),
    /// A read named a company that does not exist.
    CompanyNotFound(CompanyId),
    Persistence(RepoError),
}

impl CommunicationServiceError {
    /// Stable `error_code` value used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_input",
            Self::CompanyNotFound(_) => "company_not_found",
            Self::Persistence(err) => err.code(),
        }
    }
}

impl Display for CommunicationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CompanyNotFound(id) => write!(f, "company not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommunicationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::CompanyNotFound(_) => None,
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CommunicationServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CommunicationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CompanyNotFound(id) => Self::CompanyNotFound(id),
            other => Self::Persistence(other),
        }
    }
}

pub type CommunicationServiceResult<T> = Result<T, CommunicationServiceError>;

/// Recent-history envelope for the dashboard history column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCommunications {
    /// Newest first.
    pub items: Vec<CommunicationEvent>,
    pub applied_limit: u32,
}

/// Write-side service for logged communications.
pub struct CommunicationService<C, P, H>
where
    C: CompanyRepository,
    P: CadenceRepository,
    H: CommunicationRepository,
{
    companies: C,
    cadences: P,
    communications: H,
}

impl<C, P, H> CommunicationService<C, P, H>
where
    C: CompanyRepository,
    P: CadenceRepository,
    H: CommunicationRepository,
{
    pub fn new(companies: C, cadences: P, communications: H) -> Self {
        Self {
            companies,
            cadences,
            communications,
        }
    }

    /// Validates and appends one communication per distinct company.
    ///
    /// # Errors
    /// - `Validation` with field `companyIds` when the set is empty or names
    ///   an unknown company.
    /// - `Validation` with field `method` when no cadence rule uses it.
    /// - `Validation` with field `date` when `date > today`.
    /// - `Persistence` when the store fails; nothing is written in that case.
    pub fn log_communication(
        &self,
        request: &LogCommunicationRequest,
        today: NaiveDate,
    ) -> CommunicationServiceResult<Vec<CommunicationEvent>> {
        let created = self
            .validate_request(request, today)
            .and_then(|batch| self.append(&batch));
        match created {
            Ok(created) => {
                info!(
                    "event=communication_log module=service status=ok companies={} method={}",
                    created.len(),
                    created.first().map_or("", |event| event.method.as_str())
                );
                Ok(created)
            }
            Err(CommunicationServiceError::Validation(err)) => {
                warn!(
                    "event=communication_log module=service status=rejected field={} companies={}",
                    err.field,
                    request.company_ids.len()
                );
                Err(err.into())
            }
            Err(err) => {
                error!(
                    "event=communication_log module=service status=error error_code={} companies={}",
                    err.code(),
                    request.company_ids.len()
                );
                Err(err)
            }
        }
    }

    /// Latest communications of one company, newest first.
    ///
    /// `limit` defaults to 5 and is clamped to 50.
    pub fn recent_communications(
        &self,
        company_id: CompanyId,
        limit: Option<u32>,
    ) -> CommunicationServiceResult<RecentCommunications> {
        if self.companies.get_company(company_id)?.is_none() {
            return Err(CommunicationServiceError::CompanyNotFound(company_id));
        }
        let applied_limit = normalize_recent_limit(limit);
        let items = self
            .communications
            .recent_for_company(company_id, applied_limit)?;
        Ok(RecentCommunications {
            items,
            applied_limit,
        })
    }

    /// All communications dated within `from..=to`, oldest first.
    pub fn communications_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CommunicationServiceResult<Vec<CommunicationEvent>> {
        validate_range(from, to)?;
        Ok(self.communications.list_between(from, to)?)
    }

    /// Logged communication counts per method within `from..=to`.
    ///
    /// Sorted by count descending, then method name.
    pub fn method_frequency(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CommunicationServiceResult<Vec<MethodCount>> {
        validate_range(from, to)?;
        Ok(self.communications.method_counts_between(from, to)?)
    }

    fn append(
        &self,
        batch: &[NewCommunication],
    ) -> CommunicationServiceResult<Vec<CommunicationEvent>> {
        self.communications
            .append_batch(batch)
            .map_err(|err| match err {
                RepoError::UnknownMethod(method) => ValidationError::new(
                    FIELD_METHOD,
                    format!("unknown communication method `{method}`"),
                )
                .into(),
                RepoError::CompanyNotFound(id) => {
                    ValidationError::new(FIELD_COMPANY_IDS, format!("unknown company {id}")).into()
                }
                other => other.into(),
            })
    }

    fn validate_request(
        &self,
        request: &LogCommunicationRequest,
        today: NaiveDate,
    ) -> CommunicationServiceResult<Vec<NewCommunication>> {
        let company_ids = distinct_in_order(&request.company_ids);
        if company_ids.is_empty() {
            return Err(ValidationError::new(
                FIELD_COMPANY_IDS,
                "at least one company is required",
            )
            .into());
        }

        let method = normalize_method(&request.method);
        if method.is_empty() {
            return Err(ValidationError::new(FIELD_METHOD, "method is required").into());
        }
        if !self.cadences.is_known_method(&method)? {
            return Err(ValidationError::new(
                FIELD_METHOD,
                format!("unknown communication method `{method}`"),
            )
            .into());
        }

        if request.date > today {
            return Err(ValidationError::new(
                FIELD_DATE,
                format!("date {} is after {today}", request.date),
            )
            .into());
        }

        for company_id in &company_ids {
            if self.companies.get_company(*company_id)?.is_none() {
                return Err(ValidationError::new(
                    FIELD_COMPANY_IDS,
                    format!("unknown company {company_id}"),
                )
                .into());
            }
        }

        Ok(company_ids
            .into_iter()
            .map(|company_id| NewCommunication {
                company_id,
                method: method.clone(),
                date: request.date,
                notes: request.notes.trim().to_string(),
            })
            .collect())
    }
}

fn distinct_in_order(ids: &[CompanyId]) -> Vec<CompanyId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ValidationError> {
    if from > to {
        return Err(ValidationError::new(
            FIELD_RANGE,
            format!("range start {from} is after range end {to}"),
        ));
    }
    Ok(())
}

/// Normalizes the recent-history limit: `None`/`0` -> 5, values above 50 -> 50.
pub fn normalize_recent_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => RECENT_DEFAULT_LIMIT,
        Some(value) if value > RECENT_LIMIT_MAX => RECENT_LIMIT_MAX,
        Some(value) => value,
    }
}
