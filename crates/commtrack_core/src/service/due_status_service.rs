//! Due-status use-case service.
//!
//! # Responsibility
//! - Load company snapshots through repositories.
//! - Expose per-company classification and the dashboard feed.
//!
//! # Invariants
//! - `today` always comes from the caller; the service never reads a clock.
//! - Companies, rules and histories of one call are read from one committed
//!   state, so a batch logged concurrently is seen for all of its companies
//!   or for none.
//! - Persistence failures propagate unchanged. Configuration problems of one
//!   company never fail the feed.

use crate::model::company::{Company, CompanyId};
use crate::repo::cadence_repo::CadenceRepository;
use crate::repo::communication_repo::CommunicationRepository;
use crate::repo::company_repo::CompanyRepository;
use crate::repo::{ReadSnapshot, RepoError, RepoResult};
use crate::schedule::engine::DueStatus;
use crate::schedule::feed::{build_feed, CompanySnapshot, Feed, FeedOptions};
use crate::schedule::ConfigurationError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from single-company classification.
#[derive(Debug)]
pub enum DueStatusError {
    CompanyNotFound(CompanyId),
    Configuration {
        company_id: CompanyId,
        error: ConfigurationError,
    },
    Persistence(RepoError),
}

impl Display for DueStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompanyNotFound(id) => write!(f, "company not found: {id}"),
            Self::Configuration { company_id, error } => {
                write!(f, "company {company_id} cannot be scheduled: {error}")
            }
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DueStatusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration { error, .. } => Some(error),
            Self::Persistence(err) => Some(err),
            Self::CompanyNotFound(_) => None,
        }
    }
}

impl From<RepoError> for DueStatusError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CompanyNotFound(id) => Self::CompanyNotFound(id),
            other => Self::Persistence(other),
        }
    }
}

/// Read-side service over company, cadence and history repositories.
pub struct DueStatusService<C, P, H>
where
    C: CompanyRepository + ReadSnapshot,
    P: CadenceRepository,
    H: CommunicationRepository,
{
    companies: C,
    cadences: P,
    communications: H,
}

impl<C, P, H> DueStatusService<C, P, H>
where
    C: CompanyRepository + ReadSnapshot,
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

    /// Classifies one company as of `today`.
    ///
    /// Unlike the feed, configuration problems are returned as errors here.
    pub fn classify(
        &self,
        company_id: CompanyId,
        today: NaiveDate,
    ) -> Result<DueStatus, DueStatusError> {
        let snapshot = self.companies.read_snapshot(|| {
            let company = self
                .companies
                .get_company(company_id)?
                .ok_or(RepoError::CompanyNotFound(company_id))?;
            self.load_snapshot(company)
        })?;
        snapshot
            .classify(today)
            .map_err(|error| DueStatusError::Configuration { company_id, error })
    }

    /// Builds the dashboard feed for every active company.
    pub fn build_feed(&self, today: NaiveDate, options: &FeedOptions) -> RepoResult<Feed> {
        let snapshots = self.load_active_snapshots()?;
        Ok(build_feed(&snapshots, today, options))
    }

    /// Reads the snapshots of every active company, ordered by name.
    pub fn load_active_snapshots(&self) -> RepoResult<Vec<CompanySnapshot>> {
        self.companies.read_snapshot(|| {
            self.companies
                .list_companies(false)?
                .into_iter()
                .map(|company| self.load_snapshot(company))
                .collect()
        })
    }

    fn load_snapshot(&self, company: Company) -> RepoResult<CompanySnapshot> {
        let rules = self.cadences.resolve_rules(&company)?;
        let history = self.communications.list_for_company(company.id)?;
        Ok(CompanySnapshot {
            company,
            rules,
            history,
        })
    }
}
