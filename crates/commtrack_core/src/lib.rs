//! Core domain logic for CommTrack.
//!
//! Tracks recurring communication obligations towards companies and derives,
//! for any given day, which companies are overdue, due today or upcoming.
//! This crate is the single source of truth for scheduling invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use logging::{configured_log_level, default_log_level, init_logging, logging_status};
pub use model::cadence::{
    normalize_method, Cadence, CadenceScope, CadenceValidationError, CommunicationMethodRule,
};
pub use model::communication::{CommunicationEvent, CommunicationId, MethodCount};
pub use model::company::{Company, CompanyId, CompanyValidationError};
pub use repo::cadence_repo::{CadenceRepository, SqliteCadenceRepository};
pub use repo::communication_repo::{
    CommunicationRepository, NewCommunication, SqliteCommunicationRepository,
};
pub use repo::company_repo::{CompanyRepository, SqliteCompanyRepository};
pub use repo::{ReadSnapshot, RepoError, RepoResult};
pub use schedule::engine::{classify, DueState, DueStatus};
pub use schedule::feed::{
    build_feed, CompanySnapshot, CompanySummary, ConfigurationIssue, Feed, FeedOptions,
};
pub use schedule::ConfigurationError;
pub use service::communication_service::{
    CommunicationService, CommunicationServiceError, LogCommunicationRequest,
    RecentCommunications, ValidationError,
};
pub use service::due_status_service::{DueStatusError, DueStatusService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
