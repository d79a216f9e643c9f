//! Communication history repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append logged communications, one row per company.
//! - Serve ordered history reads for the engine and dashboard views.
//!
//! # Invariants
//! - `append_batch` runs in one IMMEDIATE transaction: concurrent writers are
//!   serialized and a failed batch leaves every history unchanged.
//! - Inside that transaction every company must exist and every method must
//!   be used by some cadence rule; checks made earlier by callers can be
//!   stale by then.
//! - Per-company history is ordered `occurred_on ASC, seq ASC`.
//! - Rows are never updated or deleted.

use super::{parse_date, parse_uuid, RepoError, RepoResult};
use crate::model::communication::{CommunicationEvent, MethodCount};
use crate::model::company::CompanyId;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const COMMUNICATION_SELECT_SQL: &str = "SELECT
    seq,
    uuid,
    company_uuid,
    method,
    occurred_on,
    notes
FROM communications";

/// Write model for one communication row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommunication {
    pub company_id: CompanyId,
    /// Already normalized method name.
    pub method: String,
    pub date: NaiveDate,
    pub notes: String,
}

/// Repository interface for communication history.
pub trait CommunicationRepository {
    /// Appends all rows or none, returning the stored events in input order.
    ///
    /// Fails with `UnknownMethod` or `CompanyNotFound` when, at write time,
    /// no cadence rule uses a row's method or its company is missing.
    fn append_batch(&self, batch: &[NewCommunication]) -> RepoResult<Vec<CommunicationEvent>>;
    /// Full history of one company, oldest first.
    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CommunicationEvent>>;
    /// Latest `limit` events of one company, newest first.
    fn recent_for_company(
        &self,
        company_id: CompanyId,
        limit: u32,
    ) -> RepoResult<Vec<CommunicationEvent>>;
    /// Events dated within `from..=to`, oldest first.
    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<CommunicationEvent>>;
    /// Event counts per method within `from..=to`.
    fn method_counts_between(&self, from: NaiveDate, to: NaiveDate)
        -> RepoResult<Vec<MethodCount>>;
}

/// SQLite-backed communication repository.
pub struct SqliteCommunicationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommunicationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CommunicationRepository for SqliteCommunicationRepository<'_> {
    fn append_batch(&self, batch: &[NewCommunication]) -> RepoResult<Vec<CommunicationEvent>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut created = Vec::with_capacity(batch.len());
        {
            let mut method_known = tx.prepare(
                "SELECT EXISTS(SELECT 1 FROM cadence_rules WHERE method = ?1);",
            )?;
            let mut company_exists =
                tx.prepare("SELECT EXISTS(SELECT 1 FROM companies WHERE uuid = ?1);")?;
            for item in batch {
                let known: i64 = method_known.query_row([item.method.as_str()], |row| row.get(0))?;
                if known == 0 {
                    return Err(RepoError::UnknownMethod(item.method.clone()));
                }
                let exists: i64 =
                    company_exists.query_row([item.company_id.to_string()], |row| row.get(0))?;
                if exists == 0 {
                    return Err(RepoError::CompanyNotFound(item.company_id));
                }
            }

            let mut stmt = tx.prepare(
                "INSERT INTO communications (
                    uuid,
                    company_uuid,
                    method,
                    occurred_on,
                    notes
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for item in batch {
                let id = Uuid::new_v4();
                stmt.execute(params![
                    id.to_string(),
                    item.company_id.to_string(),
                    item.method.as_str(),
                    item.date.to_string(),
                    item.notes.as_str(),
                ])?;
                created.push(CommunicationEvent {
                    id,
                    company_id: item.company_id,
                    method: item.method.clone(),
                    date: item.date,
                    notes: item.notes.clone(),
                    sequence: tx.last_insert_rowid(),
                });
            }
        }
        tx.commit()?;
        Ok(created)
    }

    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CommunicationEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMUNICATION_SELECT_SQL}
             WHERE company_uuid = ?1
             ORDER BY occurred_on ASC, seq ASC;"
        ))?;
        let mut rows = stmt.query([company_id.to_string()])?;
        collect_events(&mut rows)
    }

    fn recent_for_company(
        &self,
        company_id: CompanyId,
        limit: u32,
    ) -> RepoResult<Vec<CommunicationEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMUNICATION_SELECT_SQL}
             WHERE company_uuid = ?1
             ORDER BY occurred_on DESC, seq DESC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![company_id.to_string(), i64::from(limit)])?;
        collect_events(&mut rows)
    }

    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<CommunicationEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMUNICATION_SELECT_SQL}
             WHERE occurred_on >= ?1 AND occurred_on <= ?2
             ORDER BY occurred_on ASC, seq ASC;"
        ))?;
        let mut rows = stmt.query(params![from.to_string(), to.to_string()])?;
        collect_events(&mut rows)
    }

    fn method_counts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<MethodCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT method, COUNT(*) AS total
             FROM communications
             WHERE occurred_on >= ?1 AND occurred_on <= ?2
             GROUP BY method
             ORDER BY total DESC, method ASC;",
        )?;
        let counts = stmt
            .query_map(params![from.to_string(), to.to_string()], |row| {
                Ok(MethodCount {
                    method: row.get(0)?,
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

fn collect_events(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<CommunicationEvent>> {
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        events.push(parse_communication_row(row)?);
    }
    Ok(events)
}

fn parse_communication_row(row: &Row<'_>) -> RepoResult<CommunicationEvent> {
    let uuid_text: String = row.get("uuid")?;
    let company_text: String = row.get("company_uuid")?;
    let date_text: String = row.get("occurred_on")?;
    Ok(CommunicationEvent {
        id: parse_uuid(&uuid_text, "communications.uuid")?,
        company_id: parse_uuid(&company_text, "communications.company_uuid")?,
        method: row.get("method")?,
        date: parse_date(&date_text, "communications.occurred_on")?,
        notes: row.get("notes")?,
        sequence: row.get("seq")?,
    })
}
