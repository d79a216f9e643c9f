//! Company repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listing is deterministic: `name ASC, uuid ASC`.
//! - Companies are never hard-deleted; deactivation keeps their history.

use super::{
    bool_to_int, parse_date, parse_uuid, read_in_transaction, ReadSnapshot, RepoError, RepoResult,
};
use crate::model::company::{Company, CompanyId};
use rusqlite::{params, Connection, Row};

const COMPANY_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    category,
    anchor_date,
    is_active
FROM companies";

/// Repository interface for company master data.
pub trait CompanyRepository {
    fn create_company(&self, company: &Company) -> RepoResult<CompanyId>;
    fn get_company(&self, id: CompanyId) -> RepoResult<Option<Company>>;
    fn list_companies(&self, include_inactive: bool) -> RepoResult<Vec<Company>>;
    fn set_company_active(&self, id: CompanyId, is_active: bool) -> RepoResult<()>;
}

/// SQLite-backed company repository.
pub struct SqliteCompanyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCompanyRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CompanyRepository for SqliteCompanyRepository<'_> {
    fn create_company(&self, company: &Company) -> RepoResult<CompanyId> {
        company.validate()?;

        self.conn.execute(
            "INSERT INTO companies (
                uuid,
                name,
                category,
                anchor_date,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                company.id.to_string(),
                company.name.as_str(),
                company.category.as_str(),
                company.anchor_date.to_string(),
                bool_to_int(company.is_active),
            ],
        )?;

        Ok(company.id)
    }

    fn get_company(&self, id: CompanyId) -> RepoResult<Option<Company>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMPANY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_company_row(row)?));
        }
        Ok(None)
    }

    fn list_companies(&self, include_inactive: bool) -> RepoResult<Vec<Company>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMPANY_SELECT_SQL}
             WHERE (?1 = 1 OR is_active = 1)
             ORDER BY name ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_inactive)])?;
        let mut companies = Vec::new();
        while let Some(row) = rows.next()? {
            companies.push(parse_company_row(row)?);
        }
        Ok(companies)
    }

    fn set_company_active(&self, id: CompanyId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE companies
             SET
                is_active = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![bool_to_int(is_active), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::CompanyNotFound(id));
        }
        Ok(())
    }
}

impl ReadSnapshot for SqliteCompanyRepository<'_> {
    fn read_snapshot<T>(&self, read: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
        read_in_transaction(self.conn, read)
    }
}

fn parse_company_row(row: &Row<'_>) -> RepoResult<Company> {
    let uuid_text: String = row.get("uuid")?;
    let anchor_text: String = row.get("anchor_date")?;
    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in companies.is_active"
            )));
        }
    };

    let company = Company {
        id: parse_uuid(&uuid_text, "companies.uuid")?,
        name: row.get("name")?,
        category: row.get("category")?,
        anchor_date: parse_date(&anchor_text, "companies.anchor_date")?,
        is_active,
    };
    company.validate()?;
    Ok(company)
}
