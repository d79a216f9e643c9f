//! Cadence policy repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Store ordered method/interval rules per company or per category.
//! - Resolve the effective rule list for one company.
//! - Answer whether a method name is known anywhere in the system.
//!
//! # Invariants
//! - Replacing the rules of a scope is atomic.
//! - Company rules, when present, fully replace the category rules.
//! - Rules are returned ordered by `sequence ASC`.

use super::{RepoError, RepoResult};
use crate::model::cadence::{normalize_method, Cadence, CadenceScope, CommunicationMethodRule};
use crate::model::company::Company;
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

/// Repository interface for cadence policies.
pub trait CadenceRepository {
    /// Replaces every rule of `scope`. An empty slice clears the scope.
    fn replace_rules(&self, scope: &CadenceScope, rules: &[CommunicationMethodRule])
        -> RepoResult<()>;
    /// Lists the rules stored directly on `scope`.
    fn rules_for_scope(&self, scope: &CadenceScope) -> RepoResult<Vec<CommunicationMethodRule>>;
    /// Resolves the rules that govern `company`.
    ///
    /// Returns an empty list when neither the company nor its category has
    /// rules. Rows are returned as stored; `Cadence::new` decides validity.
    fn resolve_rules(&self, company: &Company) -> RepoResult<Vec<CommunicationMethodRule>>;
    /// Whether any rule in any scope uses `method`.
    fn is_known_method(&self, method: &str) -> RepoResult<bool>;
    /// Distinct method names across all scopes, sorted.
    fn list_known_methods(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed cadence repository.
pub struct SqliteCadenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCadenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CadenceRepository for SqliteCadenceRepository<'_> {
    fn replace_rules(
        &self,
        scope: &CadenceScope,
        rules: &[CommunicationMethodRule],
    ) -> RepoResult<()> {
        let cadence = Cadence::new(rules.to_vec())?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let CadenceScope::Company(company_id) = scope {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM companies WHERE uuid = ?1);",
                [company_id.to_string()],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(RepoError::CompanyNotFound(*company_id));
            }
        }

        tx.execute(
            "DELETE FROM cadence_rules WHERE scope_kind = ?1 AND scope_key = ?2;",
            params![scope.kind_label(), scope.key()],
        )?;
        for rule in cadence.rules() {
            tx.execute(
                "INSERT INTO cadence_rules (
                    scope_kind,
                    scope_key,
                    sequence,
                    method,
                    interval_days
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    scope.kind_label(),
                    scope.key(),
                    rule.sequence,
                    rule.method.as_str(),
                    rule.interval_days,
                ],
            )?;
        }
        tx.commit()?;

        info!(
            "event=cadence_replace module=repo status=ok scope={} rules={}",
            scope.kind_label(),
            cadence.len()
        );
        Ok(())
    }

    fn rules_for_scope(&self, scope: &CadenceScope) -> RepoResult<Vec<CommunicationMethodRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, method, interval_days
             FROM cadence_rules
             WHERE scope_kind = ?1 AND scope_key = ?2
             ORDER BY sequence ASC;",
        )?;
        let mut rows = stmt.query(params![scope.kind_label(), scope.key()])?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            rules.push(parse_rule_row(row)?);
        }
        Ok(rules)
    }

    fn resolve_rules(&self, company: &Company) -> RepoResult<Vec<CommunicationMethodRule>> {
        let own = self.rules_for_scope(&CadenceScope::Company(company.id))?;
        if !own.is_empty() {
            return Ok(own);
        }
        self.rules_for_scope(&CadenceScope::category(&company.category))
    }

    fn is_known_method(&self, method: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cadence_rules WHERE method = ?1);",
            [normalize_method(method)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_known_methods(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT method FROM cadence_rules ORDER BY method ASC;")?;
        let methods = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(methods)
    }
}

fn parse_rule_row(row: &Row<'_>) -> RepoResult<CommunicationMethodRule> {
    let sequence: i64 = row.get("sequence")?;
    let interval_days: i64 = row.get("interval_days")?;
    Ok(CommunicationMethodRule {
        method: row.get("method")?,
        sequence: u32::try_from(sequence).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid sequence `{sequence}` in cadence_rules.sequence"
            ))
        })?,
        interval_days: u32::try_from(interval_days).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid interval `{interval_days}` in cadence_rules.interval_days"
            ))
        })?,
    })
}
