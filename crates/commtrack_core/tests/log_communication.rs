use chrono::NaiveDate;
use commtrack_core::db::open_db_in_memory;
use commtrack_core::{
    CadenceRepository, CadenceScope, CommunicationMethodRule, CommunicationRepository,
    CommunicationService, CommunicationServiceError, Company, CompanyId, CompanyRepository,
    LogCommunicationRequest, NewCommunication, RepoError, RepoResult, SqliteCadenceRepository,
    SqliteCommunicationRepository, SqliteCompanyRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

type SqliteCommunicationService<'conn> = CommunicationService<
    SqliteCompanyRepository<'conn>,
    SqliteCadenceRepository<'conn>,
    SqliteCommunicationRepository<'conn>,
>;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn service(conn: &Connection) -> SqliteCommunicationService<'_> {
    CommunicationService::new(
        SqliteCompanyRepository::new(conn),
        SqliteCadenceRepository::new(conn),
        SqliteCommunicationRepository::new(conn),
    )
}

fn seed(conn: &Connection) -> (CompanyId, CompanyId) {
    let companies = SqliteCompanyRepository::new(conn);
    let a = Company::new("Acme", "smb", date(1, 1));
    let b = Company::new("Bolt", "smb", date(1, 1));
    companies.create_company(&a).unwrap();
    companies.create_company(&b).unwrap();
    SqliteCadenceRepository::new(conn)
        .replace_rules(
            &CadenceScope::category("smb"),
            &[
                CommunicationMethodRule::new("email", 1, 7),
                CommunicationMethodRule::new("call", 2, 3),
            ],
        )
        .unwrap();
    (a.id, b.id)
}

fn request(ids: &[CompanyId], method: &str, date: NaiveDate) -> LogCommunicationRequest {
    LogCommunicationRequest {
        company_ids: ids.to_vec(),
        method: method.to_string(),
        date,
        notes: "quarterly check-in".to_string(),
    }
}

fn history_len(conn: &Connection, id: CompanyId) -> usize {
    SqliteCommunicationRepository::new(conn)
        .list_for_company(id)
        .unwrap()
        .len()
}

fn expect_validation(err: CommunicationServiceError) -> (&'static str, String) {
    match err {
        CommunicationServiceError::Validation(err) => (err.field, err.reason),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn logging_fans_out_one_event_per_company() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);

    let events = service(&conn)
        .log_communication(&request(&[a, b], " Email ", date(3, 1)), date(3, 1))
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].company_id, a);
    assert_eq!(events[1].company_id, b);
    for event in &events {
        assert_eq!(event.method, "email");
        assert_eq!(event.date, date(3, 1));
        assert_eq!(event.notes, "quarterly check-in");
    }
    assert!(events[0].sequence < events[1].sequence);
    assert_eq!(history_len(&conn, a), 1);
    assert_eq!(history_len(&conn, b), 1);
}

#[test]
fn duplicate_company_ids_are_collapsed() {
    let conn = open_db_in_memory().unwrap();
    let (a, _) = seed(&conn);

    let events = service(&conn)
        .log_communication(&request(&[a, a], "call", date(3, 1)), date(3, 2))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(history_len(&conn, a), 1);
}

#[test]
fn future_date_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);

    let err = service(&conn)
        .log_communication(&request(&[a, b], "call", date(3, 5)), date(3, 4))
        .unwrap_err();

    let (field, _) = expect_validation(err);
    assert_eq!(field, "date");
    assert_eq!(history_len(&conn, a), 0);
    assert_eq!(history_len(&conn, b), 0);
}

#[test]
fn empty_company_set_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let err = service(&conn)
        .log_communication(&request(&[], "email", date(3, 1)), date(3, 1))
        .unwrap_err();
    assert_eq!(expect_validation(err).0, "companyIds");
}

#[test]
fn unknown_method_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (a, _) = seed(&conn);

    let err = service(&conn)
        .log_communication(&request(&[a], "carrier pigeon", date(3, 1)), date(3, 1))
        .unwrap_err();
    let (field, reason) = expect_validation(err);
    assert_eq!(field, "method");
    assert!(reason.contains("carrier pigeon"));
    assert_eq!(history_len(&conn, a), 0);
}

#[test]
fn unknown_company_rejects_the_whole_batch() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);

    let err = service(&conn)
        .log_communication(&request(&[a, Uuid::new_v4(), b], "email", date(3, 1)), date(3, 1))
        .unwrap_err();
    assert_eq!(expect_validation(err).0, "companyIds");
    assert_eq!(history_len(&conn, a), 0);
    assert_eq!(history_len(&conn, b), 0);
}

#[test]
fn missing_company_mid_batch_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let (a, _) = seed(&conn);

    let repo = SqliteCommunicationRepository::new(&conn);
    let batch = vec![
        NewCommunication {
            company_id: a,
            method: "email".to_string(),
            date: date(3, 1),
            notes: String::new(),
        },
        NewCommunication {
            company_id: Uuid::new_v4(),
            method: "email".to_string(),
            date: date(3, 1),
            notes: String::new(),
        },
    ];
    let missing = batch[1].company_id;
    let err = repo.append_batch(&batch).unwrap_err();
    assert!(matches!(err, RepoError::CompanyNotFound(id) if id == missing));
    assert_eq!(history_len(&conn, a), 0);
}

#[test]
fn recent_communications_are_newest_first_and_limited() {
    let conn = open_db_in_memory().unwrap();
    let (a, _) = seed(&conn);
    let svc = service(&conn);

    for day in 1..=7 {
        let method = if day % 2 == 0 { "call" } else { "email" };
        svc.log_communication(&request(&[a], method, date(4, day)), date(4, 30))
            .unwrap();
    }

    let recent = svc.recent_communications(a, None).unwrap();
    assert_eq!(recent.applied_limit, 5);
    let dates: Vec<_> = recent.items.iter().map(|e| e.date).collect();
    assert_eq!(
        dates,
        vec![date(4, 7), date(4, 6), date(4, 5), date(4, 4), date(4, 3)]
    );

    let missing = Uuid::new_v4();
    let err = svc.recent_communications(missing, None).unwrap_err();
    assert!(matches!(
        err,
        CommunicationServiceError::CompanyNotFound(id) if id == missing
    ));
}

#[test]
fn calendar_range_and_method_frequency() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);
    let svc = service(&conn);

    svc.log_communication(&request(&[a, b], "email", date(5, 1)), date(5, 31))
        .unwrap();
    svc.log_communication(&request(&[a], "call", date(5, 10)), date(5, 31))
        .unwrap();
    svc.log_communication(&request(&[b], "call", date(6, 2)), date(6, 30))
        .unwrap();

    let may = svc.communications_between(date(5, 1), date(5, 31)).unwrap();
    assert_eq!(may.len(), 3);
    assert!(may.windows(2).all(|pair| pair[0].date <= pair[1].date));

    let counts = svc.method_frequency(date(5, 1), date(6, 30)).unwrap();
    let summary: Vec<_> = counts.iter().map(|c| (c.method.as_str(), c.count)).collect();
    assert_eq!(summary, vec![("call", 2), ("email", 2)]);

    let err = svc.communications_between(date(6, 1), date(5, 1)).unwrap_err();
    assert_eq!(expect_validation(err).0, "range");
}

#[test]
fn append_batch_rejects_method_without_rule() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);

    let batch: Vec<_> = [a, b]
        .into_iter()
        .map(|company_id| NewCommunication {
            company_id,
            method: "fax".to_string(),
            date: date(3, 1),
            notes: String::new(),
        })
        .collect();
    let err = SqliteCommunicationRepository::new(&conn)
        .append_batch(&batch)
        .unwrap_err();
    assert!(matches!(err, RepoError::UnknownMethod(ref method) if method == "fax"));
    assert_eq!(history_len(&conn, a), 0);
    assert_eq!(history_len(&conn, b), 0);
}

/// Cadence store whose method check is followed by a cadence change from
/// another actor before the write happens.
struct RuleRemovedAfterCheck<'conn> {
    inner: SqliteCadenceRepository<'conn>,
}

impl CadenceRepository for RuleRemovedAfterCheck<'_> {
    fn replace_rules(
        &self,
        scope: &CadenceScope,
        rules: &[CommunicationMethodRule],
    ) -> RepoResult<()> {
        self.inner.replace_rules(scope, rules)
    }

    fn rules_for_scope(&self, scope: &CadenceScope) -> RepoResult<Vec<CommunicationMethodRule>> {
        self.inner.rules_for_scope(scope)
    }

    fn resolve_rules(&self, company: &Company) -> RepoResult<Vec<CommunicationMethodRule>> {
        self.inner.resolve_rules(company)
    }

    fn is_known_method(&self, method: &str) -> RepoResult<bool> {
        let known = self.inner.is_known_method(method)?;
        self.inner.replace_rules(
            &CadenceScope::category("smb"),
            &[CommunicationMethodRule::new("call", 1, 3)],
        )?;
        Ok(known)
    }

    fn list_known_methods(&self) -> RepoResult<Vec<String>> {
        self.inner.list_known_methods()
    }
}

#[test]
fn method_removed_between_check_and_write_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (a, b) = seed(&conn);
    let svc = CommunicationService::new(
        SqliteCompanyRepository::new(&conn),
        RuleRemovedAfterCheck {
            inner: SqliteCadenceRepository::new(&conn),
        },
        SqliteCommunicationRepository::new(&conn),
    );

    let err = svc
        .log_communication(&request(&[a, b], "email", date(3, 1)), date(3, 1))
        .unwrap_err();
    let (field, reason) = expect_validation(err);
    assert_eq!(field, "method");
    assert!(reason.contains("email"));
    assert_eq!(history_len(&conn, a), 0);
    assert_eq!(history_len(&conn, b), 0);
}
