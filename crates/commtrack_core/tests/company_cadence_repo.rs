use chrono::NaiveDate;
use commtrack_core::db::open_db_in_memory;
use commtrack_core::{
    CadenceRepository, CadenceScope, CadenceValidationError, CommunicationMethodRule, Company,
    CompanyRepository, RepoError, SqliteCadenceRepository, SqliteCompanyRepository,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn rule(method: &str, sequence: u32, interval_days: u32) -> CommunicationMethodRule {
    CommunicationMethodRule::new(method, sequence, interval_days)
}

#[test]
fn create_and_get_company_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCompanyRepository::new(&conn);

    let company = Company::new("Acme", "Enterprise", date(2024, 1, 15));
    let id = repo.create_company(&company).unwrap();

    let loaded = repo.get_company(id).unwrap().unwrap();
    assert_eq!(loaded, company);
    assert_eq!(loaded.category, "enterprise");
    assert_eq!(loaded.anchor_date, date(2024, 1, 15));
}

#[test]
fn blank_company_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCompanyRepository::new(&conn);

    let err = repo
        .create_company(&Company::new("  ", "smb", date(2024, 1, 1)))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidCompany(_)));
}

#[test]
fn list_companies_is_sorted_and_hides_inactive_by_default() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCompanyRepository::new(&conn);

    let beta = Company::new("Beta", "smb", date(2024, 1, 1));
    let alpha = Company::new("Alpha", "smb", date(2024, 1, 1));
    let gone = Company::new("Gone", "smb", date(2024, 1, 1));
    for company in [&beta, &alpha, &gone] {
        repo.create_company(company).unwrap();
    }
    repo.set_company_active(gone.id, false).unwrap();

    let active: Vec<_> = repo
        .list_companies(false)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(active, vec!["Alpha", "Beta"]);
    assert_eq!(repo.list_companies(true).unwrap().len(), 3);
}

#[test]
fn set_active_on_missing_company_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCompanyRepository::new(&conn);

    let missing = Uuid::new_v4();
    let err = repo.set_company_active(missing, false).unwrap_err();
    assert!(matches!(err, RepoError::CompanyNotFound(id) if id == missing));
}

#[test]
fn replace_rules_orders_by_sequence_and_replaces_previous_set() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCadenceRepository::new(&conn);
    let scope = CadenceScope::category("SMB");

    repo.replace_rules(&scope, &[rule("call", 2, 3), rule("Email", 1, 7)])
        .unwrap();
    let rules = repo.rules_for_scope(&scope).unwrap();
    let methods: Vec<_> = rules.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["email", "call"]);

    repo.replace_rules(&scope, &[rule("visit", 1, 30)]).unwrap();
    let rules = repo.rules_for_scope(&scope).unwrap();
    assert_eq!(rules, vec![rule("visit", 1, 30)]);
}

#[test]
fn invalid_rules_leave_existing_cadence_untouched() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCadenceRepository::new(&conn);
    let scope = CadenceScope::category("smb");

    repo.replace_rules(&scope, &[rule("email", 1, 7)]).unwrap();
    let err = repo
        .replace_rules(&scope, &[rule("call", 1, 3), rule("visit", 1, 0)])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidCadence(CadenceValidationError::ZeroInterval { .. })
    ));
    assert_eq!(repo.rules_for_scope(&scope).unwrap(), vec![rule("email", 1, 7)]);
}

#[test]
fn company_rules_override_category_rules() {
    let conn = open_db_in_memory().unwrap();
    let companies = SqliteCompanyRepository::new(&conn);
    let cadences = SqliteCadenceRepository::new(&conn);

    let plain = Company::new("Plain", "smb", date(2024, 1, 1));
    let custom = Company::new("Custom", "smb", date(2024, 1, 1));
    companies.create_company(&plain).unwrap();
    companies.create_company(&custom).unwrap();

    cadences
        .replace_rules(&CadenceScope::category("smb"), &[rule("email", 1, 7)])
        .unwrap();
    cadences
        .replace_rules(
            &CadenceScope::Company(custom.id),
            &[rule("call", 1, 2), rule("visit", 2, 14)],
        )
        .unwrap();

    assert_eq!(
        cadences.resolve_rules(&plain).unwrap(),
        vec![rule("email", 1, 7)]
    );
    assert_eq!(
        cadences.resolve_rules(&custom).unwrap(),
        vec![rule("call", 1, 2), rule("visit", 2, 14)]
    );
}

#[test]
fn company_scope_requires_existing_company() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCadenceRepository::new(&conn);

    let missing = Uuid::new_v4();
    let err = repo
        .replace_rules(&CadenceScope::Company(missing), &[rule("email", 1, 7)])
        .unwrap_err();
    assert!(matches!(err, RepoError::CompanyNotFound(id) if id == missing));
}

#[test]
fn known_methods_span_all_scopes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCadenceRepository::new(&conn);

    repo.replace_rules(&CadenceScope::category("smb"), &[rule("email", 1, 7)])
        .unwrap();
    repo.replace_rules(
        &CadenceScope::category("enterprise"),
        &[rule("call", 1, 3), rule("email", 2, 7)],
    )
    .unwrap();

    assert!(repo.is_known_method(" EMAIL ").unwrap());
    assert!(repo.is_known_method("call").unwrap());
    assert!(!repo.is_known_method("fax").unwrap());
    assert_eq!(repo.list_known_methods().unwrap(), vec!["call", "email"]);
}
