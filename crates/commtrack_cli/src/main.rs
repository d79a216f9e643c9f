//! Operator CLI for the CommTrack core.
//!
//! # Responsibility
//! - Seed master data (companies, cadences) and log communications.
//! - Print the notification feed and history views as JSON.
//! - Resolve "today" from the local clock; core never reads it.

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use commtrack_core::db::open_db;
use commtrack_core::{
    init_logging, CadenceRepository, CadenceScope, CommunicationMethodRule, CommunicationService,
    Company, CompanyId, CompanyRepository, DueStatusService, FeedOptions,
    LogCommunicationRequest, SqliteCadenceRepository, SqliteCommunicationRepository,
    SqliteCompanyRepository,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "commtrack", version, about = "Track recurring company communications")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "COMMTRACK_DB_PATH", default_value = "commtrack.sqlite3")]
    db: PathBuf,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "COMMTRACK_LOG_DIR")]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify core linkage.
    Ping,
    /// Print overdue, due-today and upcoming companies.
    Feed {
        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Classification worker threads.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Log one communication for one or more companies.
    Log(LogArgs),
    /// Register a company.
    AddCompany {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        /// First due date while nothing is logged. Defaults to today.
        #[arg(long)]
        anchor: Option<NaiveDate>,
    },
    /// Replace the cadence of a category or a single company.
    SetCadence(CadenceArgs),
    /// Deactivate a company; its history is kept.
    Deactivate {
        #[arg(long)]
        company: CompanyId,
    },
    /// Print the latest communications of a company.
    History {
        #[arg(long)]
        company: CompanyId,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List the methods a communication can be logged with.
    Methods,
    /// Print communication counts per method within a date range.
    Report {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Company id; repeat for several companies.
    #[arg(long = "company", required = true)]
    companies: Vec<CompanyId>,
    #[arg(long)]
    method: String,
    /// Date of the communication. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, default_value = "")]
    notes: String,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false, id = "scope")]
struct CadenceTarget {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    company: Option<CompanyId>,
}

#[derive(Debug, Args)]
struct CadenceArgs {
    #[command(flatten)]
    target: CadenceTarget,
    /// Rule as `method:interval_days`, in cadence order. Repeatable.
    #[arg(long = "rule", required = true, value_parser = parse_rule)]
    rules: Vec<(String, u32)>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(&commtrack_core::configured_log_level(), log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Command::Ping = cli.command {
        println!("commtrack_core ping={}", commtrack_core::ping());
        println!("commtrack_core version={}", commtrack_core::core_version());
        return Ok(());
    }

    let conn = open_db(&cli.db).map_err(|err| format!("cannot open {}: {err}", cli.db.display()))?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Ping => Ok(()),
        Command::Feed { as_of, workers } => {
            let mut options = FeedOptions::default();
            if let Some(workers) = workers {
                options.workers = workers;
            }
            let feed = due_status_service(&conn)
                .build_feed(as_of.unwrap_or(today), &options)
                .map_err(|err| err.to_string())?;
            print_json(&feed)
        }
        Command::Log(args) => {
            let request = LogCommunicationRequest {
                company_ids: args.companies,
                method: args.method,
                date: args.date.unwrap_or(today),
                notes: args.notes,
            };
            let events = communication_service(&conn)
                .log_communication(&request, today)
                .map_err(|err| err.to_string())?;
            print_json(&events)
        }
        Command::AddCompany {
            name,
            category,
            anchor,
        } => {
            let company = Company::new(name, category, anchor.unwrap_or(today));
            SqliteCompanyRepository::new(&conn)
                .create_company(&company)
                .map_err(|err| err.to_string())?;
            print_json(&company)
        }
        Command::SetCadence(args) => {
            let scope = match (args.target.category, args.target.company) {
                (Some(category), _) => CadenceScope::category(&category),
                (None, Some(company)) => CadenceScope::Company(company),
                (None, None) => return Err("either --category or --company is required".into()),
            };
            let rules: Vec<_> = args
                .rules
                .iter()
                .zip(1u32..)
                .map(|((method, interval), sequence)| {
                    CommunicationMethodRule::new(method, sequence, *interval)
                })
                .collect();
            SqliteCadenceRepository::new(&conn)
                .replace_rules(&scope, &rules)
                .map_err(|err| err.to_string())?;
            print_json(&rules)
        }
        Command::Deactivate { company } => SqliteCompanyRepository::new(&conn)
            .set_company_active(company, false)
            .map_err(|err| err.to_string()),
        Command::History { company, limit } => {
            let recent = communication_service(&conn)
                .recent_communications(company, limit)
                .map_err(|err| err.to_string())?;
            print_json(&recent)
        }
        Command::Methods => {
            let methods = SqliteCadenceRepository::new(&conn)
                .list_known_methods()
                .map_err(|err| err.to_string())?;
            print_json(&methods)
        }
        Command::Report { from, to } => {
            let counts = communication_service(&conn)
                .method_frequency(from, to)
                .map_err(|err| err.to_string())?;
            print_json(&counts)
        }
    }
}

fn due_status_service(
    conn: &Connection,
) -> DueStatusService<
    SqliteCompanyRepository<'_>,
    SqliteCadenceRepository<'_>,
    SqliteCommunicationRepository<'_>,
> {
    DueStatusService::new(
        SqliteCompanyRepository::new(conn),
        SqliteCadenceRepository::new(conn),
        SqliteCommunicationRepository::new(conn),
    )
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

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn parse_rule(raw: &str) -> Result<(String, u32), String> {
    let (method, interval) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected `method:interval_days`, got `{raw}`"))?;
    let interval = interval
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid interval in `{raw}`"))?;
    Ok((method.trim().to_string(), interval))
}
