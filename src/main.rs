use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_records::models::DATE_FORMAT;
use student_records::report;
use student_records::repository::open_repository;
use student_records::transfer::{self, ImportSummary};
use student_records::worker::JobRunner;
use student_records::{
    validate, AppConfig, BackendKind, Gender, RepositoryError, RosterQuery, SortKey,
    StudentRecord,
};

#[derive(Parser)]
#[command(name = "student-records")]
#[command(about = "Student roster records: CSV import/export, queries and statistics", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = "STUDENT_RECORDS_CONFIG")]
    config: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    /// JSON roster file for the file backend
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Database URL for the sql backend
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data file or database schema
    InitDb,
    /// Import students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Skip validation before saving (the store still rejects invalid records)
        #[arg(long)]
        no_validate: bool,
        /// Overwrite students whose id already exists
        #[arg(long)]
        replace: bool,
    },
    /// Export students to a CSV file
    Export {
        #[arg(long, default_value = "students_export.csv")]
        out: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// List students
    List {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show one student
    Show { id: String },
    /// Add a student, or replace one with --update
    Add {
        #[command(flatten)]
        student: StudentArgs,
        #[arg(long)]
        update: bool,
    },
    /// Delete a student by id
    Delete { id: String },
    /// Parse and validate a CSV file without saving anything
    Validate {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Roster statistics
    Stats {
        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
        /// Write the Markdown report to a file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Substring of id, name, class or major
    #[arg(long)]
    keyword: Option<String>,
    #[arg(long = "class")]
    class_name: Option<String>,
    #[arg(long)]
    major: Option<String>,
    #[arg(long, value_parser = parse_gender)]
    gender: Option<Gender>,
    #[arg(long)]
    min_gpa: Option<f64>,
    #[arg(long)]
    max_gpa: Option<f64>,
    #[arg(long, value_enum, default_value_t = SortKey::Id)]
    sort: SortKey,
    #[arg(long)]
    desc: bool,
    #[arg(long)]
    limit: Option<usize>,
}

impl From<QueryArgs> for RosterQuery {
    fn from(args: QueryArgs) -> Self {
        RosterQuery {
            keyword: args.keyword,
            class_name: args.class_name,
            major: args.major,
            gender: args.gender,
            min_gpa: args.min_gpa,
            max_gpa: args.max_gpa,
            sort: args.sort,
            descending: args.desc,
            limit: args.limit,
        }
    }
}

#[derive(Args)]
struct StudentArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    /// dd/MM/yyyy
    #[arg(long, value_parser = parse_date)]
    birth_date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_gender)]
    gender: Gender,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long)]
    phone: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long = "class")]
    class_name: String,
    #[arg(long, default_value = "")]
    major: String,
    #[arg(long, default_value_t = 0.0)]
    gpa: f64,
}

impl From<StudentArgs> for StudentRecord {
    fn from(args: StudentArgs) -> Self {
        StudentRecord {
            id: args.id,
            full_name: args.name,
            birth_date: args.birth_date,
            gender: args.gender,
            address: args.address,
            phone: args.phone,
            email: args.email,
            class_name: args.class_name,
            major: args.major,
            gpa: args.gpa,
        }
    }
}

fn parse_gender(s: &str) -> Result<Gender, String> {
    Gender::parse(s).ok_or_else(|| format!("Unsupported gender: '{s}'. Supported: Male, Female"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| format!("Invalid date '{s}', expected dd/MM/yyyy"))
}

fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(data_file) = &cli.data_file {
        config.data_file = data_file.clone();
    }
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Imported: {}, Failed: {}, Duplicate: {}, Replaced: {} ({} rows processed)",
        summary.success,
        summary.failure,
        summary.duplicate,
        summary.replaced,
        summary.total_processed()
    );
    for message in &summary.messages {
        println!("- {message}");
    }
    for warning in &summary.warnings {
        println!("! {warning}");
    }
}

fn print_record(record: &StudentRecord) {
    println!(
        "{:<10} {:<28} {:<10} {:<6} {:<8} {:<12} {:.2} {}",
        record.id,
        record.full_name,
        record.birth_date_text(),
        record.gender,
        record.class_name,
        record.major,
        record.gpa,
        record.academic_rank()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_records=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let repository = open_repository(&config)
        .await
        .context("failed to open student storage")?;
    info!("Using {:?} backend", config.backend);

    match cli.command {
        Commands::InitDb => {
            repository.commit().await?;
            println!("Storage ready.");
        }
        Commands::Import {
            csv,
            no_validate,
            replace,
        } => {
            let mut options = config.import;
            if no_validate {
                options.validate_before_save = false;
            }
            if replace {
                options.replace_existing = true;
            }
            let runner = JobRunner::spawn(repository.clone());
            let summary = runner
                .import(csv.clone(), options)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            print_summary(&summary);
        }
        Commands::Export { out, query } => {
            let runner = JobRunner::spawn(repository.clone());
            if !runner.export(out.clone(), query.into()).await? {
                bail!("failed to export to {}", out.display());
            }
            println!("Exported to {}.", out.display());
        }
        Commands::List { query } => {
            let records = repository.search(&query.into()).await?;
            if records.is_empty() {
                println!("No students found.");
                return Ok(());
            }
            for record in &records {
                print_record(record);
            }
            println!("{} students.", records.len());
        }
        Commands::Show { id } => match repository.find_by_id(&id).await? {
            Some(record) => {
                println!("Id:         {}", record.id);
                println!("Name:       {}", record.full_name);
                println!("Birth date: {}", record.birth_date_text());
                println!("Gender:     {}", record.gender);
                println!("Address:    {}", record.address);
                println!("Phone:      {}", record.phone);
                println!("Email:      {}", record.email);
                println!("Class:      {}", record.class_name);
                println!("Major:      {}", record.major);
                println!("GPA:        {:.2} ({})", record.gpa, record.academic_rank());
            }
            None => bail!("no student with id {id}"),
        },
        Commands::Add { student, update } => {
            let record = StudentRecord::from(student);
            if !update && repository.exists_by_id(&record.id).await? {
                bail!("student {} already exists (use --update to replace)", record.id);
            }
            for warning in validate(&record).warnings {
                println!("! {warning}");
            }
            match repository.save(&record).await {
                Ok(_) => {}
                Err(RepositoryError::Invalid(errors)) => {
                    bail!("student {} rejected:\n- {}", record.id, errors.join("\n- "));
                }
                Err(err) => return Err(err.into()),
            }
            repository.commit().await?;
            println!("Saved {record}.");
        }
        Commands::Delete { id } => {
            if !repository.delete_by_id(&id).await? {
                bail!("no student with id {id}");
            }
            repository.commit().await?;
            println!("Deleted {id}.");
        }
        Commands::Validate { csv } => {
            let summary = transfer::check_csv(&csv)
                .await
                .with_context(|| format!("failed to read {}", csv.display()))?;
            print_summary(&summary);
            if summary.has_errors() {
                bail!("{} rows in {} would fail to import", summary.failure, csv.display());
            }
        }
        Commands::Stats { json, out } => {
            let runner = JobRunner::spawn(repository.clone());
            let stats = runner.statistics().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            let top = repository.top_by_gpa(5).await?;
            let text = report::build_report(&stats, &top);
            match out {
                Some(path) => {
                    tokio::fs::write(&path, text)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{text}"),
            }
        }
    }

    Ok(())
}
