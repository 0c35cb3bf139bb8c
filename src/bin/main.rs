//! bkquery CLI - compile query configs and plan event queries
//!
//! Usage:
//!   bkquery generate <config.json> [--dialect <dialect>]
//!   bkquery rewrite <query.sql> --namespace <ns>
//!   bkquery plan <request.json>
//!
//! Examples:
//!   bkquery generate users.json --dialect doris
//!   bkquery rewrite base.sql --namespace audit
//!   BKQUERY_LOG=debug bkquery plan request.json

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bkquery::bridge::convert_to_expression;
use bkquery::config::{Settings, StaticTableNames, TableNameStore};
use bkquery::planner::{EventQueryPlanner, EventQueryRequest};
use bkquery::rewrite::{collect_table_names, transform_table};
use bkquery::sql::Dialect;
use bkquery::{SqlConfig, SqlGenerator};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bkquery")]
#[command(about = "bkquery - compile declarative queries and plan event queries to SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $BKQUERY_CONFIG, ./bkquery.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL from a JSON query config
    Generate {
        /// Path to the JSON SqlConfig
        file: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "hive")]
        dialect: DialectArg,
    },

    /// Rewrite logical table names in a SELECT to their physical names
    Rewrite {
        /// Path to the SQL file
        file: PathBuf,

        /// Table-name namespace
        #[arg(short, long)]
        namespace: String,
    },

    /// Print the count and data SQL for an event query request
    Plan {
        /// Path to the JSON request
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Hive,
    Doris,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Hive => Dialect::Hive,
            DialectArg::Doris => Dialect::Doris,
        }
    }
}

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BKQUERY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { file, dialect } => cmd_generate(&file, dialect),
        Commands::Rewrite { file, namespace } => cmd_rewrite(cli.config.as_deref(), &file, &namespace),
        Commands::Plan { file } => cmd_plan(cli.config.as_deref(), &file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, Box<dyn Error>> {
    Ok(match path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    })
}

fn read(file: &Path) -> Result<String, Box<dyn Error>> {
    fs::read_to_string(file).map_err(|e| format!("reading '{}': {}", file.display(), e).into())
}

fn cmd_generate(file: &Path, dialect: DialectArg) -> CliResult {
    let config = SqlConfig::from_json(&read(file)?)?;
    let sql = SqlGenerator::new(dialect.into()).generate(&config)?;
    println!("{}", sql);
    Ok(())
}

fn cmd_rewrite(config: Option<&Path>, file: &Path, namespace: &str) -> CliResult {
    let settings = load_settings(config)?;
    let store = StaticTableNames::from_settings(&settings)?;
    let query = convert_to_expression(&read(file)?)?;

    let mut name_map = HashMap::new();
    for logical in collect_table_names(&query) {
        if let Some(physical) = store.resolve(&logical, namespace, None)? {
            name_map.insert(logical, physical);
        }
    }

    let query = transform_table(query, &name_map, &settings.planner.storage_suffixes)?;
    println!("{}", query);
    Ok(())
}

fn cmd_plan(config: Option<&Path>, file: &Path) -> CliResult {
    let settings = load_settings(config)?;
    let store = StaticTableNames::from_settings(&settings)?;
    let request: EventQueryRequest = serde_json::from_str(&read(file)?)?;

    let planner = EventQueryPlanner::new(&settings, &store)?;
    let components = planner.build_components(&request)?;
    let (limit, offset) = request.page.limit_offset();

    println!("-- count");
    println!("{};", components.count_sql());
    println!();
    println!("-- data");
    println!("{};", components.data_sql(limit, offset));
    Ok(())
}
