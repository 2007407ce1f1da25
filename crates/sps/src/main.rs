//! sps command-line tool.
//!
//! Inspects and runs list definitions:
//!   sps describe --definition countries.toml
//!   sps explain --definition countries.toml --request request.json
//!   sps run --definition countries.toml --request request.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sps::{
    BoundStatement, Config, ListDefinition, ListQuery, ListRequest, PgExecutor, Platform, db,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the filterable and sortable fields of a list.
    Describe {
        /// List definition file (JSON or TOML).
        #[arg(long)]
        definition: PathBuf,
    },
    /// Print the SQL and parameters a request compiles to.
    Explain {
        #[arg(long)]
        definition: PathBuf,

        /// Request file (JSON or TOML).
        #[arg(long)]
        request: PathBuf,
    },
    /// Run a request against PostgreSQL and print the page.
    Run {
        #[arg(long)]
        definition: PathBuf,

        #[arg(long)]
        request: PathBuf,
    },
}

/// Rendered statement with the type tag of every bound value.
#[derive(Serialize)]
struct ExplainedStatement {
    #[serde(flatten)]
    statement: BoundStatement,
    types: Vec<&'static str>,
}

impl ExplainedStatement {
    fn new(statement: BoundStatement, platform: Platform) -> Self {
        let types = statement.params.iter().map(|p| platform.type_tag(p)).collect();
        Self { statement, types }
    }
}

#[derive(Serialize)]
struct Explanation {
    platform: Platform,
    aggregated: bool,
    page: ExplainedStatement,
    count: Option<ExplainedStatement>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match args.command {
        Command::Describe { definition } => {
            let list = load_list(&definition, &config)?;
            print_json(&list.describe())
        }
        Command::Explain {
            definition,
            request,
        } => {
            let list = load_list(&definition, &config)?;
            let request: ListRequest = load_file(&request)?;
            let prepared = list
                .prepare(&request.filters, &request.sort)
                .context("failed to compile request")?;

            let items_per_page = request
                .page
                .items_per_page
                .unwrap_or(config.items_per_page);
            let page = prepared
                .page_statement(request.page.page, items_per_page)
                .context("invalid paging")?;
            let count = request
                .page
                .total_count
                .then(|| ExplainedStatement::new(prepared.count_statement(), list.platform()));

            print_json(&Explanation {
                platform: list.platform(),
                aggregated: prepared.is_aggregated(),
                page: ExplainedStatement::new(page, list.platform()),
                count,
            })
        }
        Command::Run {
            definition,
            request,
        } => {
            let list = load_list(&definition, &config)?;
            if list.platform() != Platform::Postgres {
                anyhow::bail!("run only supports postgresql, list targets {}", list.platform());
            }
            let request: ListRequest = load_file(&request)?;

            let pool = db::create_pool(&config).await?;
            if !db::check_health(&pool).await {
                anyhow::bail!("database health check failed");
            }
            info!("Database connection established");

            let mut executor = PgExecutor::new(pool);
            if let Some(timeout) = config.statement_timeout() {
                executor = executor.with_statement_timeout(timeout);
            }

            let result = list
                .get_result(&executor, &request)
                .await
                .context("list query failed")?;
            info!(rows = result.data.len(), "Query executed");
            print_json(&result)
        }
    }
}

fn load_list(path: &Path, config: &Config) -> Result<ListQuery> {
    let definition: ListDefinition = load_file(path)?;
    let list = ListQuery::from_definition(&definition, config.platform)
        .with_context(|| format!("invalid list definition {}", path.display()))?;
    Ok(list.with_limits(config.page_limits()))
}

/// Read a JSON or TOML file, chosen by extension.
fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
