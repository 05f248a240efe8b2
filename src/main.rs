//! sqinn-cli - run SQL against a database through sqinn.
//!
//! ```text
//! sqinn-cli versions
//! sqinn-cli exec  app.db "CREATE TABLE t (a INTEGER, b TEXT)"
//! sqinn-cli exec  app.db "INSERT INTO t VALUES (?, ?)" --iterations 2 --params '[1, "x", 2, "y"]'
//! sqinn-cli query app.db "SELECT a, b FROM t WHERE a > ?" --types int,text --params '[0]'
//! ```
//!
//! Query rows are printed to stdout as one JSON array per line. Logs, including
//! sqinn's own stderr, go to stderr and are filtered with `RUST_LOG`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqinn_client::{Options, Sqinn, TracingLogger, Value, ValueType};

#[derive(Debug, Parser)]
#[command(name = "sqinn-cli", version, about = "Run SQL through a sqinn child process")]
struct Cli {
    /// Path to the sqinn executable [default: $SQINN_PATH, then `sqinn`]
    #[arg(long, global = true)]
    sqinn_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print sqinn, protocol and SQLite versions.
    Versions,

    /// Execute a statement and print the modified row count per iteration.
    Exec {
        /// Database file, or `:memory:`.
        db: String,
        sql: String,
        /// Bind parameters as a JSON array, iteration after iteration.
        #[arg(long)]
        params: Option<String>,
        /// How often to run the statement.
        #[arg(long, default_value_t = 1)]
        iterations: i32,
    },

    /// Run a query and print all rows as JSON.
    Query {
        /// Database file, or `:memory:`.
        db: String,
        sql: String,
        /// Column types in order: null, int, int64, double, text, blob.
        #[arg(long, value_delimiter = ',')]
        types: Vec<ValueType>,
        /// Bind parameters as a JSON array.
        #[arg(long)]
        params: Option<String>,
    },
}

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "sqinn_cli=info,sqinn=info";

fn parse_params(params: Option<&str>) -> Result<Vec<Value>> {
    let Some(json) = params else {
        return Ok(Vec::new());
    };
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(json).context("--params must be a JSON array")?;
    raw.into_iter()
        .map(|v| Value::try_from(v).map_err(anyhow::Error::from))
        .collect()
}

async fn run(sq: &Sqinn, command: Command) -> Result<()> {
    match command {
        Command::Versions => {
            println!("sqinn   {}", sq.sqinn_version().await?);
            println!("io      {}", sq.io_version().await?);
            println!("sqlite  {}", sq.sqlite_version().await?);
        }
        Command::Exec {
            db,
            sql,
            params,
            iterations,
        } => {
            let values = parse_params(params.as_deref())?;
            let nparams = if iterations > 0 {
                values.len() as i32 / iterations
            } else {
                0
            };
            sq.open(&db).await.with_context(|| format!("Failed to open {}", db))?;
            let result = sq.exec(&sql, iterations, nparams, &values).await;
            sq.close().await?;
            for changes in result? {
                println!("{}", changes);
            }
        }
        Command::Query {
            db,
            sql,
            types,
            params,
        } => {
            let values = parse_params(params.as_deref())?;
            sq.open(&db).await.with_context(|| format!("Failed to open {}", db))?;
            let result = sq.query(&sql, &values, &types).await;
            sq.close().await?;
            for row in result? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut options = Options::from_env().logger(TracingLogger);
    if let Some(path) = cli.sqinn_path {
        options = options.sqinn_path(path);
    }

    let sq = Sqinn::launch(options).context("Failed to launch sqinn")?;
    let result = run(&sq, cli.command).await;
    let terminated = sq.terminate().await.context("Failed to terminate sqinn");

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result.and(terminated)
}
