use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use sql_conduit::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one statement through a sql-conduit pool and print JSON")]
struct Args {
    /// SQL to run.
    sql: String,
    /// JSON config file (`{"connector": {...}, "pool": {...}}`); flags override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    pool_size: Option<usize>,
    #[arg(long)]
    acquire_timeout_ms: Option<u64>,
    /// Positional parameters; integers, reals and `null` are recognised, the rest bind as text.
    #[arg(long = "param")]
    params: Vec<String>,
    /// Treat the statement as an update and print the affected rows and keys.
    #[arg(long)]
    update: bool,
    /// Run inside a transaction at this level and commit it.
    #[arg(long, value_enum)]
    isolation: Option<IsolationLevel>,
    /// Print pool counters after the statement.
    #[arg(long)]
    stats: bool,
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn parse_param(raw: &str) -> RowValues {
    if raw.eq_ignore_ascii_case("null") {
        RowValues::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        RowValues::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        RowValues::Float(f)
    } else {
        RowValues::Text(raw.to_owned())
    }
}

fn load_config(args: &Args) -> Result<ConduitConfig, SqlConduitError> {
    let mut config = match &args.config {
        Some(path) => ConduitConfig::from_file(path)?,
        None => ConduitConfig::default(),
    };
    if let Some(url) = &args.url {
        config.connector.url.clone_from(url);
    }
    if let Some(size) = args.pool_size {
        config.pool.size = size;
    }
    if let Some(ms) = args.acquire_timeout_ms {
        config.pool = config.pool.with_acquire_timeout(Duration::from_millis(ms));
    }
    Ok(config)
}

fn run_statement(
    conn: &impl SqlCallable,
    sql: &str,
    params: &[RowValues],
    update: bool,
) -> Result<SqlResult, SqlConduitError> {
    if update {
        conn.get_update_result(sql, params)
    } else {
        conn.get_result(sql, params)
    }
}

fn run(args: &Args) -> Result<(), SqlConduitError> {
    let config = load_config(args)?;
    let pool = config.build_pool()?;
    let params: Vec<RowValues> = args.params.iter().map(|p| parse_param(p)).collect();

    let result = match args.isolation {
        Some(level) => pool.start_transaction_and(level, |tx| {
            let result = run_statement(tx, &args.sql, &params, args.update)?;
            tx.commit()?;
            Ok::<_, SqlConduitError>(result)
        })?,
        None => pool.get_connection_and(|conn| {
            run_statement(&**conn, &args.sql, &params, args.update)
        })?,
    };

    let mut output = serde_json::json!({ "result": result.to_json() });
    if args.stats {
        output["pool"] = serde_json::to_value(pool.stats())?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    pool.close();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(Level::from(args.log_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "statement failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
