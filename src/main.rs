use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use marquee::compare::{CompareOptions, Comparator, ComparisonReport};
use marquee::config::{Config, LoggingConfig};
use marquee::error::Result;
use marquee::seed::{self, SeedOptions};
use marquee::server::routes::build_router;
use marquee::server::AppState;
use marquee::store::MongoStore;
use marquee::timing::SystemClock;
use marquee::types::QuerySpec;

#[derive(Debug, Parser)]
#[command(name = "marquee", version, about = "Index comparison diagnostics for the movie analytics store")]
struct Cli {
    /// Path to a TOML config file (defaults to $MARQUEE_CONFIG or ./marquee.toml).
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the diagnostics HTTP API.
    Serve,
    /// Run one before/after index comparison and print the result.
    Compare(CompareArgs),
    /// Insert synthetic movies for building a test dataset.
    Seed(SeedArgs),
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// Create the demo collection from the source if it does not exist.
    #[arg(long)]
    copy: bool,
    /// Drop the created index after measuring.
    #[arg(long)]
    drop_index_after: bool,
    #[arg(long)]
    runs: Option<usize>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    min_year: Option<i64>,
    /// Measure the source collection if the demo copy cannot be made.
    #[arg(long)]
    fallback_to_source: bool,
    /// Print the full JSON report instead of the summary table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SeedArgs {
    #[arg(long, default_value_t = 5000)]
    count: usize,
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Target collection (defaults to the configured source collection).
    #[arg(long)]
    collection: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load config first (needed for logging setup)
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&config.logging);
    marquee::metrics::init();

    if let Err(e) = run(cli.command, config).await {
        tracing::error!(error = %e, "marquee failed");
        eprintln!("error: {e}");
        for cause in e.causes().iter().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    let store = MongoStore::connect(&config.database).await?;

    match command {
        Command::Serve => serve(store, config).await,
        Command::Compare(args) => compare(&store, &config, args).await,
        Command::Seed(args) => {
            let collection = args
                .collection
                .unwrap_or_else(|| config.diagnostics.source_collection.clone());
            let options = SeedOptions {
                count: args.count,
                batch_size: args.batch_size,
                seed: args.seed,
            };
            let inserted = seed::seed_movies(&store, &collection, &options).await?;
            println!("inserted {inserted} movies into '{collection}'");
            Ok(())
        }
    }
}

async fn serve(store: MongoStore, config: Config) -> Result<()> {
    tracing::info!(database = store.database_name(), "marquee starting");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(AppState::new(Arc::new(store), config));

    tracing::info!(addr = %addr, "listening");
    let listener = TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn compare(store: &MongoStore, config: &Config, args: CompareArgs) -> Result<()> {
    let defaults = &config.diagnostics;
    let genre = args.genre.unwrap_or_else(|| defaults.default_genre.clone());
    let options = CompareOptions {
        copy_to_demo: args.copy,
        drop_index_after: args.drop_index_after,
        runs: args.runs.unwrap_or(defaults.default_runs),
        query: QuerySpec::movies(&genre, args.min_year.unwrap_or(defaults.default_min_year)),
        allow_source_fallback: args.fallback_to_source,
    };

    let clock = SystemClock::new();
    let report = Comparator::new(store, &clock, defaults).run(&options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &ComparisonReport) {
    if report.degraded {
        println!("warning: measured the source collection '{}'", report.collection);
    }
    if let Some(error) = report.explain_before.error() {
        println!("warning: explain (before) failed: {error}");
    }
    if let Some(error) = report.explain_after.error() {
        println!("warning: explain (after) failed: {error}");
    }
    println!("runtimes before (ms): {:?}", report.times_before.runs_ms());
    println!("runtimes after (ms):  {:?}", report.times_after.runs_ms());
    println!();

    let rows = report.summary_rows();
    let width = rows.iter().map(|(metric, _)| metric.len()).max().unwrap_or(0);
    for (metric, value) in rows {
        println!("{metric:<width$}  {value}");
    }
}
