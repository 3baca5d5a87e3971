use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kpi_tracker::api::{self, state::AppState};
use kpi_tracker::calculate;
use kpi_tracker::config::{AppConfig, StoreBackend};
use kpi_tracker::export::{self, EXPORT_FILE_NAME};
use kpi_tracker::models::{
    hash_password, DateRange, ManagerAccount, RankedResult, StoreAccount, TallyInput, TallyPatch,
    SignupTally,
};
use kpi_tracker::storage::{open_backend, JsonlStore, StorageConfig};

#[derive(Parser)]
#[command(name = "kpi-tracker")]
#[command(about = "Retail signup KPI tracker and regional dashboard")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Log all HTTP requests
        #[arg(long)]
        access_log: bool,
    },

    /// Strike rate and additional yes signups for a tally
    Calc {
        #[arg(long)]
        yes: u32,

        #[arg(long)]
        no: u32,

        /// Target strike rate in percent
        #[arg(long)]
        target: Option<f64>,
    },

    /// Fetch, rank and print submissions
    Rank {
        /// Range start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Range end (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Only print the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write ranked submissions to a CSV file
    Export {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value = EXPORT_FILE_NAME)]
        out: PathBuf,
    },

    /// Print the digest stored in a directory row's password_hash
    HashPassword { password: String },

    /// Add or replace a store in the local directory
    AddStore {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,
    },

    /// Add or replace a manager in the local directory
    AddManager {
        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        region: Option<String>,
    },

    /// Print the effective configuration as TOML
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(Some(cli.config.as_path()))
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting kpi-tracker v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            host,
            port,
            access_log,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.server.access_log |= access_log;
            config.validate()?;

            let backend = open_backend(&config.store)?;
            tracing::info!("Record store: {}", backend.records.name());
            let state = AppState::new(backend, config.tracker.default_target_rate);
            let app = api::with_server_layers(api::build_router(state), &config.server)
                .context("Invalid CORS origin")?;

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Calc { yes, no, target } => {
            let target = target.unwrap_or(config.tracker.default_target_rate);
            let mut input = TallyInput::empty();
            input.apply(&TallyPatch::from_tally(&SignupTally::new(yes, no, target)))?;
            let feedback = calculate::evaluate(&input.require_complete()?);

            println!("Strike rate:     {:.2}%", feedback.strike_rate);
            println!("Target:          {:.2}%", feedback.target_rate);
            println!("Additional YES:  {}", feedback.additional_yes_needed);
            println!("{}", feedback.message);
            if let Some(hint) = feedback.hint {
                println!("{}", hint);
            }
        }
        Commands::Rank { start, end, limit } => {
            let ranked = fetch_ranked(&config, start.as_deref(), end.as_deref()).await?;
            print_ranked(&ranked, limit);
        }
        Commands::Export { start, end, out } => {
            let ranked = fetch_ranked(&config, start.as_deref(), end.as_deref()).await?;
            let file = File::create(&out)
                .with_context(|| format!("Failed to create {:?}", out))?;
            export::write_csv(&ranked.rows, BufWriter::new(file))?;
            tracing::info!("Exported {} rows to {:?}", ranked.rows.len(), out);
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password));
        }
        Commands::AddStore { id, name, password } => {
            let store = local_directory(&config)?;
            store
                .upsert_store(StoreAccount::new(id, name, &password))
                .await?;
        }
        Commands::AddManager {
            name,
            password,
            region,
        } => {
            let store = local_directory(&config)?;
            let mut account = ManagerAccount::new(name.clone(), name, &password);
            if let Some(region) = region {
                account = account.with_region(region);
            }
            store.upsert_manager(account).await?;
        }
        Commands::PrintConfig => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn fetch_ranked(
    config: &AppConfig,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<RankedResult> {
    let range = DateRange::parse(start, end)?;
    let backend = open_backend(&config.store)?;
    let records = backend
        .records
        .fetch(&range)
        .await
        .context("Error fetching KPI submissions")?;
    tracing::debug!("Fetched {} records from {}", records.len(), backend.records.name());
    Ok(calculate::rank_in(&records, &range))
}

fn local_directory(config: &AppConfig) -> Result<JsonlStore> {
    if config.store.backend != StoreBackend::Jsonl {
        bail!("Directory rows can only be added to the jsonl backend");
    }
    Ok(JsonlStore::new(StorageConfig::new(config.store.data_dir.clone())))
}

fn print_ranked(ranked: &RankedResult, limit: Option<usize>) {
    if ranked.is_empty() {
        println!("No submissions found.");
        return;
    }

    println!(
        "{:>4}  {:<24} {:>5} {:>5} {:>9} {:>9} {:>9} {:>6}",
        "Rank", "Store", "Yes", "No", "Rate %", "Target %", "Vs %", "Need"
    );
    let shown = limit.unwrap_or(ranked.rows.len());
    for row in ranked.rows.iter().take(shown) {
        println!(
            "{:>4}  {:<24} {:>5} {:>5} {:>9.2} {:>9.2} {:>+9.2} {:>6}",
            row.rank,
            row.store_name,
            row.yes_count,
            row.no_count,
            row.strike_rate,
            row.target_strike_rate,
            row.vs_target,
            row.additional_yes_needed
        );
    }

    let summary = &ranked.summary;
    println!();
    println!("Submissions:        {}", summary.total_submissions);
    println!("Total YES / NO:     {} / {}", summary.total_yes, summary.total_no);
    println!("Average strike:     {:.2}%", summary.average_strike_rate);
    println!("Meeting target:     {}", summary.stores_meeting_target);
    println!("Below target:       {}", summary.stores_below_target);
}
