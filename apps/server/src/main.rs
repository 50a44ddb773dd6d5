use std::time::Duration;

use anyhow::Context;
use campus_config::load as load_config;
use campus_gateway::{create_router, GatewayState, TokenAuthority};
use campus_messaging::Session;
use campus_runtime::{telemetry, BackendServices};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "campus-server")]
#[command(about = "Campus direct messaging server (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Print a bearer token for local testing
    IssueToken {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        company_id: Uuid,
        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Migrate => migrate().await,
        Commands::IssueToken {
            user_id,
            company_id,
            hours,
        } => issue_token(user_id, company_id, hours),
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Campus messaging server");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::from_config(&config, services.db_pool.clone());
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(campus_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("server shut down");
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to apply migrations")?;

    services.db_pool.close().await;
    info!(url = %config.database.url, "migrations applied");
    Ok(())
}

fn token_lifetime(hours: u64) -> anyhow::Result<Duration> {
    hours
        .checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("--hours {hours} is too large"))
}

fn issue_token(user_id: Uuid, company_id: Uuid, hours: u64) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let authority = TokenAuthority::from_config(&config.auth);

    let session = Session {
        user_id,
        company_id,
    };
    let token = authority
        .issue(&session, token_lifetime(hours)?)
        .context("failed to issue token")?;

    println!("{token}");
    Ok(())
}
