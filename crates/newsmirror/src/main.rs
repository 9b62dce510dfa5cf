mod news;
mod server;
mod telemetry;

use anyhow::Context;
use clap::{Parser, Subcommand};
use newsmirror_core::config::{Config, MongoTarget};
use newsmirror_store::Store;
use tokio::net::TcpListener;

use crate::server::AppState;

#[derive(Parser, Debug)]
#[command(name = "newsmirror")]
#[command(about = "DEV.to news proxy that keeps its own logs, traces and metrics in MongoDB")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Serve /health and /news")]
    Serve {
        #[arg(long, help = "Overrides NEWS_BIND_ADDR")]
        bind_addr: Option<String>,
    },
    #[command(about = "Ping the telemetry database and exit")]
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load().context("load configuration")?;

    match cli.command.unwrap_or(Commands::Serve { bind_addr: None }) {
        Commands::Serve { bind_addr } => run_server(cfg, bind_addr).await,
        Commands::Check => run_check(cfg).await,
    }
}

async fn run_server(cfg: Config, bind_addr: Option<String>) -> anyhow::Result<()> {
    let telemetry = telemetry::init(&cfg).await;
    let state = AppState::new(&cfg, &telemetry.meter())?;

    let addr = bind_addr.unwrap_or_else(|| cfg.bind_addr.clone());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        persisting = telemetry.is_persisting(),
        "news service listening"
    );

    let served = axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server");

    tracing::info!("shutting down");
    telemetry.shutdown().await;
    served
}

async fn run_check(cfg: Config) -> anyhow::Result<()> {
    telemetry::init_cli_tracing(&cfg);

    let target = match cfg.mongo.target() {
        MongoTarget::Uri(_) => "MONGO_URI".to_string(),
        MongoTarget::Host { host, port, .. } => format!("{host}:{port}"),
    };
    let store = Store::connect(&cfg.mongo)
        .await
        .with_context(|| format!("telemetry database at {target}"))?;

    println!("target={target}");
    println!("db={}", store.db_name());
    println!(
        "collections={},{},{}",
        cfg.mongo.log_collection, cfg.mongo.trace_collection, cfg.mongo.metric_collection
    );
    println!("status=ok");
    store.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
