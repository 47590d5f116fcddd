use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use covid_sentiment_dashboard::api::{self, AppState};
use covid_sentiment_dashboard::dataset::resolve_data_dir;
use covid_sentiment_dashboard::models::{Technique, Topic};
use covid_sentiment_dashboard::report;
use covid_sentiment_dashboard::views;
use covid_sentiment_dashboard::{DashboardConfig, Dataset};

#[derive(Parser)]
#[command(name = "covid-sentiment-dashboard")]
#[command(about = "Data backend for the UK COVID-19 tweet sentiment dashboard", long_about = None)]
struct Cli {
    /// Directory holding the covid/, lockdown/, covid-data/, events/ and geojson/ tables
    #[arg(long, global = true, env = "DASHBOARD_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },
    /// Print the notable days and months for one technique
    Notable {
        #[arg(long, value_enum, default_value_t = Topic::Covid)]
        topic: Topic,
        #[arg(long, value_enum, default_value_t = Technique::Vader)]
        technique: Technique,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_enum, default_value_t = Topic::Covid)]
        topic: Topic,
        #[arg(long, value_enum, default_value_t = Technique::Vader)]
        technique: Technique,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

fn load(data_dir: &std::path::Path) -> anyhow::Result<Dataset> {
    let data_dir = resolve_data_dir(data_dir)?;
    Dataset::load(DashboardConfig::new(&data_dir))
        .with_context(|| format!("failed to load dashboard data from {}", data_dir.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "covid_sentiment_dashboard=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let dataset = load(&cli.data_dir)?;
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid bind address {host}:{port}"))?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            info!(%addr, "Dashboard API listening");
            axum::serve(listener, api::app(AppState::new(dataset)))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
        Commands::Notable { topic, technique } => {
            let dataset = load(&cli.data_dir)?;
            let records = views::notable_days(&dataset, topic, technique)?;

            println!("Notable periods for {topic} tweets ({technique}):");
            for record in &records {
                println!("- {}", report::format_notable(record));
            }
        }
        Commands::Report {
            topic,
            technique,
            out,
        } => {
            let dataset = load(&cli.data_dir)?;
            let report = report::build_report(&dataset, topic, technique)?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
