//! porthole-server: a dashboard of everything listening on this
//! machine.
//!
//! Serves the dashboard page and a JSON API; each API request runs one
//! discovery pass over the local listening sockets.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use porthole_core::enumerate::PortEnumerator;
use porthole_core::probe::WebProbe;
use porthole_core::ServiceDiscovery;

mod routes;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "porthole-server")]
#[command(about = "Dashboard of services listening on this machine")]
struct Cli {
    /// Listen port for the dashboard itself
    #[arg(short, long)]
    port: Option<u16>,

    /// Host name used in browser-side service links
    #[arg(long)]
    host: Option<String>,

    /// Address to bind the dashboard to
    #[arg(long)]
    bind: Option<String>,

    /// Config file prefix (default: porthole)
    #[arg(short, long, default_value = "porthole")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(host) = cli.host {
        settings.host = Some(host);
    }
    if let Some(bind) = cli.bind {
        settings.bind = bind;
    }

    let display_host = settings.display_host();
    tracing::info!(
        os = std::env::consts::OS,
        port = settings.port,
        host = %display_host,
        workers = settings.workers,
        "Starting porthole"
    );

    let probe = WebProbe::new()?;
    let discovery = ServiceDiscovery::new(PortEnumerator::new(), probe, settings.port)
        .with_workers(settings.workers);

    let state = routes::AppState {
        discovery: Arc::new(discovery),
        display_host,
        deadline: Duration::from_secs(settings.deadline_secs),
    };
    let app = routes::router(state);

    let addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Dashboard listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Layer `<prefix>.toml` (optional) under plain environment variables.
/// An unusable config degrades to defaults; the dashboard comes up
/// regardless.
fn load_settings(file_prefix: &str) -> Settings {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(config::Environment::default().try_parsing(true))
        .build();

    match cfg.and_then(|c| c.try_deserialize()) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "Configuration unusable, using defaults");
            Settings::default()
        }
    }
}
