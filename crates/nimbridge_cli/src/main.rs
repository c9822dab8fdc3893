use anyhow::Context;
use clap::Parser;
use nimbridge_core::ProxyConfig;
use nimbridge_gateway::{GatewayServer, UpstreamClient};
use nimbridge_rules::{InjectionEngine, RuleCatalog, SessionState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nimbridge", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config/nimbridge.toml")]
    config: PathBuf,

    /// Rule catalog JSON (overrides [rules] path)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Bind host (overrides [server] host)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides [server] port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = ProxyConfig::load_or_default(&args.config);
    if let Some(rules) = args.rules {
        config.rules.path = Some(rules);
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let state = SessionState::new();
    let catalog = match &config.rules.path {
        Some(path) => RuleCatalog::load_file(path, &state)
            .with_context(|| format!("Failed to load rule sets from {}", path.display()))?,
        None => {
            warn!("No rule catalog configured; requests are forwarded unchanged");
            RuleCatalog::new()
        }
    };
    info!(
        "Loaded {} rule set(s), {} enabled",
        catalog.len(),
        catalog.list().iter().filter(|r| r.enabled).count()
    );
    let engine = Arc::new(InjectionEngine::new(catalog, state));

    let upstream = UpstreamClient::new(&config.upstream)?;
    let server = GatewayServer::new(
        engine,
        upstream,
        config.models,
        &config.server.host,
        config.server.port,
    );

    info!("Starting nimbridge...");
    let handle = server.start().await?;
    handle.await.context("Gateway task failed")?;
    Ok(())
}
