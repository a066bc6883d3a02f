use anyhow::{Context, Result};
use clap::Parser;
use forward_proxy::{
    Config, Dispatcher,
    config::{DEFAULT_CONFIG_FILE, load_config},
    serve,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults apply when `config.toml` is absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. `:8888` or `127.0.0.1:3128`
    #[arg(short, long)]
    address: Option<String>,

    /// Log full request bodies (buffers each body in memory)
    #[arg(long)]
    log_request_body: bool,

    /// Log full response bodies (buffers each body in memory)
    #[arg(long)]
    log_response_body: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    load_config(&path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(address) = self.address {
            config.address = address;
        }
        config.log_request_body |= self.log_request_body;
        config.log_response_body |= self.log_response_body;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config()?;
    let denied = config.denied_key_set()?;
    info!(
        address = %config.address,
        log_request_body = config.log_request_body,
        log_response_body = config.log_response_body,
        denied_headers = ?denied.iter().map(|name| name.as_str()).collect::<Vec<_>>(),
        "Configuration loaded"
    );

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;

    let dispatcher = Dispatcher::new(Arc::new(config), Arc::new(denied));
    serve(listener, dispatcher, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}
