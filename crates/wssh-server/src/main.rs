//! wssh-server: Web SSH bridge.
//!
//! Accepts browser WebSocket connections carrying an opaque connection
//! descriptor, establishes an interactive SSH shell session on the
//! described host, and bridges terminal bytes and control signals
//! between the two until failure or timeout.

mod bridge;
mod config;
mod server;
mod ssh;

use clap::{Parser, Subcommand};
use config::ServerConfig;
use server::WsshServer;
use std::path::PathBuf;
use tracing::{error, info};
use wssh_core::ConnectionDescriptor;

/// wssh-server — Web SSH bridge server
#[derive(Parser, Debug)]
#[command(name = "wssh-server", version, about = "Web SSH bridge server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.wssh/config.toml")]
    config: String,

    /// SSH connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Absolute session timeout in seconds
    #[arg(long)]
    session_timeout: Option<u64>,

    /// Output flush interval in milliseconds
    #[arg(long)]
    flush_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single command on the described host and print its combined output
    Exec {
        /// Opaque connection descriptor (base64 of JSON)
        sshinfo: String,
        /// Command line to execute remotely
        command: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    if let Some(Command::Exec { sshinfo, command }) = cli.command {
        let result = async {
            let descriptor = ConnectionDescriptor::decode(&sshinfo)?;
            ssh::exec_remote_command(&descriptor, &command).await
        }
        .await;
        match result {
            Ok(output) => print!("{output}"),
            Err(e) => {
                error!(error = %e, "remote command failed");
                std::process::exit(1);
            }
        }
        return;
    }

    // Load server config (file + CLI overrides)
    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(
        Some(&config_path),
        cli.bind.as_deref(),
        cli.port,
        cli.connect_timeout,
        cli.session_timeout,
        cli.flush_interval,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %server_config.bind,
        port = server_config.port,
        "starting wssh-server"
    );

    let server = WsshServer::new(server_config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("wssh-server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
