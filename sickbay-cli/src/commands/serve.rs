//! HTTP server command
//!
//! Loads configuration, connects the stores, applies the schema and runs
//! the API until Ctrl+C / SIGTERM.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use sickbay_server::config::{ENV_OFFLINE_URL, ENV_ONLINE_URL};
use sickbay_server::db::migrations;
use sickbay_server::http::{run_server, ServerConfig};
use sickbay_server::{SickbayConfig, Stores};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config; default 127.0.0.1:8080)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins)
    #[arg(long, conflicts_with = "cors_strict")]
    pub cors_permissive: bool,

    /// Only allow localhost origins
    #[arg(long)]
    pub cors_strict: bool,

    /// Offline store URL (overrides config/environment)
    #[arg(long, env = ENV_OFFLINE_URL)]
    pub database_url: Option<String>,

    /// Online store URL (overrides config/environment)
    #[arg(long, env = ENV_ONLINE_URL)]
    pub online_database_url: Option<String>,

    /// Skip schema migrations at startup
    #[arg(long)]
    pub skip_migrations: bool,
}

impl ServeArgs {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut SickbayConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind.to_string();
        }
        if self.cors_permissive {
            config.server.cors_permissive = true;
        }
        if self.cors_strict {
            config.server.cors_permissive = false;
        }
        if let Some(url) = &self.database_url {
            config.database.offline_url = url.clone();
        }
        if let Some(url) = &self.online_database_url {
            config.database.online_url = Some(url.clone());
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = SickbayConfig::load(config_path).context("Failed to load configuration")?;
    args.apply(&mut config);

    let bind_addr = config.bind_addr()?;
    tracing::info!(bind = %bind_addr, "Starting sickbay server");

    let stores = Stores::connect(&config.database)
        .await
        .context("Failed to connect to the offline store")?;

    if args.skip_migrations {
        tracing::info!("Skipping schema migrations");
    } else {
        migrations::run_all(&stores)
            .await
            .context("Failed to apply schema migrations")?;
    }

    let server_config = ServerConfig {
        bind_addr,
        cors_permissive: config.server.cors_permissive,
        anti_theft: config.anti_theft,
    };

    // Blocks until shutdown
    run_server(stores, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
