//! Apply the schema without starting the server

use std::path::Path;

use anyhow::{Context, Result};

use sickbay_server::db::migrations;
use sickbay_server::{SickbayConfig, Stores};

pub async fn run_migrate(config_path: Option<&Path>) -> Result<()> {
    let config = SickbayConfig::load(config_path).context("Failed to load configuration")?;

    let stores = Stores::connect(&config.database)
        .await
        .context("Failed to connect to the offline store")?;

    migrations::run_all(&stores)
        .await
        .context("Failed to apply schema migrations")?;

    let online = if stores.online.is_some() { "offline + online" } else { "offline" };
    println!("Schema up to date ({online})");
    Ok(())
}
