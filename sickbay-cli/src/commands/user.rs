//! Staff account administration
//!
//! `create-admin` bootstraps the first administrator so the API can be used
//! at all: every other account is created through the HTTP endpoints.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use sickbay_server::auth::hash_password;
use sickbay_server::db::{
    create_pool, migrations, UserProfile, UserRepo, WarehouseFields, WarehouseRepo,
};
use sickbay_server::models::{required_text, Password, Role, Username, SHORT_TEXT_MAX};
use sickbay_server::SickbayConfig;

#[derive(Parser, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create an admin account (and its warehouse if needed)
    CreateAdmin(CreateAdminArgs),
}

#[derive(Parser, Debug)]
pub struct CreateAdminArgs {
    /// Login name
    #[arg(long, short = 'u')]
    pub username: String,

    /// Password (at least 8 characters)
    #[arg(long, env = "SICKBAY_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Display name
    #[arg(long, default_value = "Administrator")]
    pub full_name: String,

    /// Existing warehouse to attach the account to
    #[arg(long, conflicts_with = "warehouse_name")]
    pub warehouse_id: Option<Uuid>,

    /// Warehouse to attach the account to by name (created if no live one matches)
    #[arg(long, default_value = "Main Clinic")]
    pub warehouse_name: String,

    /// Create even if an admin already exists
    #[arg(long, short)]
    pub force: bool,
}

pub async fn run_user(args: UserArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        UserCommands::CreateAdmin(args) => run_create_admin(args, config_path).await,
    }
}

async fn run_create_admin(args: CreateAdminArgs, config_path: Option<&Path>) -> Result<()> {
    // Validate before touching the database
    let username = Username::new(&args.username)?;
    let password = Password::new(&args.password)?;
    let full_name = required_text("full name", &args.full_name, SHORT_TEXT_MAX)?;

    let config = SickbayConfig::load(config_path).context("Failed to load configuration")?;
    let pool = create_pool(&config.database.offline_url)
        .await
        .context("Failed to connect to the offline store")?;
    migrations::run(&pool)
        .await
        .context("Failed to apply schema migrations")?;

    let users = UserRepo::new(&pool);
    let admins = users.count_admins().await?;
    if admins > 0 && !args.force {
        bail!("{admins} admin account(s) already exist\n\nUse --force to create another");
    }

    let warehouse_id =
        resolve_warehouse(&WarehouseRepo::new(&pool), args.warehouse_id, &args.warehouse_name)
            .await?;

    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task failed")??;

    let user = users
        .create(
            warehouse_id,
            &username,
            UserProfile {
                full_name,
                email: None,
                role: Role::Admin,
            },
            &hash,
        )
        .await?;

    println!("Created admin '{}' ({})", user.username, user.id);
    println!("Warehouse: {warehouse_id}");
    Ok(())
}

/// Pick the warehouse for a new admin, reusing a live one with the same name.
async fn resolve_warehouse(
    warehouses: &WarehouseRepo<'_>,
    warehouse_id: Option<Uuid>,
    warehouse_name: &str,
) -> Result<Uuid> {
    if let Some(id) = warehouse_id {
        warehouses.ensure_exists(id).await?;
        return Ok(id);
    }

    let name = required_text("warehouse name", warehouse_name, SHORT_TEXT_MAX)?;
    if let Some(existing) = warehouses.find_live_by_name(&name).await? {
        tracing::info!(warehouse_id = %existing.id, "Reusing existing warehouse");
        return Ok(existing.id);
    }

    let warehouse = warehouses
        .create(WarehouseFields {
            name,
            location: None,
            phone: None,
        })
        .await?;
    tracing::info!(warehouse_id = %warehouse.id, "Warehouse created");
    Ok(warehouse.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: UserCommands,
    }

    #[test]
    fn warehouse_id_and_name_conflict() {
        let argv = [
            "user",
            "create-admin",
            "-u",
            "admin",
            "--password",
            "long enough",
            "--warehouse-id",
            "00000000-0000-0000-0000-000000000000",
            "--warehouse-name",
            "Annex",
        ];
        assert!(Harness::try_parse_from(argv).is_err());
    }

    #[test]
    fn defaults_apply() {
        let argv = ["user", "create-admin", "-u", "admin", "--password", "long enough"];
        let UserCommands::CreateAdmin(args) = Harness::try_parse_from(argv).unwrap().command;
        assert_eq!(args.full_name, "Administrator");
        assert_eq!(args.warehouse_name, "Main Clinic");
        assert!(args.warehouse_id.is_none());
        assert!(!args.force);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn rerun_reuses_live_warehouse_by_name() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool");
        migrations::run(&pool).await.expect("migrations");
        let warehouses = WarehouseRepo::new(&pool);
        let name = format!("Clinic {}", Uuid::new_v4());

        let first = resolve_warehouse(&warehouses, None, &name).await.expect("create");
        let second = resolve_warehouse(&warehouses, None, &name.to_lowercase())
            .await
            .expect("reuse");
        assert_eq!(first, second);

        assert!(resolve_warehouse(&warehouses, Some(Uuid::new_v4()), &name)
            .await
            .is_err());
    }
}
