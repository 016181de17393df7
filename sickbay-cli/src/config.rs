use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use sickbay_server::SickbayConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show config file path
    Path,
    /// Print the effective config (file + environment) as TOML
    Show,
    /// Write a config file with default values
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let path = resolve(config_path);
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init(args) => run_init(&path, args),
    }
}

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(SickbayConfig::default_path)
}

fn run_show(path: &Path) -> Result<()> {
    let config = SickbayConfig::load(Some(path))?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn run_init(path: &Path, args: InitArgs) -> Result<()> {
    if path.exists() && !args.force {
        bail!(
            "Config already exists at {}\n\nUse --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create {}", parent.display()))?;
    }

    let content = SickbayConfig::default().to_toml()?;
    std::fs::write(path, content)
        .context(format!("Failed to write config file: {}", path.display()))?;

    println!("Created config at: {}", path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config: $EDITOR {}", path.display());
    println!("  2. Point database.offline_url at your PostgreSQL instance");
    println!("  3. Run: sickbay migrate");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run_init(&path, InitArgs { force: false }).unwrap();
        let written = SickbayConfig::from_file(&path).unwrap();
        assert_eq!(written, SickbayConfig::default());

        assert!(run_init(&path, InitArgs { force: false }).is_err());
        run_init(&path, InitArgs { force: true }).unwrap();
    }
}
