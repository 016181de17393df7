//! sickbay CLI - clinic dispensary service
//!
//! Entry point for the `sickbay` binary:
//! - HTTP API server (`serve`)
//! - Schema setup for the offline and online stores (`migrate`)
//! - First admin account bootstrap (`user create-admin`)
//! - Config file management (`config`)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "sickbay",
    author,
    version,
    about = "Clinic dispensary service: students, consultations, medicine stock",
    long_about = "Run the sickbay HTTP API over a PostgreSQL offline store, with an optional \
                  online store kept on the same schema for later synchronization."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.sickbay/config.toml)
    #[arg(long, global = true, env = "SICKBAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply the database schema to the configured stores
    Migrate,
    /// Staff account administration
    User(commands::user::UserArgs),
    /// Manage sickbay configuration (path, show, init)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init_tracing(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config_path).await?,
        Commands::Migrate => commands::run_migrate(config_path).await?,
        Commands::User(args) => commands::run_user(args, config_path).await?,
        Commands::Config(args) => config::run_config(args, config_path)?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
