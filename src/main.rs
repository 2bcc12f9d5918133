mod cli;
mod config;
mod download;
mod github;
mod install;
mod ledger;
mod lock;
mod package_id;
mod platform;
mod select;
mod stow;
mod types;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction, ConfigFormat};
use config::{
    contract_path, expand_path, get_cache_dir, get_config_file_path, get_state_dir, load_config,
    save_config,
};
use install::{install_package, list_installed_packages, remove_package, InstallOptions};
use ledger::Ledger;
use types::TuckConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli);

    match cli.command {
        Commands::Install {
            package,
            prefix,
            release,
            local,
            dry_run,
        } => {
            let config = load_config()?;
            tracing::debug!("Using filters {:?}", config.filters);

            let _lock = lock::acquire(&get_state_dir()?)?;
            let ledger = Ledger::open_default()?;
            let options = InstallOptions {
                package,
                prefix: expand_path(&prefix)?,
                release,
                local,
                dry_run,
            };
            install_package(&ledger, &config, &options).await?;
        }

        Commands::List { quiet } => {
            list_installed_packages(&Ledger::open_default()?, quiet, cli.verbose > 0)?;
        }

        Commands::Remove { package } => {
            let _lock = lock::acquire(&get_state_dir()?)?;
            remove_package(&Ledger::open_default()?, &package)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                let config = load_config()?;
                match format {
                    ConfigFormat::Yaml => print!("{}", serde_yaml::to_string(&config)?),
                    ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                }
            }
            ConfigAction::Path => {
                println!("config: {}", contract_path(&get_config_file_path()?));
                println!("state:  {}", contract_path(&get_state_dir()?));
                println!("ledger: {}", contract_path(Ledger::open_default()?.path()));
                println!("cache:  {}", contract_path(&get_cache_dir()?));
            }
            ConfigAction::Init { force } => {
                let path = get_config_file_path()?;
                if path.exists() && !force {
                    bail!(
                        "Config file already exists at {} (use --force to overwrite)",
                        path.display()
                    );
                }
                let config = TuckConfig {
                    filters: platform::default_filters()?,
                };
                save_config(&config, &path)?;
                println!("Wrote default config to {}", contract_path(&path));
            }
        },
    }

    Ok(())
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}
