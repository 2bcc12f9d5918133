use clap::{Parser, Subcommand, ValueEnum};

/// Package version plus the commit it was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("TUCK_GIT_COMMIT"),
    ")"
);

#[derive(Parser)]
#[command(name = "tuck")]
#[command(about = "To fit (packages) securely or snugly (into ~/.local/bin)")]
#[command(
    long_about = "To fit (packages) securely or snugly (into ~/.local/bin)\n\n\
    Install local packages like GNU Stow, or download and install packages\n\
    from GitHub releases, and remove them again cleanly later."
)]
#[command(version = VERSION, propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a local or remote package
    #[command(
        visible_alias = "in",
        after_help = "Examples:\n  tuck install BurntSushi/ripgrep\n  tuck install --release 14.1.0 https://github.com/BurntSushi/ripgrep\n  tuck install --local --prefix /opt/tools ./build/dist"
    )]
    Install {
        /// GitHub project slug ('owner/repo') or URL, or a directory with --local
        package: String,

        /// Install prefix path
        #[arg(short, long, default_value = "~/.local")]
        prefix: String,

        /// GitHub release tag to install
        #[arg(short, long, default_value = "latest")]
        release: String,

        /// Treat package as a local path
        #[arg(short, long)]
        local: bool,

        /// Show what would be installed without changing anything
        #[arg(short, long)]
        dry_run: bool,
    },

    /// List installed packages
    #[command(visible_alias = "ls")]
    List {
        /// List only package names, nothing else
        #[arg(short, long)]
        quiet: bool,
    },

    /// Remove an installed package
    #[command(visible_alias = "rm")]
    Remove {
        /// Package to remove (e.g., 'owner/repo' or the local path it was installed from)
        package: String,
    },

    /// Inspect or initialise tuck's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },
    /// Show where tuck keeps its config, state and cache
    Path,
    /// Write the platform default filters to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}
