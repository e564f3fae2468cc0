//! Command-line argument definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// app-inventory - keep a launcher's installed-apps cache, favorites and hidden apps in sync
#[derive(Parser, Debug)]
#[command(name = "app-inventory")]
#[command(version)]
#[command(about = "Keep a launcher's installed-apps cache, favorites and hidden apps in sync", long_about = None)]
pub struct Args {
    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable verbose output (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration directory (default: ~/.config/app-inventory)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Skip the dangling-reference repair pass even if enabled in settings
    #[arg(long, global = true)]
    pub no_repair: bool,

    /// Operation to perform
    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed by the CLI.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Populate the inventory from the application directories unless a previous run already did
    Populate {
        /// Enumerate even when the inventory already has entries
        #[arg(short, long)]
        force: bool,
    },
    /// Record an installed application from its .desktop file
    Install {
        /// Path to the .desktop file
        desktop_file: PathBuf,
    },
    /// Record that a package was uninstalled
    Uninstall {
        /// Package identifier
        package_id: String,
    },
    /// Add a package to favorites
    Favorite {
        /// Package identifier
        package_id: String,
    },
    /// Remove a package from favorites
    Unfavorite {
        /// Package identifier
        package_id: String,
    },
    /// Hide a package from the app drawer
    Hide {
        /// Package identifier
        package_id: String,
    },
    /// Show a previously hidden package
    Unhide {
        /// Package identifier
        package_id: String,
    },
    /// List installed apps (populating the inventory on first use)
    List {
        /// Only list favorites
        #[arg(long, conflicts_with = "hidden")]
        favorites: bool,
        /// Only list hidden apps
        #[arg(long)]
        hidden: bool,
    },
    /// Remove favorites/hidden entries whose package is no longer installed
    Repair,
}
