//! CLI argument definitions for the INGRES application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// INGRES assistant: ask questions about groundwater data in plain language.
#[derive(Parser, Debug)]
#[command(name = "ingres", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file holding the document collections.
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Replace a collection with the rows of a CSV file.
    Ingest {
        /// CSV file to load.
        csv: PathBuf,
        /// Target collection (defaults to the configured one).
        #[arg(long = "collection")]
        collection: Option<String>,
    },
}

impl CliArgs {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Serve { port: None })
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > INGRES_CONFIG env var > ~/.ingres/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("INGRES_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > INGRES_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        let flag = match self.command {
            Some(Command::Serve { port }) => port,
            _ => None,
        };
        pick_port(flag, std::env::var("INGRES_PORT").ok(), config_port)
    }

    /// Resolve the database path override.
    ///
    /// Priority: --database flag > INGRES_DATABASE env var. Returns `None`
    /// if neither is set (use config value).
    pub fn resolve_database(&self) -> Option<String> {
        self.database
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| std::env::var("INGRES_DATABASE").ok())
            .filter(|p| !p.trim().is_empty())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn pick_port(flag: Option<u16>, env: Option<String>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|v| v.parse::<u16>().ok()) {
        return p;
    }
    config_port
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".ingres").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".ingres").join("config.toml");
    }
    PathBuf::from("config.toml")
}
