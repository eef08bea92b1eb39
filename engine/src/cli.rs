//! CLI interface for aula
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the backend binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aula backend
///
/// Mirrors a Classroom-style course catalog into a local task store, serves
/// it over HTTP, and answers chat messages from the mirror or through an
/// external intent-detection service.
#[derive(Parser, Debug)]
#[command(name = "aula")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server and the background sync loop
    Serve,

    /// Run one triggered sync pass and exit
    Sync,

    /// List the provider courses visible to the configured identity
    Courses,

    /// Run system diagnostics
    Doctor,
}
