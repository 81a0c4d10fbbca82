//! CLI module - Command-line interface for the accounts service
//!
//! This module provides a structured CLI using clap for argument parsing.
//! Besides starting the server it offers operator tooling that can see
//! deactivated accounts, which the HTTP views never show.

mod commands;

use clap::{Parser, Subcommand};

/// Accounts - user registration and profile service
#[derive(Parser)]
#[command(name = "accounts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Inspect and create accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List accounts
    #[command(alias = "ls")]
    List {
        /// Include deactivated accounts
        #[arg(long)]
        all: bool,
    },
    /// Show one account, active or not
    Show {
        /// Username
        username: String,
    },
    /// Create an account (password from ACCOUNTS_PASSWORD or stdin)
    Create {
        /// Username
        username: String,
        /// Email address
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

pub use commands::*;
