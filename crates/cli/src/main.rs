//! Shopfront CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! sf-cli migrate
//!
//! # Load the bundled sample catalogue (or your own JSON file)
//! sf-cli seed products
//! sf-cli seed products --file catalogue.json
//!
//! # Grant or revoke admin access
//! sf-cli admin promote -e owner@example.com
//! sf-cli admin demote -e former@example.com
//! ```
//!
//! All commands read `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) from the
//! environment or a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shopfront_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load data into the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage store administrators
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert products, skipping slugs that already exist
    Products {
        /// JSON array of products (defaults to the bundled sample catalogue)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account admin access
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Return an admin account to a regular customer
    Demote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(file.as_deref()).await?;
            }
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => {
                commands::admin::set_role(&email, UserRole::Admin).await?;
            }
            AdminAction::Demote { email } => {
                commands::admin::set_role(&email, UserRole::Customer).await?;
            }
        },
    }
    Ok(())
}
