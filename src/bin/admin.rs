//! CLI administration tool for dev-habit.
//!
//! Provides maintenance commands that don't go through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # List registered users
//! cargo run --bin admin -- users list
//!
//! # Row counts per table
//! cargo run --bin admin -- stats
//!
//! # Drop cached responses for one user
//! cargo run --bin admin -- cache purge --prefix "habits:u_0190..."
//!
//! # Remove finished import jobs older than 7 days
//! cargo run --bin admin -- imports cleanup --days 7
//!
//! # Generate a value for ENCRYPTION_KEY
//! cargo run --bin admin -- encryption-key
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string

use dev_habit::domain::repositories::UserRepository;
use dev_habit::infrastructure::cache::{CacheService, PgCache};
use dev_habit::infrastructure::persistence::{PgImportJobRepository, PgUserRepository};
use dev_habit::jobs::import_cleanup::run_cleanup_once;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing dev-habit.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show row counts
    Stats,

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage CSV import jobs
    Imports {
        #[command(subcommand)]
        action: ImportAction,
    },

    /// Print a random base64 key for ENCRYPTION_KEY
    EncryptionKey,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List users, oldest first
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: i64,

        #[arg(short, long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete cached entries whose key starts with the prefix (all when omitted)
    Purge {
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Delete completed and failed jobs older than the retention period
    Cleanup {
        #[arg(short, long, default_value_t = 7)]
        days: i64,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Users { action } => handle_user_action(action, &connect().await?).await?,
        Commands::Stats => handle_stats(&connect().await?).await?,
        Commands::Cache { action } => handle_cache_action(action, &connect().await?).await?,
        Commands::Imports { action } => handle_import_action(action, &connect().await?).await?,
        Commands::EncryptionKey => generate_encryption_key()?,
        Commands::Db { action } => handle_db_action(action, &connect().await?).await?,
    }

    Ok(())
}

async fn connect() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

/// Lists registered users.
///
/// # Output Format
///
/// ```text
/// 👥 Users
///
///   ID                                       Name            Email                          Created
///   ─────────────────────────────────────────────────────────────────────────────────────────────────
///   u_0190c3a8-7f8e-7b7a-9c55-3c8d2f1e0a11   Ada             ada@example.com                2025-01-15 10:30
/// ```
async fn handle_user_action(action: UserAction, pool: &PgPool) -> Result<()> {
    let UserAction::List { limit, offset } = action;
    let repo = PgUserRepository::new(Arc::new(pool.clone()));

    println!("{}", "👥 Users".bright_blue().bold());
    println!();

    let users = repo
        .list(limit, offset)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

    if users.is_empty() {
        println!("{}", "  No users found".yellow());
        return Ok(());
    }

    println!(
        "  {:<40} {:<15} {:<30} {}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Email".bright_white().bold(),
        "Created".bright_white().bold()
    );
    println!("  {}", "─".repeat(100).bright_black());

    for user in &users {
        println!(
            "  {:<40} {:<15} {:<30} {}",
            user.id.bright_black(),
            user.name.cyan(),
            user.email,
            user.created_at_utc
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black()
        );
    }

    println!();
    println!("  Shown: {}", users.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Displays row counts for the main tables.
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let counts = [
        ("Users", "SELECT COUNT(*) FROM users"),
        ("Habits", "SELECT COUNT(*) FROM habits"),
        ("Tags", "SELECT COUNT(*) FROM tags"),
        ("Entries", "SELECT COUNT(*) FROM entries"),
        (
            "Pending imports",
            "SELECT COUNT(*) FROM entry_import_jobs WHERE status IN (0, 1)",
        ),
        ("GitHub tokens", "SELECT COUNT(*) FROM github_access_tokens"),
    ];

    for (label, sql) in counts {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
        println!(
            "  {:<16} {}",
            format!("{label}:"),
            count.to_string().bright_green().bold()
        );
    }
    println!();

    Ok(())
}

/// Purges cached responses after confirmation.
async fn handle_cache_action(action: CacheAction, pool: &PgPool) -> Result<()> {
    let CacheAction::Purge { prefix, yes } = action;

    println!("{}", "🧹 Purge Cache".bright_blue().bold());
    println!();

    let scope = if prefix.is_empty() {
        "all entries".to_string()
    } else {
        format!("keys starting with '{prefix}'")
    };
    println!("  Scope: {}", scope.cyan());
    println!();

    if !yes && !confirm("Purge these cache entries?")? {
        println!("{}", "❌ Cancelled".red());
        return Ok(());
    }

    let cache = PgCache::new(Arc::new(pool.clone()), 0);
    let removed = cache
        .remove_by_prefix(&prefix)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to purge cache: {}", e))?;

    println!(
        "{} {}",
        "✅ Removed".green().bold(),
        removed.to_string().bright_white().bold()
    );

    Ok(())
}

/// Runs the import job cleanup immediately.
async fn handle_import_action(action: ImportAction, pool: &PgPool) -> Result<()> {
    let ImportAction::Cleanup { days, yes } = action;
    anyhow::ensure!(days >= 0, "--days must not be negative");

    println!("{}", "🗑️  Import Job Cleanup".bright_blue().bold());
    println!();
    println!(
        "  Finished jobs older than {} days will be deleted",
        days.to_string().cyan()
    );
    println!();

    if !yes && !confirm("Delete these jobs?")? {
        println!("{}", "❌ Cancelled".red());
        return Ok(());
    }

    let repo = PgImportJobRepository::new(Arc::new(pool.clone()));
    let removed = run_cleanup_once(&repo, days)
        .await
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {}", e))?;

    println!(
        "{} {}",
        "✅ Deleted".green().bold(),
        removed.to_string().bright_white().bold()
    );

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            let migrations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
                .fetch_one(pool)
                .await
                .unwrap_or(0);

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Migrations: {}", migrations.to_string().bright_white());
            println!();
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Prints 32 random bytes, base64 encoded.
fn generate_encryption_key() -> Result<()> {
    let mut key = [0u8; 32];
    getrandom::fill(&mut key).map_err(|e| anyhow::anyhow!("Failed to generate key: {}", e))?;

    println!("{}", "🔑 Encryption key".bright_blue().bold());
    println!();
    println!("  ENCRYPTION_KEY={}", STANDARD.encode(key).bright_yellow());
    println!();
    println!(
        "{}",
        "⚠️  Changing the key makes stored GitHub tokens unreadable."
            .yellow()
            .bold()
    );

    Ok(())
}
