use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use growth_crm::authz::{describe, permissions_for, PermissionSet, Role};
use growth_crm::automation::{Automation, AutomationConfig};
use growth_crm::db::sessions::prune_expired_sessions;
use growth_crm::events::init_event_bus;
use growth_crm::tenancy::{OriginHint, SqliteTenantStore, TenancyConfig, TenantAccess, TenantCache, TenantResolver, TenantScope};

#[derive(Parser, Debug)]
#[command(author, version, about = "growth-crm admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Print the permission set a role holds
    Permissions { role: String },
    /// Link dependent records left behind by interrupted cascades
    ReconcileCascades,
    /// Delete session revocations whose tokens have expired
    PruneSessions,
    /// Resolve each host to a tenant, reusing the last resolution when the subdomain repeats
    ResolveTenant {
        #[arg(required = true)]
        hosts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::Permissions { role } => print_permissions(&role)?,
        Commands::ReconcileCascades => {
            let pool = get_pool().await?;
            let (events, _rx) = init_event_bus();
            let automation = Automation::new(pool, events, &AutomationConfig::from_env()?);
            let summary = automation.reconcile_all().await?;
            println!(
                "Reconciled {} interview(s) and {} discovery call(s)",
                summary.interviews, summary.discovery_calls
            );
        }
        Commands::PruneSessions => {
            let pool = get_pool().await?;
            let pruned = prune_expired_sessions(&pool).await?;
            println!("Pruned {pruned} expired session revocation(s)");
        }
        Commands::ResolveTenant { hosts } => {
            let pool = get_pool().await?;
            resolve_hosts(pool, &hosts).await?;
        }
    }

    Ok(())
}

fn print_permissions(raw: &str) -> anyhow::Result<()> {
    let role: Role = raw.parse()?;
    println!("{} (landing page {})", role, role.landing_page());

    match permissions_for(role) {
        PermissionSet::All => println!("  all"),
        PermissionSet::Keys(keys) => {
            for key in keys {
                println!("  {:<20} {}", key, describe(&key).unwrap_or(""));
            }
        }
    }
    Ok(())
}

async fn resolve_hosts(pool: SqlitePool, hosts: &[String]) -> anyhow::Result<()> {
    let resolver = TenantResolver::new(Arc::new(SqliteTenantStore::new(pool)), TenancyConfig::from_env()?);
    let mut cache = TenantCache::new();

    for host in hosts {
        let hint = OriginHint::Host(host.clone());
        match resolver.resolve_cached(Some(&hint), TenantAccess::Standard, &mut cache).await {
            Ok(TenantScope::Tenant(tenant)) => println!("{host}: {} ({})", tenant.subdomain, tenant.id),
            Ok(TenantScope::Unscoped) => println!("{host}: unscoped"),
            Err(err) => println!("{host}: {err}"),
        }
    }
    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{}_{}.sql", timestamp, sanitize_name(name));
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let options = database_url
        .parse::<SqliteConnectOptions>()
        .context("invalid DATABASE_URL")?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
        .fetch_optional(pool)
        .await?
        .is_some();

    let applied_versions: HashSet<i64> = if has_table {
        sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
