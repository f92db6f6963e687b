use std::env;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use doc_review::{config::AppConfig, db, seed::SeedData, store::PgStore};

const USAGE: &str = "Usage: maintenance migrate | maintenance seed-roles <file.json>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some("seed-roles") => match args.next() {
            Some(path) => seed_roles(&path)?,
            None => {
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded review configuration"
    );
    db::init_pool_with_size(config.require_database_url()?, 1)
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let applied = db::run_migrations(&pool)?;
    if applied == 0 {
        println!("Schema is up to date.");
    } else {
        println!("Applied {applied} migration(s).");
    }
    Ok(())
}

fn seed_roles(path: &str) -> Result<()> {
    let seed = SeedData::from_path(path)?;
    let pool = connect()?;
    db::run_migrations(&pool)?;
    seed.apply_to_postgres(&PgStore::new(pool))?;
    println!(
        "Seeded {} default mapping(s), {} land override(s), {} user(s).",
        seed.default_mapping.len(),
        seed.land_mappings.values().map(|m| m.len()).sum::<usize>(),
        seed.users.len()
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
