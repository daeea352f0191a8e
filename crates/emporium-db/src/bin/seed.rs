//! # Seed Data Generator
//!
//! Populates the database with demo accounts and a small catalog.
//!
//! ## Usage
//! ```bash
//! # 10 accounts with a 500 opening balance (default)
//! cargo run -p emporium-db --bin seed
//!
//! # Custom amounts
//! cargo run -p emporium-db --bin seed -- --accounts 50 --balance 2000
//!
//! # Specify database URL (otherwise DATABASE_URL)
//! cargo run -p emporium-db --bin seed -- --db postgres://localhost/emporium
//! ```

use emporium_core::{NewProduct, ProductType};
use emporium_db::{AccountRepository, CatalogRepository, Database, DbConfig};
use std::env;
use tracing_subscriber::EnvFilter;

/// Demo catalog: (name, price, type)
const CATALOG: &[(&str, i64, ProductType)] = &[
    ("Health Potion", 100, ProductType::Consumable),
    ("Mana Potion", 120, ProductType::Consumable),
    ("Elixir", 450, ProductType::Consumable),
    ("Smoke Bomb", 60, ProductType::Consumable),
    ("Teleport Scroll", 250, ProductType::Consumable),
    ("Iron Sword", 300, ProductType::Permanent),
    ("Steel Shield", 350, ProductType::Permanent),
    ("Dragon Cloak", 2_000, ProductType::Permanent),
    ("Pet Falcon", 1_500, ProductType::Permanent),
    ("Golden Saddle", 5_000, ProductType::Permanent),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut accounts: usize = 10;
    let mut balance: i64 = 500;
    let mut database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/emporium".to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--accounts" | "-a" => {
                if i + 1 < args.len() {
                    accounts = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--balance" | "-b" => {
                if i + 1 < args.len() {
                    balance = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    database_url = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Emporium Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -a, --accounts <N>   Number of accounts to create (default: 10)");
                println!("  -b, --balance <N>    Opening balance per account (default: 500)");
                println!("  -d, --db <URL>       Database URL (default: $DATABASE_URL)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Emporium Seed Data Generator");
    println!("============================");
    println!("Accounts: {} x {}", accounts, balance);
    println!();

    let db = Database::new(DbConfig::new(&database_url).max_connections(2)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = CatalogRepository::count(db.pool()).await?;
    if existing > 0 {
        println!("⚠ Catalog already has {} products, skipping products", existing);
    } else {
        for (name, price, product_type) in CATALOG {
            let product = CatalogRepository::insert(
                db.pool(),
                &NewProduct::active(*name, *price, *product_type),
            )
            .await?;
            println!("  + product {} {} ({:?}, {})", product.id, product.name, product.product_type, product.price);
        }
    }

    let start = std::time::Instant::now();
    for _ in 0..accounts {
        AccountRepository::create(db.pool(), balance).await?;
    }

    let total = AccountRepository::count(db.pool()).await?;
    println!();
    println!("✓ Created {} accounts in {:?} ({} total)", accounts, start.elapsed(), total);

    db.close().await;
    println!("✓ Seed complete!");

    Ok(())
}
