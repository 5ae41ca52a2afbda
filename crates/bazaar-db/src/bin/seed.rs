//! # Seed Data Generator
//!
//! Populates a development database with catalog products.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Generate custom amount into a specific file
//! cargo run -p bazaar-db --bin seed -- --count 1000 --db ./data/bazaar.db
//! ```
//!
//! Every fourth product gets a discount price, and every product gets a
//! placeholder image URL derived from its id.

use bazaar_db::migrations::migration_status;
use bazaar_db::repository::product::generate_product_id;
use bazaar_db::{Database, DbConfig, ProductRecord};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Product lines for realistic test data
const LINES: &[(&str, &[&str])] = &[
    (
        "Tops",
        &["Logo Tee", "Pocket Tee", "Henley", "Oxford Shirt", "Flannel", "Hoodie", "Crewneck"],
    ),
    (
        "Bottoms",
        &["Chino", "Denim Jean", "Jogger", "Cargo Short", "Swim Trunk", "Pleated Trouser"],
    ),
    (
        "Shoes",
        &["Trail Runner", "Canvas Sneaker", "Chelsea Boot", "Loafer", "Slide", "Hiking Boot"],
    ),
    (
        "Accessories",
        &["Beanie", "Baseball Cap", "Tote Bag", "Canvas Belt", "Wool Scarf", "Crew Sock"],
    ),
];

/// Color variants and their price addon in cents
const COLORS: &[(&str, i64)] = &[
    ("Black", 0),
    ("White", 0),
    ("Navy", 200),
    ("Olive", 300),
    ("Rust", 500),
];

const DEFAULT_COUNT: usize = 200;
const DEFAULT_DB: &str = "./bazaar_dev.db";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count = DEFAULT_COUNT;
    let mut db_path = String::from(DEFAULT_DB);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file path (default: {DEFAULT_DB})");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding catalog");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let (embedded, applied) = migration_status(db.pool()).await?;
    info!(embedded, applied, "Schema ready");

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (line_name, products) in LINES {
        for product_name in products.iter() {
            for (color, addon) in COLORS {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(line_name, product_name, color, *addon, generated);
                if let Err(e) = db.products().insert(&product).await {
                    warn!(id = %product.id, error = %e, "Failed to insert product");
                    continue;
                }
                generated += 1;
            }
        }
    }

    info!(generated, elapsed = ?start.elapsed(), "Seed complete");

    let sample = db.products().list_active(5).await?;
    for product in sample {
        info!(id = %product.id, name = %product.name, price_cents = product.price_cents, "Sample");
    }

    db.close().await;
    Ok(())
}

/// Generates a single product with deterministic pricing.
fn generate_product(line: &str, name: &str, color: &str, addon: i64, seed: usize) -> ProductRecord {
    let id = generate_product_id();

    // Base $9.99 - $89.99 by line, spread by seed
    let base = 999 + ((seed * 37) % 8000) as i64;
    let price_cents = base + addon;

    let mut product = ProductRecord::new(id.clone(), format!("{} {} ({})", color, name, line), price_cents)
        .with_image(format!("https://cdn.bazaar.dev/products/{}.jpg", id));

    if seed % 4 == 0 {
        // 20% off
        product = product.with_discount(price_cents * 80 / 100);
    }

    product
}
