//! # Seed Data Generator
//!
//! Populates a store with development reference data.
//!
//! ## Usage
//! ```bash
//! # Seed 500 products into ./meridian.db (defaults)
//! cargo run -p meridian-store --bin seed
//!
//! # Custom count and path
//! cargo run -p meridian-store --bin seed -- --count 2000 --db ./data/meridian.db
//! ```
//!
//! Each product gets a SKU of `{CATEGORY}-{INDEX}`, a numeric barcode, a
//! price between 2,000 and 150,000 minor units, and roughly one in five a
//! special price.

use std::env;

use meridian_core::{Money, ReferenceDomain, ReferenceItem};
use meridian_store::{Store, StoreConfig};

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Mineral Water 600ml",
            "Mineral Water 1500ml",
            "Sweet Tea Bottle",
            "Black Coffee Can",
            "Milk Coffee Can",
            "Orange Soda",
            "Cola",
            "Isotonic Drink",
        ],
    ),
    (
        "SNK",
        &[
            "Potato Chips Original",
            "Potato Chips BBQ",
            "Prawn Crackers",
            "Chocolate Wafer",
            "Peanut Pack",
            "Cassava Chips",
        ],
    ),
    (
        "REG",
        &[
            "Cotton Shirt",
            "Polo Shirt",
            "Work Trousers",
            "Canvas Shoes",
            "Leather Belt",
            "Baseball Cap",
        ],
    ),
    (
        "HHG",
        &[
            "Dish Soap 800ml",
            "Laundry Detergent 1kg",
            "Floor Cleaner",
            "Light Bulb 12W",
            "Battery AA 4-pack",
        ],
    ),
];

fn parse_args() -> (usize, String) {
    let args: Vec<String> = env::args().collect();
    let mut count = 500usize;
    let mut db_path = "./meridian.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" => {
                if let Some(v) = args.get(i + 1) {
                    count = v.parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" => {
                if let Some(v) = args.get(i + 1) {
                    db_path = v.clone();
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    (count, db_path)
}

fn build_items(count: usize) -> Vec<ReferenceItem> {
    let mut items = Vec::with_capacity(count);

    for index in 0..count {
        let (category, names) = CATEGORIES[index % CATEGORIES.len()];
        let name = names[index % names.len()];
        // Deterministic pseudo-variety; a seed tool doesn't need real
        // randomness.
        let price = 2_000 + ((index as i64 * 731) % 148) * 1_000;
        let on_special = index % 5 == 0;

        items.push(ReferenceItem {
            barcode: format!("899{:010}", index),
            sku: format!("{}-{:05}", category, index),
            variant: String::new(),
            name: format!("{name} #{index}"),
            list_price: Money::from_minor(price),
            special_price: on_special.then(|| Money::from_minor(price - price / 10)),
            stock_qty: Some((index as i64 * 13) % 120),
            category: Some(category.to_string()),
        });
    }

    items
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (count, db_path) = parse_args();
    tracing::info!(count, db = %db_path, "seeding reference data");

    let store = Store::open(StoreConfig::new(&db_path)).await?;
    let items = build_items(count);
    store
        .reference()
        .replace_all(ReferenceDomain::Products, &items)
        .await?;

    let stored = store.reference().count(ReferenceDomain::Products).await?;
    tracing::info!(stored, "seed complete");
    store.close().await;

    Ok(())
}
