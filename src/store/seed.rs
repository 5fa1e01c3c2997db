//! Demo sales generator for trying the bot against a fresh database

use super::{EventStore, NewSale, StoreError};
use chrono::{Duration, NaiveDate};
use rand::Rng;

struct DemoProduct {
    id: i64,
    name: &'static str,
    price_range: (f64, f64),
}

const PRODUCTS: [DemoProduct; 4] = [
    DemoProduct { id: 1, name: "Смартфон", price_range: (15_000.0, 40_000.0) },
    DemoProduct { id: 2, name: "Ноутбук", price_range: (25_000.0, 85_000.0) },
    DemoProduct { id: 3, name: "Наушники", price_range: (1_500.0, 9_000.0) },
    DemoProduct { id: 4, name: "Планшет", price_range: (8_000.0, 30_000.0) },
];

/// Days of history generated, ending at `today`
pub const DEMO_DAYS: i64 = 31;

/// Replace all sales with 5-15 random sales per day over the last 31 days
///
/// Returns the number of sales written.
pub async fn seed_demo_sales<R: Rng>(
    store: &dyn EventStore,
    today: NaiveDate,
    rng: &mut R,
) -> Result<usize, StoreError> {
    let removed = store.clear_sales().await?;
    log::debug!("🧹 Removed {} existing sales before seeding", removed);

    let start = today - Duration::days(DEMO_DAYS - 1);
    let mut written = 0;

    for offset in 0..DEMO_DAYS {
        let day = start + Duration::days(offset);
        for _ in 0..rng.gen_range(5..=15) {
            let product = &PRODUCTS[rng.gen_range(0..PRODUCTS.len())];
            let price = rng.gen_range(product.price_range.0..product.price_range.1);
            store
                .record_sale(NewSale {
                    product_id: product.id,
                    product_name: product.name.to_string(),
                    amount: (price * 100.0).round() / 100.0,
                    occurred_on: day,
                    actor_id: rng.gen_range(100_000..=999_999),
                })
                .await?;
            written += 1;
        }
    }

    log::info!("🌱 Seeded {} demo sales from {} to {}", written, start, today);
    Ok(written)
}
