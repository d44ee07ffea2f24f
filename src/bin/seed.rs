//! Seed script for development — pushes a sample diet through the pipeline.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` (reads .env). Set `SEED_USER_ID` to reuse a user
//! across runs and watch re-extraction carry records forward.

use dietly::services::delivery::LogDelivery;
use dietly::services::lifecycle;
use uuid::Uuid;

const SAMPLE_DIET: &str = "\
THURSDAY- 14 AUG
5:30 AM- 1 glass jeera water
8 AM- vegetable poha with peanuts
1 PM- dal, roti, salad
6:30 PM- green tea
FRIDAY- 15 AUG
6 AM- almonds
8:30 AM- oats with milk
1:15 PM- curd rice
Drink plenty of water through the day.
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = dietly::db::create_pool(&db_url, 5).await?;
    dietly::db::run_migrations(&pool).await?;

    println!("=== Dietly Seed Script ===");

    let user_id = std::env::var("SEED_USER_ID")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(Uuid::new_v4);

    let delivery = LogDelivery;
    let records = lifecycle::re_extract(
        &pool,
        &delivery,
        user_id,
        SAMPLE_DIET,
        chrono_tz::Asia::Kolkata,
    )
    .await?;

    println!("[done] Extracted {} records for user {user_id}", records.len());
    for record in &records {
        println!(
            "  {} {:?} gen={} next={:?} :: {}",
            record.fire_time.format("%H:%M"),
            record.days(),
            record.generation,
            record.next_fire_utc,
            record.message
        );
    }

    println!("\n=== Seed complete! ===");
    println!("Re-run with SEED_USER_ID={user_id} to exercise idempotent re-extraction.");

    Ok(())
}
