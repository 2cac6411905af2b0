//! Utility to inspect the record store schema and print table structures.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

/// Relations the search engine reads from.
const RELATIONS: &[&str] = &["leads", "opportunities", "transfer_check_view"];

/// Main entry point for the schema inspection utility.
///
/// Connects to the database and lists columns for every relation the search reads,
/// flagging any that are missing.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    for relation in RELATIONS {
        let columns: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
        )
        .bind(relation)
        .fetch_all(&pool)
        .await?;

        if columns.is_empty() {
            println!("- {} (missing)", relation);
            continue;
        }

        println!("- {}", relation);
        for (col, type_) in columns {
            println!("  - {}: {}", col, type_);
        }
        println!();
    }

    Ok(())
}
