use anyhow::Result;
use tabetti_reputation::config::Config;
use tracing::info;

pub async fn init(config: &Config) -> Result<()> {
    info!("Initializing database: {}", config.database.url);

    let storage = super::open_storage(config).await?;
    storage.health_check().await?;

    let stats = storage.stats().await?;
    println!("Database ready: {}", config.database.url);
    println!("  accounts:  {}", stats.account_count);
    println!("  customers: {}", stats.customer_count);
    println!("  stores:    {}", stats.store_count);
    println!("  reviews:   {}", stats.review_count);
    println!("  follows:   {}", stats.follow_count);

    storage.close().await;
    Ok(())
}
