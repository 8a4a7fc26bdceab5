use anyhow::Result;
use clap::Args;
use tabetti_core::StoreId;
use tabetti_reputation::config::Config;

#[derive(Debug, Args)]
pub struct RatingArgs {
    /// Store id
    #[arg(long)]
    pub store_id: i64,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TopStoresArgs {
    /// Number of stores to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Ignore stores with fewer reviews than this
    #[arg(long, default_value_t = 1)]
    pub min_reviews: u64,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

fn fmt_avg(avg: Option<f64>) -> String {
    avg.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

pub async fn rating(config: &Config, args: RatingArgs) -> Result<()> {
    let storage = super::open_storage(config).await?;
    let store = StoreId(args.store_id);

    let Some(ctx) = storage.get_rating_context(store).await? else {
        anyhow::bail!("Store {} not found", store);
    };
    storage.close().await;

    if args.json {
        return super::print_json(&ctx);
    }

    println!("store:    {}", ctx.store_id);
    println!("reviews:  {}", ctx.review_count);
    println!("simple:   {}", fmt_avg(ctx.simple_average));
    println!("weighted: {}", fmt_avg(ctx.weighted_average));

    Ok(())
}

pub async fn top_stores(config: &Config, args: TopStoresArgs) -> Result<()> {
    let storage = super::open_storage(config).await?;
    let ranked = storage.top_rated_stores(args.limit, args.min_reviews).await?;
    storage.close().await;

    if args.json {
        return super::print_json(&ranked);
    }

    if ranked.is_empty() {
        println!("No stores with at least {} review(s)", args.min_reviews);
        return Ok(());
    }

    println!("{:>4}  {:>8}  {:>8}  {:>8}  {:>7}", "rank", "store", "weighted", "simple", "reviews");
    for (i, entry) in ranked.iter().enumerate() {
        println!(
            "{:>4}  {:>8}  {:>8}  {:>8}  {:>7}",
            i + 1,
            entry.store_id,
            fmt_avg(entry.summary.weighted_average),
            fmt_avg(entry.summary.simple_average),
            entry.summary.review_count
        );
    }

    Ok(())
}
