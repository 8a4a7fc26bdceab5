use anyhow::Result;
use clap::Args;
use tabetti_core::CustomerId;
use tabetti_reputation::config::Config;

#[derive(Debug, Args)]
pub struct RecomputeArgs {
    /// Customers per page (defaults to maintenance.batch_size)
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Print drifted customers as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CustomerArgs {
    /// Customer (account) id
    #[arg(long)]
    pub id: i64,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Batch recompute. Fails (non-zero exit) if any customer could not be
/// recomputed; the others are still committed.
pub async fn recompute(config: &Config, args: RecomputeArgs) -> Result<()> {
    let batch_size = args.batch_size.unwrap_or(config.maintenance.batch_size);

    let storage = super::open_storage(config).await?;
    let report = storage.recompute_all_trust_scores(batch_size).await?;
    storage.close().await;

    if args.json {
        super::print_json(&report)?;
    } else {
        println!("processed: {}", report.processed);
        println!("changed:   {}", report.changed);
        println!("skipped:   {}", report.skipped);
        println!("failed:    {}", report.failures.len());
        for failure in &report.failures {
            println!("  customer {}: {}", failure.customer, failure.error);
        }
    }

    if !report.is_success() {
        anyhow::bail!(
            "Trust recompute failed for {} customer(s)",
            report.failures.len()
        );
    }

    Ok(())
}

pub async fn audit(config: &Config, args: AuditArgs) -> Result<()> {
    let storage = super::open_storage(config).await?;
    let drift = storage.audit_counters().await?;
    storage.close().await;

    if args.json {
        return super::print_json(&drift);
    }

    if drift.is_empty() {
        println!("No drift: stored trust state matches reviews and follows");
        return Ok(());
    }

    println!("{} customer(s) drifted:", drift.len());
    for d in &drift {
        println!(
            "  customer {}: reviews {} -> {}, likes {} -> {}, followers {} -> {}, trust {} -> {}",
            d.customer,
            d.stored.review_count,
            d.actual.review_count,
            d.stored.total_likes,
            d.actual.total_likes,
            d.stored.follower_count,
            d.actual.follower_count,
            d.stored_trust,
            d.expected_trust
        );
    }
    println!("Run `tabetti recompute-trust` to repair.");

    Ok(())
}

pub async fn customer(config: &Config, args: CustomerArgs) -> Result<()> {
    let storage = super::open_storage(config).await?;
    let id = CustomerId(args.id);

    let Some(record) = storage.get_customer(id).await? else {
        anyhow::bail!("Customer {} not found", id);
    };
    storage.close().await;

    if args.json {
        return super::print_json(&record);
    }

    println!("customer:   {} ({})", record.id, record.display_name);
    println!("reviews:    {}", record.counters.review_count);
    println!("likes:      {}", record.counters.total_likes);
    println!("followers:  {}", record.counters.follower_count);
    println!("trust:      {}", record.trust_score);
    match record.trust_updated_at {
        Some(at) => println!("updated_at: {}", at),
        None => println!("updated_at: never"),
    }

    Ok(())
}
