use anyhow::{Context, Result};
use serde_json::json;
use storefront_cache::{InvalidationEvent, Page};
use storefront_server::{AppConfig, AppState, DataStoreClient, DataStoreError};

use crate::cli::{CatalogArgs, ClearArgs, InvalidateArgs, OutputFormat, StatsArgs, WebhookArgs};
use crate::output::{print_field, print_json, print_success, print_table, print_warning};

pub async fn stats(state: &AppState, args: &StatsArgs, format: OutputFormat) -> Result<()> {
    let families = state.cache.family_counts().await;
    let pool = state.executor.stats();

    match format {
        OutputFormat::Json => print_json(&json!({
            "cache_backend": state.cache.backend_name(),
            "families": families,
            "pool": pool,
        }))?,
        OutputFormat::Table => {
            print_field("Cache backend", state.cache.backend_name());
            print_table(
                ["Family", "Live keys"],
                families
                    .iter()
                    .map(|(family, count)| [family.to_string(), count.to_string()]),
            );
            print_field(
                "Pool",
                format!(
                    "{} total, {} active, {} idle (max {}, {:.0}% utilized)",
                    pool.total,
                    pool.active,
                    pool.idle,
                    pool.max_pool_size,
                    pool.utilization_rate * 100.0
                ),
            );
        }
    }

    if args.metrics {
        if let Some(rendered) = storefront_server::metrics::render_metrics() {
            println!("{rendered}");
        }
    }
    Ok(())
}

pub async fn catalog(state: &AppState, args: &CatalogArgs) -> Result<()> {
    let rows = state
        .catalog(args.category.as_deref(), Page::new(args.offset, args.limit))
        .await
        .context("Failed to read catalog")?;
    print_json(&rows)
}

pub async fn invalidate(state: &AppState, args: &InvalidateArgs) -> Result<()> {
    let removed = state
        .invalidator
        .invalidate(args.kind, args.id.as_deref())
        .await;
    print_success(&format!("Invalidated {} ({removed} removed)", args.kind));
    Ok(())
}

pub async fn invalidate_all(state: &AppState) -> Result<()> {
    let removed = state.invalidator.invalidate_all().await;
    print_success(&format!("Invalidated all families ({removed} removed)"));
    Ok(())
}

pub async fn clear(state: &AppState, args: &ClearArgs) -> Result<()> {
    let removed = state.cache.clear_pattern(&args.pattern).await;
    print_success(&format!("Cleared {} ({removed} removed)", args.pattern));
    Ok(())
}

pub async fn webhook(state: &AppState, args: &WebhookArgs, format: OutputFormat) -> Result<()> {
    let event = InvalidationEvent::new(args.kind.clone(), args.id.clone());
    let outcome = state.invalidator.handle_webhook(&event).await;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table if outcome.success => print_success(&format!(
            "Handled '{}' event ({} removed)",
            outcome.invalidated, outcome.removed
        )),
        OutputFormat::Table => print_warning(&format!(
            "Ignored unknown event type '{}'",
            outcome.invalidated
        )),
    }
    Ok(())
}

pub async fn ping(state: &AppState) -> Result<()> {
    state
        .executor
        .execute_query(async |client: &DataStoreClient| {
            client.ping().await?;
            Ok::<_, DataStoreError>(())
        })
        .await
        .context("Data store is unreachable")?;
    print_success("Data store reachable");

    state
        .cache
        .store()
        .exists("storefront:ping")
        .await
        .context("Cache backend is unreachable")?;
    print_success(&format!(
        "Cache backend '{}' reachable",
        state.cache.backend_name()
    ));
    Ok(())
}

pub fn show_config(config: &AppConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
