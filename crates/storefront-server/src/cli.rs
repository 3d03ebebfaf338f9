use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront data layer: cache maintenance and pool diagnostics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: storefront.toml)
    #[arg(short, long, global = true, env = "STOREFRONT_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show cache backend, live keys per family and pool occupancy
    Stats(StatsArgs),
    /// Read the product list through the cache
    Catalog(CatalogArgs),
    /// Invalidate one resource kind, or a single entry with --id
    Invalidate(InvalidateArgs),
    /// Invalidate every cache family
    InvalidateAll,
    /// Remove every key matching a glob (e.g. "products:*")
    Clear(ClearArgs),
    /// Apply a content-change event, as the webhook endpoint would
    Webhook(WebhookArgs),
    /// Check the data store and the cache backend
    Ping,
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct StatsArgs {
    /// Also print metrics in Prometheus text format
    #[arg(long)]
    pub metrics: bool,
}

#[derive(clap::Args)]
pub struct CatalogArgs {
    /// Category slug
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
    #[arg(long, default_value_t = storefront_cache::Page::DEFAULT_LIMIT)]
    pub limit: u32,
}

#[derive(clap::Args)]
pub struct InvalidateArgs {
    /// Resource kind (catalog_list, catalog_item, category_list, search,
    /// analytics, order_stats, user_profile)
    pub kind: storefront_cache::ResourceKind,
    /// Identifier for id-addressed kinds (catalog_item, user_profile)
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(clap::Args)]
pub struct ClearArgs {
    /// Key glob
    pub pattern: String,
}

#[derive(clap::Args)]
pub struct WebhookArgs {
    /// Event type: product, category or all
    #[arg(value_name = "TYPE")]
    pub kind: String,
    #[arg(long)]
    pub id: Option<String>,
}
