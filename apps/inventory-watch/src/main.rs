//! # inventory-watch
//!
//! Terminal front end for the products sync.
//!
//! ## Commands
//! - `watch` (default): initial load, then log every realtime change
//! - `list`: one listing, marked when served from the local cache
//! - `decrease <id> [quantity]`: take units from stock
//! - `whoami`: decoded claims of the current access token
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=vivaas=trace` - Trace the vivaas crates only
//! - Default: `info,vivaas=debug,reqwest=warn`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vivaas_core::Product;
use vivaas_sync::{InventoryConfig, ProductSyncService, ProductsSync, RestGateway};

#[derive(Debug, Parser)]
#[command(name = "inventory-watch", version, about = "Watch and adjust the product inventory")]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, env = "VIVAAS_CONFIG")]
    config: Option<PathBuf>,

    /// Sign in with this email before running the command.
    #[arg(long, env = "VIVAAS_EMAIL", requires = "password")]
    email: Option<String>,

    #[arg(long, env = "VIVAAS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load products and follow realtime changes until Ctrl-C.
    Watch,
    /// Print the current products once.
    List,
    /// Take units from a product's stock.
    Decrease {
        product_id: String,
        #[arg(default_value_t = 1)]
        quantity: u32,
    },
    /// Show who the current session belongs to.
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = InventoryConfig::load_or_default(cli.config.clone());
    config.validate().context("invalid inventory configuration")?;
    info!(backend = %config.backend.url, table = %config.backend.table, "Configuration loaded");

    let gateway = Arc::new(RestGateway::new(&config).context("cannot build backend client")?);
    let service = ProductSyncService::new(gateway, &config);

    if let (Some(email), Some(password)) = (&cli.email, &cli.password) {
        service
            .sign_in(email, password)
            .await
            .context("sign-in failed")?;
    }

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(service, &config).await,
        Command::List => {
            let listing = service.list_products().await;
            if let Some(error) = listing.error() {
                warn!(%error, "Showing cached products");
            }
            for product in &listing.products {
                print_product(product);
            }
            Ok(())
        }
        Command::Decrease {
            product_id,
            quantity,
        } => {
            let product = service.decrease_stock(&product_id, quantity).await?;
            print_product(&product);
            Ok(())
        }
        Command::Whoami => {
            match service.session_claims().await {
                Some(claims) => println!(
                    "user={} email={} role={} expires={}",
                    claims.sub.as_deref().unwrap_or("-"),
                    claims.email.as_deref().unwrap_or("-"),
                    claims.role.as_deref().unwrap_or("-"),
                    claims
                        .expires_at()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                None => println!("not signed in"),
            }
            Ok(())
        }
    }
}

async fn watch(service: ProductSyncService<RestGateway>, config: &InventoryConfig) -> anyhow::Result<()> {
    let mut sync = ProductsSync::new(service, config);
    let mut state_rx = sync.subscribe();

    sync.start().await;

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                info!(
                    products = state.products.len(),
                    loading = state.is_loading,
                    auth = ?state.is_authenticated,
                    error = ?state.error,
                    "Products state"
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    sync.shutdown().await;
    Ok(())
}

fn print_product(product: &Product) {
    println!(
        "{:<38} {:<12} {:<28} {:>10} {:>5}  {}",
        product.id,
        product.item_number,
        product.name,
        product.discounted_price().to_string(),
        product.stock,
        product.stock_status(),
    );
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vivaas=debug,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
