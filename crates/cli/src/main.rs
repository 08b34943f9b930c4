//! Cartwheel CLI - local cart and remote sync from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 12 at 2.50
//! cartwheel add 12 --price 2.50 --qty 2 --title "Paneer"
//!
//! # Remove one unit
//! cartwheel remove 12
//!
//! # Show grouped lines and totals
//! cartwheel show
//!
//! # Print the server's cart, then replace the local cart with it
//! cartwheel remote
//! cartwheel pull
//! ```
//!
//! # Environment Variables
//!
//! See `cartwheel_storefront::config`. `CART_AUTH_TOKEN` supplies the bearer
//! credential; without it every change stays local.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use cartwheel_core::{CatalogItem, CurrencyCode, LineMetadata, ProductKey};
use cartwheel_storefront::{CartConfig, CartSession, telemetry};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use secrecy::SecretString;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel cart client")]
struct Cli {
    /// Bearer credential for the remote cart (overrides `CART_AUTH_TOKEN`)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add units of a product to the cart
    Add {
        /// Product key (SKU or numeric product ID)
        sku: ProductKey,

        /// Unit price, e.g. 2.50
        #[arg(short, long)]
        price: Decimal,

        /// Currency code (defaults to `CART_DEFAULT_CURRENCY`)
        #[arg(short, long)]
        currency: Option<CurrencyCode>,

        /// Display title
        #[arg(short, long)]
        title: Option<String>,

        /// Image URL
        #[arg(long)]
        image: Option<String>,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Remove units of a product from the cart
    Remove {
        /// Product key
        sku: ProductKey,

        /// Units to remove
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Print the quantity of a product
    Count {
        /// Product key
        sku: ProductKey,
    },
    /// Show grouped cart lines and totals
    Show,
    /// Print subtotal, tax and total
    Total,
    /// Print the server's view of the cart
    Remote,
    /// Replace the local cart with the server's cart
    Pull,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing();
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive until exit so queued events are flushed.
    let _sentry = telemetry::init_sentry(&config);
    telemetry::init_tracing();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            output::failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &CartConfig) -> cartwheel_storefront::Result<()> {
    let mut session = CartSession::from_config(config)?;
    if let Some(token) = cli.token.filter(|t| !t.trim().is_empty()) {
        session.set_credential(SecretString::from(token));
    }

    match cli.command {
        Commands::Add {
            sku,
            price,
            currency,
            title,
            image,
            qty,
        } => {
            let currency = currency.unwrap_or(config.pricing.default_currency);
            let item = CatalogItem::new(sku, price, currency).with_metadata(LineMetadata {
                title,
                image_url: image,
            });
            commands::cart::add(&mut session, &item, qty).await?;
        }
        Commands::Remove { sku, qty } => commands::cart::remove(&mut session, &sku, qty).await,
        Commands::Count { sku } => output::count(&sku, session.count_of(&sku)),
        Commands::Show => output::cart(&session.grouped(), &session.totals(), session.pricing()),
        Commands::Total => output::totals(&session.totals()),
        Commands::Remote => commands::remote::show(&session).await?,
        Commands::Pull => commands::remote::pull(&mut session).await?,
    }
    Ok(())
}
