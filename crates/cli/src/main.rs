//! Paperback CLI - Cart and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the persisted cart
//! paperback cart show
//!
//! # Add two copies of a catalogue product
//! paperback cart add 7 --title "Dune" --price 19.99 --stock 5 --quantity 2
//!
//! # Change a quantity (0 or less removes the line)
//! paperback cart set 7 3
//!
//! # Check the cart against the merchant backend
//! paperback cart validate
//!
//! # Pay for the cart; card details come from the environment
//! PAPERBACK_CARD_NUMBER=4242424242424242 PAPERBACK_CARD_CVC=123 \
//!   paperback checkout -n "Ada Lovelace" -a "12 Analytical Way" \
//!   -c London -p "NW1 6XE" --country GB --exp-month 12 --exp-year 2030
//! ```
//!
//! # Commands
//!
//! - `cart` - Inspect and edit the cart
//! - `checkout` - Pay for the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use paperback_cart::ClientConfig;
use paperback_core::ProductId;
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "paperback")]
#[command(author, version, about = "Paperback cart and checkout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the cart
    Checkout(CheckoutArgs),
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a catalogue product
    Add {
        /// Product ID
        product_id: ProductId,

        /// Product title as shown in the catalogue
        #[arg(short, long)]
        title: String,

        /// Unit price as shown in the catalogue
        #[arg(short, long)]
        price: Decimal,

        /// Stock as shown in the catalogue
        #[arg(short, long)]
        stock: u32,

        /// Cover image URL
        #[arg(long)]
        image_url: Option<String>,

        /// Copies to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line
    Set {
        /// Product ID
        product_id: ProductId,

        /// New quantity; 0 or less removes the line
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
    /// Check the cart against the merchant backend
    Validate,
}

/// Shipping and card details for a checkout.
#[derive(clap::Args)]
struct CheckoutArgs {
    /// Recipient full name
    #[arg(short = 'n', long)]
    name: String,

    /// Street address
    #[arg(short, long)]
    address: String,

    /// City
    #[arg(short, long)]
    city: String,

    /// Postal code
    #[arg(short, long)]
    postal_code: String,

    /// Two-letter country code
    #[arg(long)]
    country: String,

    /// Card number
    #[arg(long, env = "PAPERBACK_CARD_NUMBER", hide_env_values = true)]
    card_number: String,

    /// Card expiry month
    #[arg(long, env = "PAPERBACK_CARD_EXP_MONTH")]
    exp_month: u8,

    /// Card expiry year
    #[arg(long, env = "PAPERBACK_CARD_EXP_YEAR")]
    exp_year: u16,

    /// Card verification code
    #[arg(long, env = "PAPERBACK_CARD_CVC", hide_env_values = true)]
    cvc: String,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Errors and warnings become Sentry events; info and debug become
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Logs go to stderr so command output stays clean. `PAPERBACK_LOG_FORMAT=json`
/// switches to one JSON object per line.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "paperback_cart=info,paperback_cli=info".into());

    let json = std::env::var("PAPERBACK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (text_layer, json_layer) = if json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Sentry needs the config, and config errors need logging, so load
    // first and report afterwards.
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Commands,
    config: &ClientConfig,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config),
            CartAction::Add {
                product_id,
                title,
                price,
                stock,
                image_url,
                quantity,
            } => {
                let listing = paperback_core::ProductListing {
                    id: product_id,
                    title,
                    price: price.into(),
                    stock,
                    image_url,
                };
                commands::cart::add(config, &listing, quantity).await
            }
            CartAction::Set {
                product_id,
                quantity,
            } => commands::cart::set(config, product_id, quantity).await,
            CartAction::Remove { product_id } => commands::cart::remove(config, product_id),
            CartAction::Clear => commands::cart::clear(config),
            CartAction::Validate => commands::cart::validate(config).await,
        },
        Commands::Checkout(args) => commands::checkout::run(config, args).await,
    }
}
