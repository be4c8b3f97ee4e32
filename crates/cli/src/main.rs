//! SecureCart CLI - Database migrations and checkout store operations.
//!
//! # Usage
//!
//! ```bash
//! # Run checkout database migrations
//! sc-cli migrate
//!
//! # Load the sample catalog
//! sc-cli seed
//!
//! # Put two units of product 1 in user 7's cart and check out
//! sc-cli cart add --user 7 --product 1 --quantity 2
//! sc-cli order create --user 7
//!
//! # Pay for order 1 (card fields can also come from SC_CARD_* variables)
//! sc-cli payment process --user 7 --order 1 \
//!     --card-number 4111111111111111 --card-holder "Ada Lovelace" \
//!     --expiry-date 12/30 --cvv 737
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert the sample catalog into an empty store
//! - `product` - List, show and add products
//! - `cart` - Show and edit a user's cart
//! - `order` - Check out a cart, list and show orders
//! - `payment` - Record a payment, show a stored card
//!
//! Every command except `migrate` and `seed` prints its result as JSON on stdout.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use securecart_core::{OrderId, PaymentId, Price, ProductId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "SecureCart checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert the sample catalog (skipped if products already exist)
    Seed,
    /// Manage products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage a user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Check out and read orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Record and inspect payments
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List all products
    List,
    /// Show one product
    Show {
        #[arg(short, long)]
        id: ProductId,
    },
    /// Add a product
    Add {
        #[arg(short, long)]
        name: String,

        /// Unit price, e.g. 19.99
        #[arg(short, long)]
        price: Price,

        #[arg(short, long, default_value_t = 0)]
        stock: i32,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        image_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show a user's cart
    Show {
        #[arg(short, long)]
        user: UserId,
    },
    /// Add units of a product, merging with an existing line
    Add {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: i32,
    },
    /// Set the quantity of a line already in the cart
    Update {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long)]
        quantity: i32,
    },
    /// Remove a product from the cart
    Remove {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        product: ProductId,
    },
    /// Empty the cart
    Clear {
        #[arg(short, long)]
        user: UserId,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Turn the user's cart into an order
    Create {
        #[arg(short, long)]
        user: UserId,
    },
    /// List a user's orders, newest first
    List {
        #[arg(short, long)]
        user: UserId,
    },
    /// Show one order with its lines
    Show {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        order: OrderId,
    },
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Record a card payment and mark the order paid
    Process {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        order: OrderId,

        #[arg(long, env = "SC_CARD_NUMBER", hide_env_values = true)]
        card_number: String,

        #[arg(long, env = "SC_CARD_HOLDER")]
        card_holder: String,

        /// Expiry as MM/YY
        #[arg(long, env = "SC_CARD_EXPIRY")]
        expiry_date: String,

        #[arg(long, env = "SC_CARD_CVV", hide_env_values = true)]
        cvv: String,
    },
    /// Show the stored card behind a payment, masked
    Show {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        payment: PaymentId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let _ = dotenvy::dotenv();
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|v| !v.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry();

    // Logs go to stderr so stdout stays clean JSON
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "securecart_checkout=info,sc_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => commands::seed::sample_catalog().await?,
        Commands::Product { action } => {
            let shop = commands::connect().await?;
            match action {
                ProductAction::List => commands::print_json(&shop.catalog().list_products().await?)?,
                ProductAction::Show { id } => {
                    commands::print_json(&shop.catalog().get_product(id).await?)?;
                }
                ProductAction::Add {
                    name,
                    price,
                    stock,
                    description,
                    image_url,
                } => {
                    let product = securecart_checkout::models::NewProduct {
                        name,
                        description,
                        price,
                        stock,
                        image_url,
                    };
                    commands::print_json(&shop.catalog().create_product(&product).await?)?;
                }
            }
        }
        Commands::Cart { action } => {
            let shop = commands::connect().await?;
            match action {
                CartAction::Show { user } => commands::print_json(&shop.cart().get_cart(user).await?)?,
                CartAction::Add {
                    user,
                    product,
                    quantity,
                } => commands::print_json(&shop.cart().add_item(user, product, quantity).await?)?,
                CartAction::Update {
                    user,
                    product,
                    quantity,
                } => commands::print_json(
                    &shop.cart().update_quantity(user, product, quantity).await?,
                )?,
                CartAction::Remove { user, product } => {
                    shop.cart().remove_item(user, product).await?;
                    commands::print_json(&serde_json::json!({ "removed": product }))?;
                }
                CartAction::Clear { user } => {
                    let removed = shop.cart().clear(user).await?;
                    commands::print_json(&serde_json::json!({ "removed": removed }))?;
                }
            }
        }
        Commands::Order { action } => {
            let shop = commands::connect().await?;
            match action {
                OrderAction::Create { user } => {
                    commands::print_json(&shop.orders().create_order(user).await?)?;
                }
                OrderAction::List { user } => {
                    commands::print_json(&shop.orders().list_orders(user).await?)?;
                }
                OrderAction::Show { user, order } => {
                    commands::print_json(&shop.orders().get_order(user, order).await?)?;
                }
            }
        }
        Commands::Payment { action } => {
            let shop = commands::connect().await?;
            match action {
                PaymentAction::Process {
                    user,
                    order,
                    card_number,
                    card_holder,
                    expiry_date,
                    cvv,
                } => {
                    let card = securecart_checkout::models::CardDetails {
                        card_number: SecretString::from(card_number),
                        card_holder,
                        expiry_date,
                        cvv: SecretString::from(cvv),
                    };
                    commands::print_json(&shop.payments().process_payment(user, order, &card).await?)?;
                }
                PaymentAction::Show { user, payment } => {
                    commands::print_json(&shop.payments().card_on_file(user, payment).await?)?;
                }
            }
        }
    }
    Ok(())
}
