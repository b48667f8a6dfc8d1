//! Card Vault CLI - manage a local card collection and value it against
//! live marketplace listings.

use card_vault::{
    normalize, rank_by_title_overlap, select_best, CollectionService, Money, PriceSource, Store,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "card_vault")]
#[command(version, about = "Card collection tracker with marketplace valuation", long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Marketplace API bearer token (falls back to MARKETPLACE_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new collection
    NewCollection {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List collections for the local user
    Collections,
    /// List the cards in a collection, newest first
    List { collection_id: String },
    /// Find cards in the inventory by free text
    Find { text: String },
    /// Search marketplace listings for a card description
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Search the marketplace and add the best-matching listing to a collection
    Add {
        collection_id: String,
        query: String,
    },
    /// Record a price snapshot for a card
    RecordPrice {
        card_id: String,
        price: String,
        #[arg(long, default_value = "user")]
        source: String,
    },
    /// Show the recorded price history for a card
    History { card_id: String },
}

/// Returns the default database path: ~/.local/share/card_vault/collection.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card_vault")
        .join("collection.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let store = match Store::open(&args.database) {
        Ok(store) => store,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    let service = CollectionService::new(store);

    let token = args
        .token
        .or_else(|| std::env::var("MARKETPLACE_TOKEN").ok())
        .unwrap_or_default();

    let result = run(&service, &token, args.command).await;
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(
    service: &CollectionService,
    token: &str,
    command: Command,
) -> card_vault::StoreResult<()> {
    match command {
        Command::NewCollection { name, description } => {
            let owner = service.ensure_local_profile()?;
            let collection =
                service.create_collection(&owner.meta.id, &name, description.as_deref())?;
            println!("{}  {}", collection.meta.id, collection.name);
        }
        Command::Collections => {
            let owner = service.ensure_local_profile()?;
            for collection in service.collections_for_owner(&owner.meta.id)? {
                println!("{}  {}", collection.meta.id, collection.name);
            }
        }
        Command::List { collection_id } => {
            for card in service.list_cards(&collection_id)? {
                println!(
                    "{}  {}  (est. {})",
                    card.meta.id,
                    card.name,
                    card.estimated_value
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "?".to_string())
                );
            }
        }
        Command::Find { text } => {
            for card in service.search_cards(&text)? {
                println!("{}  {}", card.meta.id, card.name);
            }
        }
        Command::Search { query, limit } => {
            let client = card_vault::MarketplaceClient::new(token);
            let mut listings = client.search(&query, limit).await;
            if listings.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            rank_by_title_overlap(&normalize(&query), &mut listings);
            for listing in &listings {
                println!(
                    "{}  {}  {}",
                    listing
                        .price
                        .map(|p| format!("{} {}", p, listing.currency))
                        .unwrap_or_else(|| "?".to_string()),
                    listing.title,
                    listing.url
                );
            }
        }
        Command::Add {
            collection_id,
            query,
        } => {
            let client = card_vault::MarketplaceClient::new(token);
            let candidates = client.search(&query, 5).await;
            match select_best(&candidates) {
                Some(listing) => {
                    let card = service.promote_listing_to_card(listing, &collection_id)?;
                    println!("Added card {}: {}", card.meta.id, card.name);
                }
                None => println!("No results found."),
            }
        }
        Command::RecordPrice {
            card_id,
            price,
            source,
        } => {
            let Some(price) = Money::parse(&price) else {
                log::error!("Unparseable price: {}", price);
                std::process::exit(2);
            };
            let source = PriceSource::parse(&source).unwrap_or_default();
            let snapshot = service.record_price(&card_id, price, source)?;
            println!(
                "Recorded {} ({}) at {}",
                snapshot.price,
                snapshot.source.as_str(),
                snapshot.observed_at.to_rfc3339()
            );
        }
        Command::History { card_id } => {
            for snapshot in service.price_history(&card_id)? {
                println!(
                    "{}  {}  ({})",
                    snapshot.observed_at.to_rfc3339(),
                    snapshot.price,
                    snapshot.source.as_str()
                );
            }
        }
    }
    Ok(())
}
