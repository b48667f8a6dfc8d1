//! Card Vault - collectible card inventory and marketplace valuation.
//!
//! Tracks a local card collection in a single SQLite file and values it by
//! matching OCR-recognized card text against live marketplace listings.
//! Matched listings are promoted into cards, images and price snapshots in
//! the same store, under the same soft-delete and audit rules.

pub mod auth;
pub mod collection;
pub mod database;
pub mod error;
pub mod image_store;
pub mod marketplace;
pub mod matching;
pub mod models;
pub mod money;
pub mod normalize;
pub mod recognition;

// Re-export commonly used items
pub use auth::{CredentialVault, VerifyOutcome};
pub use collection::{CascadePolicy, CollectionService};
pub use database::{Entity, Store};
pub use error::{StoreError, StoreResult};
pub use image_store::ImageStore;
pub use marketplace::{Listing, MarketplaceClient};
pub use matching::{rank_by_title_overlap, select_best};
pub use models::{
    Card, CardImage, Collection, CollectionShare, EntityMeta, ImageKind, PriceSnapshot,
    PriceSource, SharePermission, UserProfile,
};
pub use money::Money;
pub use normalize::normalize;
pub use recognition::{OcrEngine, OcrError};
