//! Data models for the card collection.
//!
//! Every persisted record embeds [`EntityMeta`]: an opaque id, a soft-delete
//! flag and audit timestamps. Persistence behavior lives in the `database`
//! module; these types are plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// Identity, soft-delete flag and audit timestamps shared by all entities.
///
/// `id` is generated at creation and never changes. Soft-deleted rows are
/// flagged, never physically removed, and hidden from default queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Local snapshot of the signed-in user (or guest placeholder).
///
/// A profile starts as a guest (`guest_id` set) and may later gain a provider
/// id and email when upgraded to a full account; both ids coexist after the
/// link so guest-created data stays reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub meta: EntityMeta,
    /// Provider user id (external auth). None for guests.
    pub provider_user_id: Option<String>,
    /// Email address, unique (case-insensitive) when present.
    pub email: Option<String>,
    /// Local guest id, set when the user started as a guest.
    pub guest_id: Option<String>,
    pub display_name: Option<String>,
    /// Optional password hash. The credential vault keeps its own table; this
    /// field only mirrors whether a local password exists.
    pub password_hash: Option<String>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self {
            meta: EntityMeta::new(),
            provider_user_id: None,
            email: None,
            guest_id: None,
            display_name: None,
            password_hash: None,
        }
    }

    /// A fresh guest profile with a generated guest id.
    pub fn guest() -> Self {
        let mut profile = Self::new();
        profile.guest_id = Some(Uuid::new_v4().to_string());
        profile
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// A user-owned collection (e.g. "PC - 90s inserts", "Basketball rookies").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub meta: EntityMeta,
    pub owner_user_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Collection {
    pub fn new(owner_user_id: &str, name: &str) -> Self {
        Self {
            meta: EntityMeta::new(),
            owner_user_id: owner_user_id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }
}

/// A single card in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub meta: EntityMeta,
    pub collection_id: String,
    /// Full recognized or listing title, e.g.
    /// "2020 Select Silver Prizm #66 - Patrick Mahomes II".
    pub name: String,
    pub player: String,
    pub team: String,
    /// Release year; 0 means unknown.
    pub year: i64,
    pub set_name: String,
    /// Card number within the set, e.g. "#307".
    pub number: String,
    /// Grading company (PSA/BGS/SGC); "Raw" for ungraded cards.
    pub grade_company: String,
    pub grade: Option<f64>,
    pub purchase_price: Option<Money>,
    pub estimated_value: Option<Money>,
    pub photo_path: Option<String>,
}

impl Card {
    pub fn new(collection_id: &str) -> Self {
        Self {
            meta: EntityMeta::new(),
            collection_id: collection_id.to_string(),
            name: String::new(),
            player: String::new(),
            team: String::new(),
            year: 0,
            set_name: String::new(),
            number: String::new(),
            grade_company: "Raw".to_string(),
            grade: None,
            purchase_price: None,
            estimated_value: None,
            photo_path: None,
        }
    }
}

/// Kind tag for a card image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[default]
    Front,
    Back,
    Slab,
    Raw,
    Marketplace,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Front => "front",
            ImageKind::Back => "back",
            ImageKind::Slab => "slab",
            ImageKind::Raw => "raw",
            ImageKind::Marketplace => "marketplace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "front" => Some(ImageKind::Front),
            "back" => Some(ImageKind::Back),
            "slab" => Some(ImageKind::Slab),
            "raw" => Some(ImageKind::Raw),
            "marketplace" => Some(ImageKind::Marketplace),
            _ => None,
        }
    }
}

/// Image path/URI for a card (front/back/scans). Multiple per card allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardImage {
    pub meta: EntityMeta,
    pub card_id: String,
    /// Local file path or URI.
    pub path: String,
    pub kind: ImageKind,
}

impl CardImage {
    pub fn new(card_id: &str, path: &str, kind: ImageKind) -> Self {
        Self {
            meta: EntityMeta::new(),
            card_id: card_id.to_string(),
            path: path.to_string(),
            kind,
        }
    }
}

/// Where a price observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    User,
    Marketplace,
    Other,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::User => "user",
            PriceSource::Marketplace => "marketplace",
            PriceSource::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(PriceSource::User),
            "marketplace" => Some(PriceSource::Marketplace),
            "other" => Some(PriceSource::Other),
            _ => None,
        }
    }
}

/// Time-series price observation for a card. Append-only: snapshots are
/// inserted once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub meta: EntityMeta,
    pub card_id: String,
    pub price: Money,
    pub source: PriceSource,
    /// When the price was observed (UTC).
    pub observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(card_id: &str, price: Money, source: PriceSource) -> Self {
        Self {
            meta: EntityMeta::new(),
            card_id: card_id.to_string(),
            price,
            source,
            observed_at: Utc::now(),
        }
    }
}

/// Permission level on a shared collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    #[default]
    Viewer,
    Editor,
    Owner,
}

impl SharePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::Viewer => "viewer",
            SharePermission::Editor => "editor",
            SharePermission::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Some(SharePermission::Viewer),
            "editor" => Some(SharePermission::Editor),
            "owner" => Some(SharePermission::Owner),
            _ => None,
        }
    }
}

/// Sharing metadata for a collection (by email) with a permission level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionShare {
    pub meta: EntityMeta,
    pub collection_id: String,
    pub invitee_email: String,
    pub permission: SharePermission,
}

impl CollectionShare {
    pub fn new(collection_id: &str, invitee_email: &str, permission: SharePermission) -> Self {
        Self {
            meta: EntityMeta::new(),
            collection_id: collection_id.to_string(),
            invitee_email: invitee_email.to_string(),
            permission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_meta_generates_unique_ids() {
        let a = EntityMeta::new();
        let b = EntityMeta::new();
        assert_ne!(a.id, b.id);
        assert!(!a.is_deleted);
        assert!(a.updated_at >= a.created_at);
    }

    #[test]
    fn guest_profile_has_guest_id_only() {
        let guest = UserProfile::guest();
        assert!(guest.guest_id.is_some());
        assert!(guest.provider_user_id.is_none());
        assert!(guest.email.is_none());
    }

    #[test]
    fn new_card_defaults_to_raw_and_unknown_year() {
        let card = Card::new("col-1");
        assert_eq!(card.grade_company, "Raw");
        assert_eq!(card.year, 0);
        assert!(card.purchase_price.is_none());
        assert!(card.estimated_value.is_none());
    }

    #[test]
    fn image_kind_round_trips() {
        for kind in [
            ImageKind::Front,
            ImageKind::Back,
            ImageKind::Slab,
            ImageKind::Raw,
            ImageKind::Marketplace,
        ] {
            assert_eq!(ImageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ImageKind::parse("hologram"), None);
    }

    #[test]
    fn price_source_parse_is_case_insensitive() {
        assert_eq!(PriceSource::parse("Marketplace"), Some(PriceSource::Marketplace));
        assert_eq!(PriceSource::parse("USER"), Some(PriceSource::User));
        assert_eq!(PriceSource::parse("scraper"), None);
    }
}
