//! Collection service: the orchestration layer over the entity store.
//!
//! Creates collections, promotes marketplace listings into cards, records
//! price snapshots and answers collection queries. Deletion cascades are an
//! explicit policy here, never an implicit storage behavior.

use crate::database::Store;
use crate::error::StoreResult;
use crate::marketplace::Listing;
use crate::models::{
    Card, CardImage, Collection, CollectionShare, ImageKind, PriceSnapshot, PriceSource,
    SharePermission, UserProfile,
};
use crate::money::Money;

/// Which soft-deletes fan out to owned children.
///
/// Deleting a collection does not touch its cards and deleting a card does
/// not touch its images or snapshots unless explicitly enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadePolicy {
    /// Collection delete also soft-deletes its cards.
    pub collection_to_cards: bool,
    /// Card delete also soft-deletes its images and price snapshots.
    pub card_to_children: bool,
}

pub struct CollectionService {
    store: Store,
    cascade: CascadePolicy,
}

impl CollectionService {
    pub fn new(store: Store) -> Self {
        Self::with_cascade(store, CascadePolicy::default())
    }

    pub fn with_cascade(store: Store, cascade: CascadePolicy) -> Self {
        Self { store, cascade }
    }

    /// The local profile, creating a guest on first use.
    pub fn ensure_local_profile(&self) -> StoreResult<UserProfile> {
        let profiles: Vec<UserProfile> = self.store.list(false)?;
        // list() is newest-first; the oldest profile is the original local user.
        if let Some(profile) = profiles.into_iter().last() {
            return Ok(profile);
        }
        let mut guest = UserProfile::guest();
        self.store.upsert(&mut guest)?;
        log::info!("Created guest profile {}", guest.meta.id);
        Ok(guest)
    }

    pub fn upsert_user_profile(&self, profile: &mut UserProfile) -> StoreResult<()> {
        self.store.upsert(profile)
    }

    pub fn user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        self.store.user_by_email(email)
    }

    pub fn create_collection(
        &self,
        owner_user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<Collection> {
        let mut collection = Collection::new(owner_user_id, name);
        collection.description = description.map(str::to_string);
        self.store.upsert(&mut collection)?;
        log::info!("Created collection '{}' ({})", collection.name, collection.meta.id);
        Ok(collection)
    }

    pub fn collections_for_owner(&self, owner_user_id: &str) -> StoreResult<Vec<Collection>> {
        let mut collections: Vec<Collection> = self.store.list(false)?;
        collections.retain(|c| c.owner_user_id == owner_user_id);
        Ok(collections)
    }

    /// Builds a card from a marketplace listing and persists it together with
    /// its marketplace image in one transaction.
    ///
    /// Listing title becomes the card name, listing price the estimated
    /// value. A listing without an image URL simply yields a card with no
    /// image.
    pub fn promote_listing_to_card(
        &self,
        listing: &Listing,
        collection_id: &str,
    ) -> StoreResult<Card> {
        let mut card = Card::new(collection_id);
        card.name = listing.title.clone();
        card.estimated_value = listing.price;

        let mut image = (!listing.image_url.is_empty())
            .then(|| CardImage::new(&card.meta.id, &listing.image_url, ImageKind::Marketplace));

        self.store.insert_card_with_image(&mut card, image.as_mut())?;
        log::info!(
            "Promoted listing {} into card {} (value: {})",
            listing.listing_id,
            card.meta.id,
            card.estimated_value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(card)
    }

    pub fn add_card(&self, card: &mut Card) -> StoreResult<()> {
        self.store.upsert(card)
    }

    pub fn add_card_image(&self, image: &mut CardImage) -> StoreResult<()> {
        self.store.upsert(image)
    }

    /// Non-deleted cards of a collection, newest first.
    pub fn list_cards(&self, collection_id: &str) -> StoreResult<Vec<Card>> {
        self.store.cards_in_collection(collection_id)
    }

    pub fn get_card(&self, card_id: &str) -> StoreResult<Option<Card>> {
        self.store.get(card_id)
    }

    /// Free-text substring search over the whole inventory.
    pub fn search_cards(&self, text: &str) -> StoreResult<Vec<Card>> {
        self.store.search_cards(text)
    }

    pub fn card_images(&self, card_id: &str) -> StoreResult<Vec<CardImage>> {
        self.store.images_for_card(card_id)
    }

    /// Appends a price observation. Snapshots are written once and never
    /// updated; repeated calls grow the time series.
    pub fn record_price(
        &self,
        card_id: &str,
        price: Money,
        source: PriceSource,
    ) -> StoreResult<PriceSnapshot> {
        let mut snapshot = PriceSnapshot::new(card_id, price, source);
        self.store.upsert(&mut snapshot)?;
        log::debug!("Recorded {} price {} for card {}", source.as_str(), price, card_id);
        Ok(snapshot)
    }

    /// Price time series for a card, oldest observation first.
    pub fn price_history(&self, card_id: &str) -> StoreResult<Vec<PriceSnapshot>> {
        self.store.snapshots_for_card(card_id)
    }

    /// Soft-deletes a card; images and snapshots follow only when the
    /// cascade policy says so.
    pub fn delete_card(&self, card_id: &str) -> StoreResult<()> {
        self.store.soft_delete::<Card>(card_id)?;
        if self.cascade.card_to_children {
            for image in self.store.images_for_card(card_id)? {
                self.store.soft_delete::<CardImage>(&image.meta.id)?;
            }
            for snapshot in self.store.snapshots_for_card(card_id)? {
                self.store.soft_delete::<PriceSnapshot>(&snapshot.meta.id)?;
            }
        }
        Ok(())
    }

    /// Soft-deletes a collection; cards follow only when the cascade policy
    /// says so.
    pub fn delete_collection(&self, collection_id: &str) -> StoreResult<()> {
        self.store.soft_delete::<Collection>(collection_id)?;
        if self.cascade.collection_to_cards {
            for card in self.store.cards_in_collection(collection_id)? {
                self.delete_card(&card.meta.id)?;
            }
        }
        Ok(())
    }

    pub fn share_collection(
        &self,
        collection_id: &str,
        invitee_email: &str,
        permission: SharePermission,
    ) -> StoreResult<CollectionShare> {
        let mut share = CollectionShare::new(collection_id, invitee_email, permission);
        self.store.upsert(&mut share)?;
        Ok(share)
    }

    pub fn shares_for_collection(&self, collection_id: &str) -> StoreResult<Vec<CollectionShare>> {
        self.store.shares_for_collection(collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CollectionService {
        CollectionService::new(Store::open_in_memory().unwrap())
    }

    fn listing_with_image() -> Listing {
        Listing {
            listing_id: "v1|123|0".to_string(),
            title: "2020 Select Silver Prizm #66 Patrick Mahomes II".to_string(),
            price: Money::parse("285.50"),
            currency: "USD".to_string(),
            image_url: "https://img.example.com/card.jpg".to_string(),
            url: "https://marketplace.example.com/itm/123".to_string(),
        }
    }

    #[test]
    fn ensure_local_profile_creates_one_guest_and_reuses_it() {
        let service = service();
        let first = service.ensure_local_profile().unwrap();
        assert!(first.guest_id.is_some());

        let second = service.ensure_local_profile().unwrap();
        assert_eq!(first.meta.id, second.meta.id);
    }

    #[test]
    fn promote_creates_card_with_marketplace_image() {
        let service = service();
        let collection = service.create_collection("user-1", "Football PC", None).unwrap();

        let card = service
            .promote_listing_to_card(&listing_with_image(), &collection.meta.id)
            .unwrap();

        assert_eq!(card.name, "2020 Select Silver Prizm #66 Patrick Mahomes II");
        assert_eq!(card.estimated_value, Some(Money::from_cents(28550)));
        assert!(card.purchase_price.is_none());

        let images = service.card_images(&card.meta.id).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].kind, ImageKind::Marketplace);
        assert_eq!(images[0].path, "https://img.example.com/card.jpg");
    }

    #[test]
    fn promote_without_image_url_skips_the_image() {
        let service = service();
        let collection = service.create_collection("user-1", "PC", None).unwrap();

        let mut listing = listing_with_image();
        listing.image_url = String::new();
        let card = service
            .promote_listing_to_card(&listing, &collection.meta.id)
            .unwrap();

        assert!(service.card_images(&card.meta.id).unwrap().is_empty());
        // The card itself is still queryable.
        assert_eq!(service.list_cards(&collection.meta.id).unwrap().len(), 1);
    }

    #[test]
    fn list_cards_is_newest_first_and_scoped_to_the_collection() {
        let service = service();
        let a = service.create_collection("user-1", "A", None).unwrap();
        let b = service.create_collection("user-1", "B", None).unwrap();

        let older = service
            .promote_listing_to_card(&listing_with_image(), &a.meta.id)
            .unwrap();
        let newer = service
            .promote_listing_to_card(&listing_with_image(), &a.meta.id)
            .unwrap();
        service
            .promote_listing_to_card(&listing_with_image(), &b.meta.id)
            .unwrap();

        let cards = service.list_cards(&a.meta.id).unwrap();
        assert_eq!(cards.len(), 2);
        // Same-instant timestamps fall back to id order; otherwise newest first.
        if cards[0].meta.created_at != cards[1].meta.created_at {
            assert_eq!(cards[0].meta.id, newer.meta.id);
            assert_eq!(cards[1].meta.id, older.meta.id);
        }
    }

    #[test]
    fn record_price_appends_and_never_overwrites() {
        let service = service();
        let collection = service.create_collection("user-1", "PC", None).unwrap();
        let card = service
            .promote_listing_to_card(&listing_with_image(), &collection.meta.id)
            .unwrap();

        service
            .record_price(&card.meta.id, Money::from_cents(20000), PriceSource::User)
            .unwrap();
        service
            .record_price(&card.meta.id, Money::from_cents(28550), PriceSource::Marketplace)
            .unwrap();

        let history = service.price_history(&card.meta.id).unwrap();
        assert_eq!(history.len(), 2);
        let prices: Vec<i64> = history.iter().map(|s| s.price.cents()).collect();
        assert!(prices.contains(&20000));
        assert!(prices.contains(&28550));
    }

    #[test]
    fn collection_delete_leaves_cards_unless_cascade_enabled() {
        let store = Store::open_in_memory().unwrap();
        let plain = CollectionService::new(store.clone());
        let collection = plain.create_collection("user-1", "PC", None).unwrap();
        let card = plain
            .promote_listing_to_card(&listing_with_image(), &collection.meta.id)
            .unwrap();

        plain.delete_collection(&collection.meta.id).unwrap();
        // No cascade: the card is still visible in collection queries.
        assert_eq!(plain.list_cards(&collection.meta.id).unwrap().len(), 1);

        let cascading = CollectionService::with_cascade(
            store,
            CascadePolicy {
                collection_to_cards: true,
                card_to_children: true,
            },
        );
        cascading.delete_collection(&collection.meta.id).unwrap();
        assert!(cascading.list_cards(&collection.meta.id).unwrap().is_empty());
        assert!(cascading.card_images(&card.meta.id).unwrap().is_empty());
    }

    #[test]
    fn card_delete_cascades_to_children_only_when_enabled() {
        let store = Store::open_in_memory().unwrap();
        let service = CollectionService::with_cascade(
            store,
            CascadePolicy {
                collection_to_cards: false,
                card_to_children: true,
            },
        );
        let collection = service.create_collection("user-1", "PC", None).unwrap();
        let card = service
            .promote_listing_to_card(&listing_with_image(), &collection.meta.id)
            .unwrap();
        service
            .record_price(&card.meta.id, Money::from_cents(100), PriceSource::User)
            .unwrap();

        service.delete_card(&card.meta.id).unwrap();

        assert!(service.list_cards(&collection.meta.id).unwrap().is_empty());
        assert!(service.card_images(&card.meta.id).unwrap().is_empty());
        assert!(service.price_history(&card.meta.id).unwrap().is_empty());
        // Soft delete only: the card is still reachable by id.
        let fetched = service.get_card(&card.meta.id).unwrap().unwrap();
        assert!(fetched.meta.is_deleted);
    }

    #[test]
    fn shares_are_recorded_per_collection() {
        let service = service();
        let collection = service.create_collection("user-1", "PC", None).unwrap();

        service
            .share_collection(&collection.meta.id, "friend@example.com", SharePermission::Editor)
            .unwrap();

        let shares = service.shares_for_collection(&collection.meta.id).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].permission, SharePermission::Editor);
        assert_eq!(shares[0].invitee_email, "friend@example.com");
    }
}
