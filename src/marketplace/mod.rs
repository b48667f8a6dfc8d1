//! Marketplace listings-search client.
//!
//! Talks to the external listings endpoint with async reqwest. Marketplace
//! unavailability must never crash the matching flow, so every failure mode
//! (transport error, timeout, non-2xx status, malformed body) degrades to an
//! empty result list and a logged warning.

use crate::money::Money;
use crate::normalize::normalize;
use serde::Deserialize;
use std::time::Duration;

/// Fixed listings-search endpoint (Browse API item summary search).
const SEARCH_ENDPOINT: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";

/// A slow marketplace must not block matching; behave like any other
/// transport failure past this bound.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = "card_vault/1.0";

/// A single marketplace listing. Transient: produced fresh per search and
/// never cached; only promotion into a card persists any of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Marketplace item id.
    pub listing_id: String,
    pub title: String,
    /// Parsed price; `None` when the feed omitted it or it failed to parse.
    pub price: Option<Money>,
    /// Currency code (e.g. USD, CAD).
    pub currency: String,
    /// URL of the listing's main image.
    pub image_url: String,
    /// Direct browser link to the listing.
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummary {
    title: Option<String>,
    image: Option<ItemImage>,
    price: Option<ItemPrice>,
    item_id: Option<String>,
    item_web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemImage {
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemPrice {
    value: Option<String>,
    currency: Option<String>,
}

impl ItemSummary {
    fn into_listing(self) -> Listing {
        // An unparseable price stays None; zero would read as a real price.
        let price = self
            .price
            .as_ref()
            .and_then(|p| p.value.as_deref())
            .and_then(Money::parse);
        let currency = self
            .price
            .and_then(|p| p.currency)
            .unwrap_or_else(|| "USD".to_string());
        Listing {
            listing_id: self.item_id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            price,
            currency,
            image_url: self.image.and_then(|i| i.image_url).unwrap_or_default(),
            url: self.item_web_url.unwrap_or_default(),
        }
    }
}

/// Async client for the listings-search endpoint.
pub struct MarketplaceClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl MarketplaceClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoint(SEARCH_ENDPOINT, token)
    }

    /// Client against an explicit endpoint (for testing with mock servers).
    pub fn with_endpoint(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });
        Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// Searches live listings for a free-text card description.
    ///
    /// The query is normalized before it goes on the wire. Returns up to
    /// `limit` listings; empty on blank queries and on any marketplace
    /// failure - never an error.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Listing> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return Vec::new();
        }

        let url = format!(
            "{}?q={}&limit={}",
            self.endpoint,
            urlencoding::encode(&normalized),
            limit
        );
        log::debug!("Marketplace search: {}", url);

        let response = match self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Marketplace request failed: {}", e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            log::warn!("Marketplace returned HTTP {}", response.status());
            return Vec::new();
        }

        let body: SearchResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Malformed marketplace response: {}", e);
                return Vec::new();
            }
        };

        body.item_summaries
            .into_iter()
            .map(ItemSummary::into_listing)
            .collect()
    }

    /// The single best-matching listing: the provider's first result.
    pub async fn best_match(&self, query: &str) -> Option<Listing> {
        self.search(query, 1).await.into_iter().next()
    }
}

#[cfg(test)]
#[path = "marketplace_tests.rs"]
mod tests;
