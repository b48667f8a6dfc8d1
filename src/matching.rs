//! Best-match selection over marketplace candidates.
//!
//! The provider pre-ranks results by relevance, so the best match is simply
//! the first candidate; an empty candidate list is a normal "no result found"
//! outcome for callers, not an error. Local re-ranking by title overlap is an
//! additive layer for display and never changes the best-match contract.

use crate::marketplace::Listing;
use std::collections::HashSet;

/// Picks the single best match: position 0 of the provider-ranked list.
pub fn select_best(candidates: &[Listing]) -> Option<&Listing> {
    candidates.first()
}

/// Stable-sorts candidates by descending overlap between query tokens and
/// title tokens. Ties keep the provider's order, so with no token information
/// the ranking degrades to the provider ranking.
pub fn rank_by_title_overlap(query: &str, candidates: &mut [Listing]) {
    let query_tokens: HashSet<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    candidates.sort_by_key(|listing| std::cmp::Reverse(title_overlap(&query_tokens, &listing.title)));
}

fn title_overlap(query_tokens: &HashSet<String>, title: &str) -> usize {
    let title_tokens: HashSet<String> = title
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    query_tokens.intersection(&title_tokens).count()
}
