//! OCR boundary and the recognize-then-search flow.
//!
//! The OCR engine itself is an external collaborator consumed behind
//! [`OcrEngine`]. Engine failures are caught here and treated as "no text" -
//! a blurry photo must never take the app down.

use crate::marketplace::{Listing, MarketplaceClient};
use thiserror::Error;

/// Error reported by an OCR engine implementation.
#[derive(Debug, Error)]
#[error("OCR failed: {0}")]
pub struct OcrError(pub String);

/// Maps a raw image byte buffer to recognized text (possibly empty).
pub trait OcrEngine {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Recognized text from one image; empty string on engine failure or empty
/// input.
pub fn extract_text(engine: &dyn OcrEngine, image: &[u8]) -> String {
    if image.is_empty() {
        return String::new();
    }
    match engine.recognize(image) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            log::warn!("OCR failed, treating as no text: {}", e);
            String::new()
        }
    }
}

/// Merged recognition of a card's front and back photos.
pub fn extract_front_and_back(engine: &dyn OcrEngine, front: &[u8], back: &[u8]) -> String {
    let front = extract_text(engine, front);
    let back = extract_text(engine, back);
    format!("{} {}", front, back).trim().to_string()
}

/// Recognizes a card photo and searches the marketplace with the text.
/// No recognized text means no candidates, not an error.
pub async fn identify(
    engine: &dyn OcrEngine,
    client: &MarketplaceClient,
    image: &[u8],
    limit: usize,
) -> Vec<Listing> {
    let text = extract_text(engine, image);
    if text.is_empty() {
        log::info!("No text recognized in image");
        return Vec::new();
    }
    client.search(&text, limit).await
}
