use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ConvertError;

/// Class name that marks the flipbook container.
pub const FLIPBOOK_CLASS: &str = "ipgs-flipbook";
/// Attribute on each page `<img>` holding the full-size image URL.
pub const IMAGE_ATTR: &str = "data-ipgs-image";

/// Collects the page image URLs from the first flipbook container.
///
/// Values are returned verbatim and in document order. Resolution against
/// the page URL happens at download time.
pub fn extract_image_urls(html: &str) -> Result<Vec<String>, ConvertError> {
    let document = Html::parse_document(html);

    let container_selector = Selector::parse(&format!(".{}", FLIPBOOK_CLASS))
        .map_err(|e| ConvertError::InvalidConfig(format!("bad container selector: {}", e)))?;
    let image_selector = Selector::parse(&format!("img[{}]", IMAGE_ATTR))
        .map_err(|e| ConvertError::InvalidConfig(format!("bad image selector: {}", e)))?;

    // Only the first container counts, even when several share the class.
    let container = document
        .select(&container_selector)
        .next()
        .ok_or(ConvertError::ContainerNotFound { class: FLIPBOOK_CLASS })?;

    let urls: Vec<String> = container
        .select(&image_selector)
        .filter_map(|img| img.value().attr(IMAGE_ATTR))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(ConvertError::NoImagesFound { class: FLIPBOOK_CLASS });
    }

    debug!("Extracted {} image URLs from '{}'", urls.len(), FLIPBOOK_CLASS);
    Ok(urls)
}
