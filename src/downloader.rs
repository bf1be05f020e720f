use colored::*;
use image::DynamicImage;
use tracing::{info, warn};
use url::Url;

use crate::config::RequestHeaders;
use crate::error::{AssetError, ConvertError};
use crate::transport::Transport;

/// Outcome of downloading every extracted image URL.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Decoded images in the order of their source URLs.
    pub images: Vec<DynamicImage>,
    pub warnings: Vec<AssetError>,
    pub attempted: usize,
}

/// Issues the page fetch and the per-image fetches of one run, all with the
/// same header set.
pub struct Downloader<'a, T: Transport + ?Sized> {
    transport: &'a T,
    headers: &'a RequestHeaders,
}

impl<'a, T: Transport + ?Sized> Downloader<'a, T> {
    pub fn new(transport: &'a T, headers: &'a RequestHeaders) -> Self {
        Self { transport, headers }
    }

    pub async fn fetch_page(&self, url: &str) -> Result<Vec<u8>, ConvertError> {
        info!("Visiting \"{}\"", url.green());

        self.transport
            .get(url, self.headers)
            .await
            .map_err(ConvertError::PageFetch)
    }

    /// Downloads images one at a time. A failed image is logged, recorded and
    /// skipped; it never aborts the batch.
    pub async fn download_images(&self, page_url: &str, image_urls: &[String]) -> DownloadReport {
        let base = Url::parse(page_url).ok();
        let mut report = DownloadReport {
            attempted: image_urls.len(),
            ..Default::default()
        };

        for (index, raw) in image_urls.iter().enumerate() {
            let url = resolve(base.as_ref(), raw);
            info!(
                "Downloading image {}/{} \"{}\"",
                index + 1,
                image_urls.len(),
                url.green()
            );

            match self.download_image(&url).await {
                Ok(image) => report.images.push(image),
                Err(e) => {
                    warn!("{}", e.to_string().yellow());
                    report.warnings.push(e);
                }
            }
        }

        report
    }

    async fn download_image(&self, url: &str) -> Result<DynamicImage, AssetError> {
        let bytes = self
            .transport
            .get(url, self.headers)
            .await
            .map_err(|source| AssetError::Fetch {
                url: url.to_string(),
                source,
            })?;

        image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Joins a possibly relative image URL onto the page URL. Falls back to the
/// raw value when there is no usable base.
fn resolve(base: Option<&Url>, raw: &str) -> String {
    match base.map(|b| b.join(raw)) {
        Some(Ok(url)) => url.to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_are_joined_onto_page() {
        let base = Url::parse("https://example.com/books/42/").unwrap();
        assert_eq!(
            resolve(Some(&base), "pages/1.jpg"),
            "https://example.com/books/42/pages/1.jpg"
        );
        assert_eq!(
            resolve(Some(&base), "/static/2.jpg"),
            "https://example.com/static/2.jpg"
        );
    }

    #[test]
    fn absolute_urls_are_unchanged() {
        let base = Url::parse("https://example.com/books/42/").unwrap();
        assert_eq!(
            resolve(Some(&base), "https://cdn.example.com/p/3.png"),
            "https://cdn.example.com/p/3.png"
        );
    }

    #[test]
    fn raw_value_is_kept_without_base() {
        assert_eq!(resolve(None, "pages/1.jpg"), "pages/1.jpg");
    }
}
