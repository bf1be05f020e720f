//! Error types for flipbook2pdf.
//!
//! [`ConvertError`] ends a run: nothing after the failing step executes.
//! [`AssetError`] covers a single image. It is reported as a warning and the
//! image is dropped, while the rest of the run carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single outbound GET.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} for '{url}'")]
    Status { url: String, status: u16 },

    #[error("request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: f64 },

    #[error("request to '{url}' failed: {reason}")]
    Network { url: String, reason: String },
}

/// Fatal errors for a conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Error fetching webpage: {0}")]
    PageFetch(#[source] TransportError),

    #[error("No element with '{class}' class found on the webpage.")]
    ContainerNotFound { class: &'static str },

    #[error("No images found in the '{class}' element.")]
    NoImagesFound { class: &'static str },

    #[error("No images successfully downloaded to create PDF ({attempted} attempted).")]
    NoImagesDownloaded { attempted: usize },

    #[error("Failed to encode PDF: {0}")]
    Encode(String),

    #[error("Failed to write PDF to '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read PDF '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal failure for one image URL.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to download image from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to open image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
}

impl AssetError {
    /// The URL the failure belongs to.
    pub fn url(&self) -> &str {
        match self {
            AssetError::Fetch { url, .. } | AssetError::Decode { url, .. } => url,
        }
    }
}
