//! # flipbook2pdf
//!
//! Turns an IPGS flipbook webpage into a single PDF: one GET for the page,
//! the `data-ipgs-image` URLs from the first `ipgs-flipbook` container, one GET
//! per image, and one PDF page per decoded image at 100 DPI.
//!
//! ## Usage
//!
//! ```bash
//! flipbook2pdf convert https://example.com/catalog/ -o output.pdf
//! flipbook2pdf serve --bind 127.0.0.1:8501
//! ```

pub mod config;
mod converter;
mod downloader;
pub mod error;
pub mod extractor;
mod pdf_assembler;
mod transport;
pub mod web;

pub use config::{ConvertOptions, RequestHeaders};
pub use converter::{Conversion, Converter, Stage};
pub use downloader::{DownloadReport, Downloader};
pub use error::{AssetError, ConvertError, TransportError};
pub use extractor::extract_image_urls;
pub use pdf_assembler::{page_size_points, PdfAssembler};
pub use transport::{HttpTransport, Transport};
