use colored::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::ConvertOptions;
use crate::downloader::Downloader;
use crate::error::{AssetError, ConvertError};
use crate::extractor::extract_image_urls;
use crate::pdf_assembler::PdfAssembler;
use crate::transport::{HttpTransport, Transport};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Extracting,
    Downloading,
    Assembling,
    Ready,
}

impl Stage {
    /// Whether a run may move from `self` to `next`.
    ///
    /// `Downloading` has no error exit: per-image failures never stop it.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Extracting)
                | (Extracting, Downloading)
                | (Downloading, Assembling)
                | (Assembling, Ready)
                | (Fetching, Idle)
                | (Extracting, Idle)
                | (Assembling, Idle)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Downloading => "downloading",
            Stage::Assembling => "assembling",
            Stage::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Proof that a document was written. Only [`Converter::run`] creates one,
/// so delivery can never open a file that a failed run left missing.
#[derive(Debug)]
pub struct Conversion {
    output_path: PathBuf,
    pages: usize,
    attempted: usize,
    warnings: Vec<AssetError>,
}

impl Conversion {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Number of image URLs that were tried.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Per-image failures that were skipped.
    pub fn warnings(&self) -> &[AssetError] {
        &self.warnings
    }

    /// Reads the written document back, byte for byte.
    pub async fn read_document(&self) -> Result<Vec<u8>, ConvertError> {
        fs::read(&self.output_path)
            .await
            .map_err(|source| ConvertError::OutputReadFailed {
                path: self.output_path.clone(),
                source,
            })
    }
}

/// Runs fetch, extract, download and assemble strictly one after another.
pub struct Converter<T: Transport> {
    transport: T,
    options: ConvertOptions,
}

impl Converter<HttpTransport> {
    pub fn new(options: ConvertOptions) -> Result<Self, ConvertError> {
        let transport = HttpTransport::new(options.timeout)?;
        Ok(Self::with_transport(transport, options))
    }
}

impl<T: Transport> Converter<T> {
    pub fn with_transport(transport: T, options: ConvertOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub async fn run(&self, url: &str) -> Result<Conversion, ConvertError> {
        let mut stage = Stage::Idle;
        let result = self.run_internal(url, &mut stage).await;

        if let Err(e) = &result {
            debug!("Run stopped while {}: {}", stage, e);
            advance(&mut stage, Stage::Idle);
        }

        result
    }

    async fn run_internal(&self, url: &str, stage: &mut Stage) -> Result<Conversion, ConvertError> {
        let downloader = Downloader::new(&self.transport, &self.options.headers);

        advance(stage, Stage::Fetching);
        let body = downloader.fetch_page(url).await?;

        advance(stage, Stage::Extracting);
        let html = String::from_utf8_lossy(&body);
        let image_urls = extract_image_urls(&html)?;
        info!("Found {} images in the flipbook", image_urls.len());

        advance(stage, Stage::Downloading);
        let report = downloader.download_images(url, &image_urls).await;

        advance(stage, Stage::Assembling);
        if report.images.is_empty() {
            return Err(ConvertError::NoImagesDownloaded {
                attempted: report.attempted,
            });
        }

        let mut assembler = PdfAssembler::new(self.options.dpi);
        for image in report.images {
            assembler.add_image(image);
        }
        let output_path = assembler.save(&self.options.output_path).await?;

        advance(stage, Stage::Ready);
        info!(
            "PDF created successfully: {} ({} of {} images)",
            output_path.display().to_string().blue(),
            assembler.len(),
            report.attempted
        );

        Ok(Conversion {
            output_path,
            pages: assembler.len(),
            attempted: report.attempted,
            warnings: report.warnings,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(stage.can_advance_to(next), "illegal transition {} -> {}", stage, next);
    debug!("Stage {} -> {}", stage, next);
    *stage = next;
}
