use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::DEFAULT_DPI;
use crate::error::ConvertError;

const IMAGE_NAME: &str = "Im0";

/// Lays out decoded images as the pages of one PDF, one image per page.
pub struct PdfAssembler {
    images: Vec<DynamicImage>,
    dpi: f64,
}

impl PdfAssembler {
    pub fn new(dpi: f64) -> Self {
        Self {
            images: Vec::new(),
            dpi,
        }
    }

    pub fn add_image(&mut self, image: DynamicImage) {
        debug!(
            "Queued page {} ({}x{} px)",
            self.images.len() + 1,
            image.width(),
            image.height()
        );
        self.images.push(image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Serializes the queued pages. The first image is page 1.
    pub fn build(&self) -> Result<Vec<u8>, ConvertError> {
        if self.images.is_empty() {
            return Err(ConvertError::NoImagesDownloaded { attempted: 0 });
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(self.images.len());

        for image in &self.images {
            let (width_pt, height_pt) = page_size_points(image.width(), image.height(), self.dpi);
            let (pixels, color_space) = raw_pixels(image);

            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width() as i64,
                    "Height" => image.height() as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8_i64,
                },
                pixels,
            ));

            // Scale the unit image square up to the full page.
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            Object::Real(width_pt as _),
                            0_i64.into(),
                            0_i64.into(),
                            Object::Real(height_pt as _),
                            0_i64.into(),
                            0_i64.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_bytes = content
                .encode()
                .map_err(|e| ConvertError::Encode(format!("page content: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![
                    0_i64.into(),
                    0_i64.into(),
                    Object::Real(width_pt as _),
                    Object::Real(height_pt as _),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        IMAGE_NAME => image_id,
                    },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut data = Vec::new();
        doc.save_to(&mut data)
            .map_err(|e| ConvertError::Encode(format!("failed to serialize PDF: {}", e)))?;

        Ok(data)
    }

    /// Writes the document to `output_path`, replacing any previous file.
    pub async fn save(&self, output_path: &Path) -> Result<PathBuf, ConvertError> {
        info!("Assembling {} pages into a single PDF", self.images.len());
        let data = self.build()?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ConvertError::OutputWriteFailed {
                    path: output_path.to_path_buf(),
                    source,
                })?;
        }

        fs::write(output_path, data)
            .await
            .map_err(|source| ConvertError::OutputWriteFailed {
                path: output_path.to_path_buf(),
                source,
            })?;

        info!("Wrote {} pages to {}", self.images.len(), output_path.display());
        Ok(output_path.to_path_buf())
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

/// Page size in PDF points (1/72 inch) for an image shown at `dpi`.
pub fn page_size_points(width_px: u32, height_px: u32, dpi: f64) -> (f64, f64) {
    let scale = 72.0 / dpi;
    (width_px as f64 * scale, height_px as f64 * scale)
}

fn raw_pixels(image: &DynamicImage) -> (Vec<u8>, &'static str) {
    if image.color().has_color() {
        (image.to_rgb8().into_raw(), "DeviceRGB")
    } else {
        (image.to_luma8().into_raw(), "DeviceGray")
    }
}
