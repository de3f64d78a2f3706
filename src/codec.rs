//! Byte-level encode/decode behind the [`Codec`] trait.
//!
//! The pipeline core never touches encoded bytes except through a `Codec`:
//! the job runner decodes the fetched source and encodes the final raster,
//! and the format-convert handler round-trips through it. The production
//! implementation is [`ImageCodec`], backed by the `image` crate's pure-Rust
//! codecs.
//!
//! | Format | Names accepted |
//! |---|---|
//! | PNG | `png` |
//! | JPEG | `jpeg`, `jpg` |
//! | BMP | `bmp` |
//! | TIFF | `tiff`, `tif` |
//! | WebP (lossless) | `webp` |
//! | GIF | `gif` |

use crate::raster::{Raster, RasterError};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Input is empty")]
    Empty,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to encode {format}: {reason}")]
    Encode { format: String, reason: String },
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Format names whose encoders are compiled in, with their `image` format.
///
/// The first name listed for a format is its canonical (reported) name.
const ENCODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpeg", ImageFormat::Jpeg),
    ("jpg", ImageFormat::Jpeg),
    ("bmp", ImageFormat::Bmp),
    ("tiff", ImageFormat::Tiff),
    ("tif", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
];

/// Resolve a user-supplied format name, ignoring case and surrounding space.
pub fn parse_format(name: &str) -> Option<ImageFormat> {
    let needle = name.trim().to_ascii_lowercase();
    ENCODE_CANDIDATES
        .iter()
        .find(|(candidate, _)| *candidate == needle)
        .map(|(_, format)| *format)
}

/// Upper-case canonical name for a format, e.g. `"JPEG"`.
pub fn format_name(format: ImageFormat) -> String {
    ENCODE_CANDIDATES
        .iter()
        .find(|(_, candidate)| *candidate == format)
        .map(|(name, _)| name.to_ascii_uppercase())
        .unwrap_or_else(|| format!("{format:?}").to_ascii_uppercase())
}

/// Encode/decode capability used at the pipeline boundary and by format conversion.
pub trait Codec: Sync {
    /// Decode encoded bytes into a raster.
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError>;

    /// Encode a raster into `format`'s byte representation.
    fn encode(&self, raster: &Raster, format: ImageFormat) -> Result<Vec<u8>, CodecError>;

    /// Whether an encoder for `format` is available.
    fn can_encode(&self, format: ImageFormat) -> bool;
}

/// [`Codec`] backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        let image =
            image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Raster::from_dynamic(image)?)
    }

    fn encode(&self, raster: &Raster, format: ImageFormat) -> Result<Vec<u8>, CodecError> {
        if !self.can_encode(format) {
            return Err(CodecError::UnsupportedFormat(format_name(format)));
        }
        let mut image = raster.to_dynamic()?;
        if format == ImageFormat::Jpeg && raster.format().has_alpha() {
            // JPEG has no alpha channel; the encoder rejects RGBA input.
            image = DynamicImage::ImageRgb8(image.to_rgb8());
        }
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, format)
            .map_err(|e| CodecError::Encode {
                format: format_name(format),
                reason: e.to_string(),
            })?;
        Ok(buf.into_inner())
    }

    fn can_encode(&self, format: ImageFormat) -> bool {
        format.writing_enabled() && ENCODE_CANDIDATES.iter().any(|(_, f)| *f == format)
    }
}
