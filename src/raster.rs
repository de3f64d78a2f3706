//! In-memory pixel buffer shared by every pipeline step.
//!
//! A [`Raster`] owns a tightly packed, row-major buffer of 8-bit samples. The
//! buffer length is checked on construction and never changes afterwards:
//! handlers that alter content build a new `Raster` instead of mutating the
//! one they were given.
//!
//! | Format | Channels | Alpha | `mode` |
//! |---|---|---|---|
//! | [`PixelFormat::Rgb`] | 3 | no | `RGB` |
//! | [`PixelFormat::Rgba`] | 4 | yes | `RGBA` |
//! | [`PixelFormat::Gray8`] | 1 | no | `L` |
//!
//! Conversion to and from [`image::DynamicImage`] happens only at the codec
//! boundary and inside handlers that lean on `image::imageops`.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("Raster dimensions must be positive, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Raster of {width}x{height} is too large to address")]
    TooLarge { width: u32, height: u32 },
}

/// Pixel layout of a [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    Gray8,
}

impl PixelFormat {
    /// Samples per pixel.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }

    /// Number of leading colour samples (everything except alpha).
    pub const fn color_channels(self) -> usize {
        match self {
            PixelFormat::Rgb | PixelFormat::Rgba => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Short mode label, in the vocabulary most imaging tools report.
    pub const fn mode(self) -> &'static str {
        match self {
            PixelFormat::Rgb => "RGB",
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Gray8 => "L",
        }
    }

    /// Colour-space classification, independent of alpha.
    pub const fn color_space(self) -> &'static str {
        match self {
            PixelFormat::Rgb | PixelFormat::Rgba => "RGB",
            PixelFormat::Gray8 => "GRAY",
        }
    }
}

/// Owned pixel buffer with its dimensions and layout.
///
/// Invariant: `data.len() == width * height * format.channels()`, with both
/// dimensions strictly positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::EmptyDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(format.channels()))
        .ok_or(RasterError::TooLarge { width, height })
}

impl Raster {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        let expected = expected_len(width, height, format)?;
        if data.len() != expected {
            return Err(RasterError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Build a raster where every pixel equals `pixel`.
    ///
    /// `pixel` must hold exactly `format.channels()` samples.
    pub fn filled(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel: &[u8],
    ) -> Result<Self, RasterError> {
        if pixel.len() != format.channels() {
            return Err(RasterError::LengthMismatch {
                expected: format.channels(),
                actual: pixel.len(),
            });
        }
        let len = expected_len(width, height, format)?;
        let data = pixel.iter().copied().cycle().take(len).collect();
        Self::new(width, height, format, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Samples of the pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.format.channels();
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[offset..offset + channels]
    }

    /// Adopt a decoded image, narrowing it to one of the three supported layouts.
    ///
    /// 16-bit and float images are reduced to 8 bits; luma+alpha widens to RGBA
    /// so that transparency survives.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, RasterError> {
        let (width, height) = (image.width(), image.height());
        let (format, data) = match image {
            DynamicImage::ImageLuma8(buf) => (PixelFormat::Gray8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (PixelFormat::Rgb, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (PixelFormat::Rgba, buf.into_raw()),
            other => {
                let color = other.color();
                if color.has_alpha() {
                    (PixelFormat::Rgba, other.to_rgba8().into_raw())
                } else if color.has_color() {
                    (PixelFormat::Rgb, other.to_rgb8().into_raw())
                } else {
                    (PixelFormat::Gray8, other.to_luma8().into_raw())
                }
            }
        };
        Self::new(width, height, format, data)
    }

    /// Copy the buffer into an [`image::DynamicImage`] of the matching layout.
    pub fn to_dynamic(&self) -> Result<DynamicImage, RasterError> {
        let (w, h) = self.dimensions();
        let data = self.data.clone();
        let image = match self.format {
            PixelFormat::Rgb => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            PixelFormat::Gray8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        };
        image.ok_or(RasterError::LengthMismatch {
            expected: expected_len(w, h, self.format)?,
            actual: self.data.len(),
        })
    }
}
