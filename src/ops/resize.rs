//! Exact-size resampling.
//!
//! The target box is honoured exactly: aspect ratio is not preserved. The
//! output is always RGBA so callers can treat a resized raster uniformly
//! regardless of what was decoded.

use super::params::{Attributes, ParamError, Params};
use super::{Applied, StepError};
use crate::raster::Raster;
use image::imageops::FilterType;

const WIDTH_KEYS: &[&str] = &["target_width", "targetWidth", "width"];
const HEIGHT_KEYS: &[&str] = &["target_height", "targetHeight", "height"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
}

fn positive_dimension(params: &Params, keys: &[&'static str]) -> Result<u32, ParamError> {
    let value = params.int(keys)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ParamError::OutOfRange {
            key: keys[0],
            value: value.to_string(),
            expected: "must be a positive integer".into(),
        })
}

pub fn validate(params: &Params) -> Result<ResizeParams, ParamError> {
    Ok(ResizeParams {
        width: positive_dimension(params, WIDTH_KEYS)?,
        height: positive_dimension(params, HEIGHT_KEYS)?,
    })
}

/// Resolve a resampling filter by name.
///
/// Nearest-neighbour is not accepted.
pub fn parse_filter(name: &str) -> Option<FilterType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "triangle" | "bilinear" => Some(FilterType::Triangle),
        "catmullrom" | "catmull-rom" | "bicubic" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" | "lanczos" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

pub fn apply(
    raster: &Raster,
    params: &ResizeParams,
    filter: FilterType,
) -> Result<Applied, StepError> {
    let resized = raster
        .to_dynamic()?
        .resize_exact(params.width, params.height, filter);
    let resized = Raster::from_dynamic(resized.to_rgba8().into())?;
    let attributes = Attributes::new()
        .with("message", "Image resized successfully.")
        .with("original_width", raster.width())
        .with("original_height", raster.height())
        .with("target_width", params.width)
        .with("target_height", params.height);
    Ok(Applied::replaced(resized, attributes))
}
