//! Brightness scaling.
//!
//! `delta` is a percentage-like knob in `1..=100` mapped to a multiplicative
//! factor of `delta / 50`: 50 leaves the image untouched, 100 doubles every
//! colour sample, 1 nearly blacks it out. Alpha is never scaled.

use super::params::{Attributes, ParamError, Params};
use super::{Applied, StepError};
use crate::raster::Raster;

const DELTA_KEYS: &[&str] = &["delta", "brightness_delta"];
const NEUTRAL_DELTA: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessParams {
    pub delta: u8,
}

impl BrightnessParams {
    pub fn factor(self) -> f64 {
        f64::from(self.delta) / NEUTRAL_DELTA
    }
}

pub fn validate(params: &Params) -> Result<BrightnessParams, ParamError> {
    let delta = params.int(DELTA_KEYS)?;
    if !(1..=100).contains(&delta) {
        return Err(ParamError::OutOfRange {
            key: DELTA_KEYS[0],
            value: delta.to_string(),
            expected: "must be between 1 and 100".into(),
        });
    }
    Ok(BrightnessParams { delta: delta as u8 })
}

pub fn apply(raster: &Raster, params: &BrightnessParams) -> Result<Applied, StepError> {
    let factor = params.factor();
    let format = raster.format();
    let (channels, color) = (format.channels(), format.color_channels());

    let mut data = raster.data().to_vec();
    for px in data.chunks_exact_mut(channels) {
        for sample in &mut px[..color] {
            *sample = (f64::from(*sample) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    let adjusted = Raster::new(raster.width(), raster.height(), format, data)?;

    let attributes = Attributes::new()
        .with("original_width", raster.width())
        .with("original_height", raster.height())
        .with("brightness_delta", u32::from(params.delta))
        .with("brightness_factor", factor);
    Ok(Applied::replaced(adjusted, attributes))
}
