//! Luminance conversion to a single 8-bit channel.

use super::params::Attributes;
use super::{Applied, StepError};
use crate::raster::Raster;

/// Convert to one-channel luminance. Any alpha channel is discarded.
pub fn apply(raster: &Raster) -> Result<Applied, StepError> {
    let gray = raster.to_dynamic()?.to_luma8();
    let converted = Raster::from_dynamic(gray.into())?;
    let attributes = Attributes::new()
        .with("original_width", raster.width())
        .with("original_height", raster.height())
        .with("original_mode", raster.format().mode());
    Ok(Applied::replaced(converted, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Value;
    use crate::raster::PixelFormat;

    #[test]
    fn produces_single_channel() {
        for src in [
            Raster::filled(6, 4, PixelFormat::Rgb, &[255, 0, 0]).unwrap(),
            Raster::filled(6, 4, PixelFormat::Rgba, &[0, 255, 0, 10]).unwrap(),
            Raster::filled(6, 4, PixelFormat::Gray8, &[33]).unwrap(),
        ] {
            let out = apply(&src).unwrap().raster.unwrap();
            assert_eq!(out.format(), PixelFormat::Gray8);
            assert_eq!(out.format().channels(), 1);
            assert_eq!(out.dimensions(), (6, 4));
        }
    }

    #[test]
    fn white_and_black_are_preserved() {
        let white = Raster::filled(2, 2, PixelFormat::Rgb, &[255, 255, 255]).unwrap();
        let black = Raster::filled(2, 2, PixelFormat::Rgb, &[0, 0, 0]).unwrap();
        assert!(apply(&white).unwrap().raster.unwrap().data().iter().all(|v| *v == 255));
        assert!(apply(&black).unwrap().raster.unwrap().data().iter().all(|v| *v == 0));
    }

    #[test]
    fn gray_input_is_unchanged() {
        let src = Raster::filled(3, 3, PixelFormat::Gray8, &[77]).unwrap();
        assert_eq!(apply(&src).unwrap().raster.unwrap(), src);
    }

    #[test]
    fn green_is_brighter_than_blue() {
        let green = Raster::filled(1, 1, PixelFormat::Rgb, &[0, 255, 0]).unwrap();
        let blue = Raster::filled(1, 1, PixelFormat::Rgb, &[0, 0, 255]).unwrap();
        let g = apply(&green).unwrap().raster.unwrap().data()[0];
        let b = apply(&blue).unwrap().raster.unwrap().data()[0];
        assert!(g > b);
    }

    #[test]
    fn attributes_report_original() {
        let src = Raster::filled(9, 5, PixelFormat::Rgba, &[1, 2, 3, 4]).unwrap();
        let attrs = apply(&src).unwrap().attributes;
        assert_eq!(attrs.get("original_width"), Some(&Value::Int(9)));
        assert_eq!(attrs.get("original_height"), Some(&Value::Int(5)));
        assert_eq!(attrs.get("original_mode"), Some(&Value::Str("RGBA".into())));
    }
}
