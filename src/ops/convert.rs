//! Format conversion by encode/decode round trip.
//!
//! The raster is encoded into the target format and immediately decoded
//! again, so the pipeline continues with whatever the format preserved: a
//! JPEG round trip drops alpha and introduces compression artefacts, a PNG
//! round trip is lossless.

use super::params::{Attributes, ParamError, Params};
use super::{Applied, StepError};
use crate::codec::{Codec, format_name, parse_format};
use crate::raster::Raster;
use image::ImageFormat;

const FORMAT_KEYS: &[&str] = &["target_format", "targetFormat", "output_format", "format"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertParams {
    pub format: ImageFormat,
}

pub fn validate(params: &Params, codec: &dyn Codec) -> Result<ConvertParams, ParamError> {
    let name = params.string(FORMAT_KEYS)?;
    let unsupported = || ParamError::OutOfRange {
        key: FORMAT_KEYS[0],
        value: format!("'{name}'"),
        expected: "not an encodable image format".into(),
    };
    let format = parse_format(name).ok_or_else(unsupported)?;
    if !codec.can_encode(format) {
        return Err(unsupported());
    }
    Ok(ConvertParams { format })
}

pub fn apply(
    raster: &Raster,
    params: &ConvertParams,
    codec: &dyn Codec,
) -> Result<Applied, StepError> {
    let encoded = codec.encode(raster, params.format)?;
    let converted = codec.decode(&encoded)?;
    let attributes = Attributes::new()
        .with("original_width", raster.width())
        .with("original_height", raster.height())
        .with("target_format", format_name(params.format))
        .with("encoded_bytes", encoded.len());
    Ok(Applied::replaced(converted, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use crate::codec::tests::FailingCodec;
    use crate::ops::Value;
    use crate::raster::PixelFormat;

    #[test]
    fn validate_accepts_known_formats() {
        let codec = ImageCodec::new();
        let p = Params::new().with("target_format", "JPEG");
        assert_eq!(
            validate(&p, &codec),
            Ok(ConvertParams {
                format: ImageFormat::Jpeg
            })
        );
        let p = Params::new().with("format", "png");
        assert_eq!(validate(&p, &codec).unwrap().format, ImageFormat::Png);
    }

    #[test]
    fn validate_rejects_unknown_format() {
        let codec = ImageCodec::new();
        let p = Params::new().with("target_format", "heic");
        assert!(matches!(
            validate(&p, &codec),
            Err(ParamError::OutOfRange {
                key: "target_format",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_non_string() {
        let codec = ImageCodec::new();
        let p = Params::new().with("target_format", 5);
        assert!(matches!(
            validate(&p, &codec),
            Err(ParamError::WrongType { .. })
        ));
    }

    #[test]
    fn jpeg_round_trip_drops_alpha() {
        let codec = ImageCodec::new();
        let src = Raster::filled(16, 8, PixelFormat::Rgba, &[50, 100, 150, 20]).unwrap();
        let applied = apply(
            &src,
            &ConvertParams {
                format: ImageFormat::Jpeg,
            },
            &codec,
        )
        .unwrap();
        let out = applied.raster.unwrap();
        assert_eq!(out.dimensions(), (16, 8));
        assert_eq!(out.format(), PixelFormat::Rgb);
        assert_eq!(
            applied.attributes.get("target_format"),
            Some(&Value::Str("JPEG".into()))
        );
    }

    #[test]
    fn png_round_trip_is_identity() {
        let codec = ImageCodec::new();
        let src = Raster::filled(5, 5, PixelFormat::Rgba, &[1, 2, 3, 4]).unwrap();
        let params = ConvertParams {
            format: ImageFormat::Png,
        };
        assert_eq!(apply(&src, &params, &codec).unwrap().raster.unwrap(), src);
    }

    #[test]
    fn codec_failure_is_execution_error() {
        let codec = FailingCodec::default();
        let src = Raster::filled(2, 2, PixelFormat::Rgb, &[0, 0, 0]).unwrap();
        let err = apply(
            &src,
            &ConvertParams {
                format: ImageFormat::Bmp,
            },
            &codec,
        )
        .unwrap_err();
        assert!(matches!(err, StepError::Execution(msg) if msg.contains("BMP")));
        assert_eq!(*codec.requested.lock().unwrap(), vec![ImageFormat::Bmp]);
    }
}
