//! Quarter-turn rotation through a general affine resampler.
//!
//! Rotation is expressed as a coordinate transform, the way a 2D graphics
//! context composes `translate` with `rotate`: source pixel coordinates are
//! rotated about the origin, then shifted so the result lands on a canvas
//! starting at `(0, 0)`. Every output pixel is then pulled back through the
//! inverse transform and sampled bilinearly from the source.
//!
//! ## Convention
//!
//! Image coordinates have `y` pointing down, so a positive angle turns the
//! picture **clockwise** on screen. Rotating by 90° moves the top-left pixel
//! to the top-right corner.
//!
//! For exact quarter turns every pulled-back coordinate lands on a source
//! pixel (up to floating-point noise), so the output is a lossless permutation
//! of the input. The sampler still interpolates so that it stays correct for
//! arbitrary transforms.

use super::params::{Attributes, ParamError, Params};
use super::{Applied, StepError};
use crate::raster::Raster;

const ANGLE_KEYS: &[&str] = &["angle", "rotation_angle"];

/// The three accepted rotation angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAngle {
    Deg90,
    Deg180,
    Deg270,
}

impl RotationAngle {
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            90 => Some(RotationAngle::Deg90),
            180 => Some(RotationAngle::Deg180),
            270 => Some(RotationAngle::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            RotationAngle::Deg90 => 90,
            RotationAngle::Deg180 => 180,
            RotationAngle::Deg270 => 270,
        }
    }

    /// Whether the output canvas swaps width and height.
    pub fn swaps_axes(self) -> bool {
        !matches!(self, RotationAngle::Deg180)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateParams {
    pub angle: RotationAngle,
}

pub fn validate(params: &Params) -> Result<RotateParams, ParamError> {
    let degrees = params.int(ANGLE_KEYS)?;
    let angle = RotationAngle::from_degrees(degrees).ok_or_else(|| ParamError::OutOfRange {
        key: ANGLE_KEYS[0],
        value: degrees.to_string(),
        expected: "only 90, 180, or 270 degrees are supported".into(),
    })?;
    Ok(RotateParams { angle })
}

/// Row-vector affine map: `(x, y) -> (a·x + b·y + c, d·x + e·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Affine {
    fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: tx,
            d: 0.0,
            e: 1.0,
            f: ty,
        }
    }

    fn rotate(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: -sin,
            c: 0.0,
            d: sin,
            e: cos,
            f: 0.0,
        }
    }

    /// `self` followed by `next`.
    fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.b * self.d,
            b: next.a * self.b + next.b * self.e,
            c: next.a * self.c + next.b * self.f + next.c,
            d: next.d * self.a + next.e * self.d,
            e: next.d * self.b + next.e * self.e,
            f: next.d * self.c + next.e * self.f + next.f,
        }
    }

    fn invert(self) -> Option<Affine> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let (a, b, d, e) = (self.e / det, -self.b / det, -self.d / det, self.a / det);
        Some(Affine {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    fn map(self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

/// Forward transform for rotating a `width`×`height` pixel grid, plus the
/// canvas it lands on.
fn placement(width: u32, height: u32, degrees: f64) -> (Affine, u32, u32) {
    let rotation = Affine::rotate(degrees.to_radians());
    let (max_x, max_y) = (f64::from(width - 1), f64::from(height - 1));
    let corners = [(0.0, 0.0), (max_x, 0.0), (0.0, max_y), (max_x, max_y)]
        .map(|(x, y)| rotation.map(x, y));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let span_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max) - min_x;
    let span_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) - min_y;

    let forward = rotation.then(Affine::translate(-min_x, -min_y));
    let out_w = (span_x.round() as u32).saturating_add(1);
    let out_h = (span_y.round() as u32).saturating_add(1);
    (forward, out_w, out_h)
}

/// Bilinear sample at `(sx, sy)` into `out`.
///
/// Coordinates more than half a pixel outside the source leave `out`
/// untouched (zero, i.e. transparent or black); coordinates within that margin
/// are clamped to the edge.
fn sample_bilinear(src: &Raster, sx: f64, sy: f64, out: &mut [u8]) {
    let max_x = f64::from(src.width() - 1);
    let max_y = f64::from(src.height() - 1);
    if sx < -0.5 || sy < -0.5 || sx > max_x + 0.5 || sy > max_y + 0.5 {
        return;
    }
    let sx = sx.clamp(0.0, max_x);
    let sy = sy.clamp(0.0, max_y);
    let x0 = sx.floor() as u32;
    let y0 = sy.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = sx - f64::from(x0);
    let fy = sy - f64::from(y0);

    let (p00, p10) = (src.pixel(x0, y0), src.pixel(x1, y0));
    let (p01, p11) = (src.pixel(x0, y1), src.pixel(x1, y1));
    for (c, slot) in out.iter_mut().enumerate() {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bottom = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
}

/// Rotate `raster` clockwise by an arbitrary angle in degrees.
pub fn rotate_degrees(raster: &Raster, degrees: f64) -> Result<Raster, StepError> {
    let (forward, out_w, out_h) = placement(raster.width(), raster.height(), degrees);
    let inverse = forward
        .invert()
        .ok_or_else(|| StepError::Execution("rotation transform is not invertible".into()))?;

    let channels = raster.format().channels();
    let mut data = vec![0u8; out_w as usize * out_h as usize * channels];
    for (i, px) in data.chunks_exact_mut(channels).enumerate() {
        let x = (i % out_w as usize) as f64;
        let y = (i / out_w as usize) as f64;
        let (sx, sy) = inverse.map(x, y);
        sample_bilinear(raster, sx, sy, px);
    }
    Ok(Raster::new(out_w, out_h, raster.format(), data)?)
}

pub fn apply(raster: &Raster, params: &RotateParams) -> Result<Applied, StepError> {
    let rotated = rotate_degrees(raster, f64::from(params.angle.degrees()))?;
    let attributes = Attributes::new()
        .with("original_width", raster.width())
        .with("original_height", raster.height())
        .with("rotated_width", rotated.width())
        .with("rotated_height", rotated.height())
        .with("rotation_angle", params.angle.degrees());
    Ok(Applied::replaced(rotated, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Value;
    use crate::raster::PixelFormat;

    /// RGB raster whose pixels encode their own coordinates.
    fn labelled(width: u32, height: u32) -> Raster {
        let data = (0..height)
            .flat_map(|y| (0..width).flat_map(move |x| [x as u8 * 10, y as u8 * 10, 7]))
            .collect();
        Raster::new(width, height, PixelFormat::Rgb, data).unwrap()
    }

    fn rotate(raster: &Raster, degrees: i64) -> Raster {
        let params = RotateParams {
            angle: RotationAngle::from_degrees(degrees).unwrap(),
        };
        apply(raster, &params).unwrap().raster.unwrap()
    }

    #[test]
    fn validate_accepts_quarter_turns() {
        for deg in [90, 180, 270] {
            let p = validate(&Params::new().with("angle", deg)).unwrap();
            assert_eq!(p.angle.degrees() as i64, deg);
        }
    }

    #[test]
    fn validate_rejects_other_angles() {
        for deg in [0, 45, 360, -90] {
            assert!(
                matches!(
                    validate(&Params::new().with("angle", deg)),
                    Err(ParamError::OutOfRange { key: "angle", .. })
                ),
                "{deg} should be rejected"
            );
        }
    }

    #[test]
    fn validate_requires_angle() {
        assert_eq!(
            validate(&Params::new()),
            Err(ParamError::Missing { key: "angle" })
        );
    }

    #[test]
    fn rotate_90_swaps_dimensions() {
        let out = rotate(&Raster::filled(100, 50, PixelFormat::Rgb, &[1, 2, 3]).unwrap(), 90);
        assert_eq!(out.dimensions(), (50, 100));
    }

    #[test]
    fn rotate_180_keeps_dimensions() {
        let out = rotate(&labelled(7, 3), 180);
        assert_eq!(out.dimensions(), (7, 3));
    }

    #[test]
    fn rotate_90_is_clockwise() {
        let src = labelled(3, 2);
        let out = rotate(&src, 90);
        // Top-left of the source lands top-right; bottom-left lands top-left.
        assert_eq!(out.pixel(1, 0), src.pixel(0, 0));
        assert_eq!(out.pixel(0, 0), src.pixel(0, 1));
        assert_eq!(out.pixel(1, 2), src.pixel(2, 0));
        assert_eq!(out.pixel(0, 2), src.pixel(2, 1));
    }

    #[test]
    fn rotate_270_is_counter_clockwise_quarter() {
        let src = labelled(3, 2);
        let out = rotate(&src, 270);
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.pixel(0, 2), src.pixel(0, 0));
        assert_eq!(out.pixel(0, 0), src.pixel(2, 0));
    }

    #[test]
    fn rotate_180_mirrors_both_axes() {
        let src = labelled(4, 3);
        let out = rotate(&src, 180);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(out.pixel(3 - x, 2 - y), src.pixel(x, y));
            }
        }
    }

    #[test]
    fn four_quarter_turns_restore_original() {
        let src = labelled(5, 3);
        let mut r = src.clone();
        for _ in 0..4 {
            r = rotate(&r, 90);
        }
        assert_eq!(r, src);
    }

    #[test]
    fn two_half_turns_restore_original() {
        let src = labelled(6, 4);
        let out = rotate(&rotate(&src, 180), 180);
        assert_eq!(out, src);
    }

    #[test]
    fn rotate_preserves_pixel_format() {
        let rgba = Raster::filled(4, 2, PixelFormat::Rgba, &[1, 2, 3, 128]).unwrap();
        let out = rotate(&rgba, 90);
        assert_eq!(out.format(), PixelFormat::Rgba);
        assert!(out.data().chunks(4).all(|p| p == [1, 2, 3, 128]));

        let gray = Raster::filled(4, 2, PixelFormat::Gray8, &[77]).unwrap();
        assert_eq!(rotate(&gray, 270).format(), PixelFormat::Gray8);
    }

    #[test]
    fn single_pixel_rotates_to_itself() {
        let src = Raster::filled(1, 1, PixelFormat::Rgb, &[9, 9, 9]).unwrap();
        assert_eq!(rotate(&src, 90), src);
    }

    #[test]
    fn attributes_report_dimensions_and_angle() {
        let src = labelled(8, 2);
        let applied = apply(
            &src,
            &RotateParams {
                angle: RotationAngle::Deg90,
            },
        )
        .unwrap();
        let attrs = applied.attributes;
        assert_eq!(attrs.get("original_width"), Some(&Value::Int(8)));
        assert_eq!(attrs.get("rotated_width"), Some(&Value::Int(2)));
        assert_eq!(attrs.get("rotated_height"), Some(&Value::Int(8)));
        assert_eq!(attrs.get("rotation_angle"), Some(&Value::Int(90)));
    }

    #[test]
    fn general_angle_grows_canvas() {
        let src = Raster::filled(10, 10, PixelFormat::Gray8, &[200]).unwrap();
        let out = rotate_degrees(&src, 45.0).unwrap();
        assert!(out.width() > 10 && out.height() > 10);
        let center = out.pixel(out.width() / 2, out.height() / 2);
        assert_eq!(center, &[200]);
    }
}
