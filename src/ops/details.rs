//! Read-only inspection of the working raster.

use super::Applied;
use super::params::Attributes;
use crate::raster::Raster;

pub fn apply(raster: &Raster) -> Applied {
    let format = raster.format();
    Applied::inspected(
        Attributes::new()
            .with("width", raster.width())
            .with("height", raster.height())
            .with("mode", format.mode())
            .with("color_space", format.color_space())
            .with("channels", format.channels())
            .with("has_transparency_data", format.has_alpha()),
    )
}
