//! Raster operations and the registry that names them.
//!
//! | Operation | Names | Parameters | New raster |
//! |---|---|---|---|
//! | [`Details`](OperationKind::Details) | `details` | none | never |
//! | [`Rotate`](OperationKind::Rotate) | `rotate` | `angle` ∈ {90, 180, 270} | yes |
//! | [`Resize`](OperationKind::Resize) | `resize` | `target_width`, `target_height` > 0 | yes |
//! | [`Grayscale`](OperationKind::Grayscale) | `grayscale` | none | yes |
//! | [`Brightness`](OperationKind::Brightness) | `brightness` | `delta` ∈ [1, 100] | yes |
//! | [`FormatConvert`](OperationKind::FormatConvert) | `transform`, `format_convert`, `convert` | `target_format` | yes |
//!
//! The set is closed. [`OperationKind::lookup`] resolves a name,
//! [`OperationKind::validate`] turns a raw [`Params`] mapping into a typed
//! [`Operation`], and [`Operation::apply`] runs it against a borrowed
//! [`Raster`]. Handlers never mutate their input: the caller keeps its raster
//! until it chooses to replace it with the one in [`Applied`].

pub mod brightness;
pub mod convert;
pub mod details;
pub mod grayscale;
pub mod params;
pub mod resize;
pub mod rotate;

use crate::codec::{Codec, CodecError};
use crate::raster::{Raster, RasterError};
use image::imageops::FilterType;
use thiserror::Error;

pub use brightness::BrightnessParams;
pub use convert::ConvertParams;
pub use params::{Attributes, ParamError, Params, Value};
pub use resize::ResizeParams;
pub use rotate::{RotateParams, RotationAngle};

/// Step-local failure. Never aborts a pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Invalid parameters: {0}")]
    Validation(#[from] ParamError),
    #[error("Operation failed: {0}")]
    Execution(String),
}

impl From<RasterError> for StepError {
    fn from(e: RasterError) -> Self {
        StepError::Execution(e.to_string())
    }
}

impl From<CodecError> for StepError {
    fn from(e: CodecError) -> Self {
        StepError::Execution(e.to_string())
    }
}

/// Collaborators and settings a handler may need while validating or applying.
#[derive(Clone, Copy)]
pub struct ExecEnv<'a> {
    pub codec: &'a dyn Codec,
    pub resize_filter: FilterType,
}

impl<'a> ExecEnv<'a> {
    pub fn new(codec: &'a dyn Codec) -> Self {
        Self {
            codec,
            resize_filter: FilterType::Lanczos3,
        }
    }

    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }
}

/// What a successful handler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Replacement raster, or `None` for read-only operations.
    pub raster: Option<Raster>,
    pub attributes: Attributes,
}

impl Applied {
    pub fn replaced(raster: Raster, attributes: Attributes) -> Self {
        Self {
            raster: Some(raster),
            attributes,
        }
    }

    pub fn inspected(attributes: Attributes) -> Self {
        Self {
            raster: None,
            attributes,
        }
    }
}

/// Operation names, before parameters are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Details,
    Rotate,
    Resize,
    Grayscale,
    Brightness,
    FormatConvert,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Details,
        OperationKind::Rotate,
        OperationKind::Resize,
        OperationKind::Grayscale,
        OperationKind::Brightness,
        OperationKind::FormatConvert,
    ];

    /// Resolve an operation name, ignoring ASCII case.
    pub fn lookup(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "details" => Some(OperationKind::Details),
            "rotate" => Some(OperationKind::Rotate),
            "resize" => Some(OperationKind::Resize),
            "grayscale" => Some(OperationKind::Grayscale),
            "brightness" => Some(OperationKind::Brightness),
            "transform" | "format_convert" | "convert" => Some(OperationKind::FormatConvert),
            _ => None,
        }
    }

    /// Canonical request name.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Details => "details",
            OperationKind::Rotate => "rotate",
            OperationKind::Resize => "resize",
            OperationKind::Grayscale => "grayscale",
            OperationKind::Brightness => "brightness",
            OperationKind::FormatConvert => "transform",
        }
    }

    /// Check `params` against this operation's contract.
    pub fn validate(self, params: &Params, env: &ExecEnv<'_>) -> Result<Operation, ParamError> {
        Ok(match self {
            OperationKind::Details => Operation::Details,
            OperationKind::Rotate => Operation::Rotate(rotate::validate(params)?),
            OperationKind::Resize => Operation::Resize(resize::validate(params)?),
            OperationKind::Grayscale => Operation::Grayscale,
            OperationKind::Brightness => Operation::Brightness(brightness::validate(params)?),
            OperationKind::FormatConvert => {
                Operation::FormatConvert(convert::validate(params, env.codec)?)
            }
        })
    }
}

/// A validated operation, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Details,
    Rotate(RotateParams),
    Resize(ResizeParams),
    Grayscale,
    Brightness(BrightnessParams),
    FormatConvert(ConvertParams),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Details => OperationKind::Details,
            Operation::Rotate(_) => OperationKind::Rotate,
            Operation::Resize(_) => OperationKind::Resize,
            Operation::Grayscale => OperationKind::Grayscale,
            Operation::Brightness(_) => OperationKind::Brightness,
            Operation::FormatConvert(_) => OperationKind::FormatConvert,
        }
    }

    pub fn apply(&self, raster: &Raster, env: &ExecEnv<'_>) -> Result<Applied, StepError> {
        match self {
            Operation::Details => Ok(details::apply(raster)),
            Operation::Rotate(p) => rotate::apply(raster, p),
            Operation::Resize(p) => resize::apply(raster, p, env.resize_filter),
            Operation::Grayscale => grayscale::apply(raster),
            Operation::Brightness(p) => brightness::apply(raster, p),
            Operation::FormatConvert(p) => convert::apply(raster, p, env.codec),
        }
    }
}

/// Resolve `name` or report it as an unknown operation.
pub fn lookup(name: &str) -> Result<OperationKind, StepError> {
    OperationKind::lookup(name).ok_or_else(|| StepError::UnknownOperation(name.to_string()))
}
