//! Image processing module
//!
//! - EXIF orientation handling (orientation)
//! - bounding-square fitting (resize)
//! - main/thumbnail production and rotation (codec)

pub mod codec;
pub mod orientation;
pub mod resize;

pub use codec::{CodecError, CodecSettings, PhotoCodec, ProcessedPhoto, RotationAngle};
pub use orientation::ImageOrientation;
pub use resize::fit_within;
