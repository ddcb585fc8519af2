//! Image codec for the photo pipeline.
//!
//! Validates uploaded bytes, applies embedded EXIF orientation, scales the
//! picture down into the main and thumbnail bounding squares and re-encodes
//! both as JPEG. All entry points are synchronous and CPU-bound; async
//! callers run them on the blocking pool.

pub mod image;
pub mod validator;

pub use image::{
    fit_within, CodecError, CodecSettings, ImageOrientation, PhotoCodec, ProcessedPhoto,
    RotationAngle,
};
pub use validator::{ImageValidator, ValidationError, ALLOWED_FORMATS};
