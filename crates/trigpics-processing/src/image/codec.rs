//! Main image and thumbnail production.

use super::orientation::ImageOrientation;
use super::resize::fit_within;
use crate::validator::{ImageValidator, ValidationError};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, RgbImage};
use std::io::Cursor;
use trigpics_core::models::AssetDimensions;
use trigpics_core::{AppError, Config};

pub const DEFAULT_MAX_DIMENSION: u32 = 4000;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 120;
pub const DEFAULT_MAIN_QUALITY: u8 = 95;
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 85;
pub const DEFAULT_MAX_BYTES: usize = 20 * 1024 * 1024;

/// Decode or encode failure. Retrying with the same bytes fails again.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::ImageProcessing(err.to_string())
    }
}

/// Clockwise rotation accepted by the rotate flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAngle {
    Deg90,
    Deg180,
    Deg270,
}

impl RotationAngle {
    pub fn degrees(self) -> u16 {
        match self {
            RotationAngle::Deg90 => 90,
            RotationAngle::Deg180 => 180,
            RotationAngle::Deg270 => 270,
        }
    }
}

impl TryFrom<i32> for RotationAngle {
    type Error = AppError;

    fn try_from(angle: i32) -> Result<Self, Self::Error> {
        match angle {
            90 => Ok(RotationAngle::Deg90),
            180 => Ok(RotationAngle::Deg180),
            270 => Ok(RotationAngle::Deg270),
            other => Err(AppError::InvalidInput(format!(
                "Rotation angle must be 90, 180 or 270, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSettings {
    pub max_bytes: usize,
    pub max_dimension: u32,
    pub thumbnail_size: u32,
    pub main_quality: u8,
    pub thumbnail_quality: u8,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            main_quality: DEFAULT_MAIN_QUALITY,
            thumbnail_quality: DEFAULT_THUMBNAIL_QUALITY,
        }
    }
}

impl CodecSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.max_image_size_bytes(),
            max_dimension: config.max_image_dimension(),
            thumbnail_size: config.thumbnail_size(),
            main_quality: config.main_jpeg_quality(),
            thumbnail_quality: config.thumbnail_jpeg_quality(),
        }
    }
}

/// Encoded main image and thumbnail with their dimensions.
#[derive(Debug, Clone)]
pub struct ProcessedPhoto {
    pub main: Bytes,
    pub thumbnail: Bytes,
    pub main_dims: AssetDimensions,
    pub thumbnail_dims: AssetDimensions,
}

/// Image codec used by the photo flows.
#[derive(Debug, Clone)]
pub struct PhotoCodec {
    settings: CodecSettings,
    validator: ImageValidator,
}

impl Default for PhotoCodec {
    fn default() -> Self {
        Self::new(CodecSettings::default())
    }
}

impl PhotoCodec {
    pub fn new(settings: CodecSettings) -> Self {
        Self {
            validator: ImageValidator::new(settings.max_bytes),
            settings,
        }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    /// Size ceiling, allowed format and a full decode.
    pub fn validate(&self, data: &[u8]) -> Result<(), ValidationError> {
        self.validator.validate(data).map(|_| ())
    }

    /// Produce the main image and thumbnail from uploaded bytes.
    ///
    /// EXIF orientation is applied first. The main image is scaled down into
    /// the `max_dimension` square, the thumbnail is scaled from the resized
    /// main image into the `thumbnail_size` square. Both are RGB JPEG.
    pub fn process(&self, data: &[u8]) -> Result<ProcessedPhoto, CodecError> {
        let img = Self::decode_oriented(data)?;
        let (original_width, original_height) = img.dimensions();

        let main = Self::scale_into(img, self.settings.max_dimension).to_rgb8();
        let main_bytes = Self::encode_jpeg(&main, self.settings.main_quality)?;

        let thumbnail = Self::scale_rgb_into(&main, self.settings.thumbnail_size);
        let thumbnail_bytes = Self::encode_jpeg(&thumbnail, self.settings.thumbnail_quality)?;

        tracing::debug!(
            original_width = original_width,
            original_height = original_height,
            width = main.width(),
            height = main.height(),
            thumbnail_width = thumbnail.width(),
            thumbnail_height = thumbnail.height(),
            size_bytes = main_bytes.len(),
            "Processed photo"
        );

        Ok(ProcessedPhoto {
            main_dims: Self::asset_dimensions(&main, &main_bytes)?,
            thumbnail_dims: Self::asset_dimensions(&thumbnail, &thumbnail_bytes)?,
            main: main_bytes,
            thumbnail: thumbnail_bytes,
        })
    }

    /// Rotate clockwise and re-encode as a main-quality JPEG.
    ///
    /// The result is meant to be fed back through [`PhotoCodec::process`].
    pub fn rotate(&self, data: &[u8], angle: RotationAngle) -> Result<Bytes, CodecError> {
        let img = Self::decode_oriented(data)?;
        let rotated = ImageOrientation::rotate_by_angle(img, angle.degrees()).to_rgb8();
        Self::encode_jpeg(&rotated, self.settings.main_quality)
    }

    /// Pixel dimensions from the image header, without a full decode.
    pub fn dimensions(data: &[u8]) -> Result<(u32, u32), CodecError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn decode_oriented(data: &[u8]) -> Result<DynamicImage, CodecError> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(ImageOrientation::apply_exif_orientation(img, data))
    }

    fn scale_into(img: DynamicImage, max: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (target_width, target_height) = fit_within(width, height, max);
        if (target_width, target_height) == (width, height) {
            img
        } else {
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        }
    }

    fn scale_rgb_into(img: &RgbImage, max: u32) -> RgbImage {
        let (target_width, target_height) = fit_within(img.width(), img.height(), max);
        if (target_width, target_height) == img.dimensions() {
            img.clone()
        } else {
            image::imageops::resize(img, target_width, target_height, FilterType::Lanczos3)
        }
    }

    fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Bytes, CodecError> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(img)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }

    fn asset_dimensions(img: &RgbImage, encoded: &Bytes) -> Result<AssetDimensions, CodecError> {
        let convert = |value: u32| {
            i32::try_from(value).map_err(|_| CodecError::Encode(format!("dimension {} out of range", value)))
        };
        Ok(AssetDimensions {
            byte_size: i64::try_from(encoded.len())
                .map_err(|_| CodecError::Encode("encoded size out of range".to_string()))?,
            width: convert(img.width())?,
            height: convert(img.height())?,
        })
    }
}
