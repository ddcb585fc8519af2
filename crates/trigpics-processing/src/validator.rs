use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use trigpics_core::AppError;

/// Source formats accepted for upload. Output is always JPEG.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Reasons an uploaded image is rejected before any side effect.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unrecognised image format")]
    UnknownFormat,

    #[error("Unsupported image format: {format} (allowed: {allowed})")]
    UnsupportedFormat { format: String, allowed: String },

    #[error("Corrupt or truncated image: {0}")]
    Corrupt(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ImageValidation(err.to_string())
    }
}

/// Byte-level image validator
///
/// Checks are ordered cheapest first: size, sniffed format, full decode.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_bytes: usize,
}

impl ImageValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn validate_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        Ok(())
    }

    /// Sniff the container format from magic bytes.
    pub fn detect_format(data: &[u8]) -> Result<ImageFormat, ValidationError> {
        let format =
            image::guess_format(data).map_err(|_| ValidationError::UnknownFormat)?;

        if !ALLOWED_FORMATS.contains(&format) {
            return Err(ValidationError::UnsupportedFormat {
                format: format!("{:?}", format),
                allowed: ALLOWED_FORMATS
                    .iter()
                    .map(|f| format!("{:?}", f))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        Ok(format)
    }

    /// Run every check, including a full decode so truncated data is caught.
    pub fn validate(&self, data: &[u8]) -> Result<ImageFormat, ValidationError> {
        self.validate_size(data.len())?;
        let format = Self::detect_format(data)?;

        ImageReader::with_format(Cursor::new(data), format)
            .decode()
            .map_err(|e| ValidationError::Corrupt(e.to_string()))?;

        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 12, Rgb([10, 200, 30]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn test_validate_file_size() {
        let validator = ImageValidator::new(1024);

        assert!(validator.validate_size(1).is_ok());
        assert!(validator.validate_size(1024).is_ok());
        assert!(matches!(
            validator.validate_size(0),
            Err(ValidationError::EmptyFile)
        ));
        assert!(matches!(
            validator.validate_size(1025),
            Err(ValidationError::FileTooLarge { size: 1025, max: 1024 })
        ));
    }

    #[test]
    fn test_accepts_jpeg_and_png() {
        let validator = ImageValidator::new(1024 * 1024);
        assert_eq!(
            validator.validate(&encode(ImageFormat::Jpeg)).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            validator.validate(&encode(ImageFormat::Png)).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let validator = ImageValidator::new(1024 * 1024);
        let result = validator.validate(&encode(ImageFormat::Bmp));
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let validator = ImageValidator::new(1024);
        assert!(matches!(
            validator.validate(b"not an image"),
            Err(ValidationError::UnknownFormat)
        ));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let validator = ImageValidator::new(1024 * 1024);
        let png = encode(ImageFormat::Png);
        let truncated = &png[..png.len() / 2];
        assert!(matches!(
            validator.validate(truncated),
            Err(ValidationError::Corrupt(_))
        ));
    }

    #[test]
    fn test_oversized_is_rejected_before_decode() {
        let validator = ImageValidator::new(8);
        assert!(matches!(
            validator.validate(b"definitely longer than eight bytes"),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_maps_to_image_validation_error() {
        let err: AppError = ValidationError::EmptyFile.into();
        assert!(matches!(err, AppError::ImageValidation(_)));
    }

    #[test]
    fn test_rejection_hint_names_every_allowed_format() {
        use trigpics_core::ErrorMetadata;

        let err = AppError::from(ValidationError::UnknownFormat);
        let hint = err.suggested_action().unwrap().to_uppercase();
        for format in ALLOWED_FORMATS {
            let name = format!("{:?}", format).to_uppercase();
            assert!(hint.contains(&name), "{} missing from {:?}", name, hint);
        }
    }
}
