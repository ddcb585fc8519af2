use image::{imageops, DynamicImage};
use std::io::Cursor;

/// EXIF orientation handling (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Read the EXIF orientation tag (1-8) from the container, `1` when the
    /// image carries no EXIF block or no usable tag.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u8::try_from(value).ok())
            .filter(|value| (1..=8).contains(value))
            .unwrap_or(1)
    }

    /// Rotation (clockwise degrees) and flips needed to display an image
    /// stored with the given orientation upright.
    /// Returns (rotate_angle, flip_horizontal, flip_vertical)
    pub fn transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            2 => (None, true, false),
            3 => (Some(180), false, false),
            4 => (None, false, true),
            5 => (Some(90), true, false),
            6 => (Some(90), false, false),
            7 => (Some(270), true, false),
            8 => (Some(270), false, false),
            _ => (None, false, false),
        }
    }

    /// Apply the orientation embedded in `data` to the decoded `img`.
    pub fn apply_exif_orientation(img: DynamicImage, data: &[u8]) -> DynamicImage {
        let orientation = Self::read_exif_orientation(data);
        if orientation == 1 {
            return img;
        }

        let (rotate, flip_h, flip_v) = Self::transforms(orientation);
        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        let mut img = match rotate {
            Some(angle) => Self::rotate_by_angle(img, angle),
            None => img,
        };
        if flip_h {
            img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
        }
        if flip_v {
            img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
        }
        img
    }

    /// Rotate clockwise by 90, 180 or 270 degrees; other angles are a no-op.
    pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        }
    }
}
