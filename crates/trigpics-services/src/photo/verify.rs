//! Check a photo's stored objects against its row.

use trigpics_core::models::{join_url, ImageAssetMeta, PhotoVerification};
use trigpics_core::AppError;
use trigpics_processing::PhotoCodec;

use super::lifecycle::PhotoLifecycle;

#[derive(Debug, Default)]
struct AssetCheck {
    accessible: bool,
    dimensions: Option<(u32, u32)>,
    dimension_match: bool,
    problem: Option<String>,
}

impl PhotoLifecycle {
    /// Download both objects of an active photo through their public URLs
    /// and compare their pixel dimensions with the stored ones.
    ///
    /// Download and decode problems end up in the report, only an unknown
    /// or inactive photo is an error.
    #[tracing::instrument(skip(self))]
    pub async fn verify_photo(&self, photo_id: i64) -> Result<PhotoVerification, AppError> {
        let photo = self.load_active(photo_id).await?;
        let base_url = self.base_url(photo.server_id).await?;

        let (main, icon) = tokio::join!(
            self.check_asset(&base_url, &photo.main, "photo"),
            self.check_asset(&base_url, &photo.thumbnail, "icon"),
        );

        let report = PhotoVerification {
            photo_id,
            photo_accessible: main.accessible,
            icon_accessible: icon.accessible,
            photo_dimension_match: main.dimension_match,
            icon_dimension_match: icon.dimension_match,
            photo_width_actual: main.dimensions.map(|(w, _)| w),
            photo_height_actual: main.dimensions.map(|(_, h)| h),
            icon_width_actual: icon.dimensions.map(|(w, _)| w),
            icon_height_actual: icon.dimensions.map(|(_, h)| h),
            errors: main.problem.into_iter().chain(icon.problem).collect(),
        };

        if report.errors.is_empty() {
            tracing::debug!(photo_id = photo_id, "Photo verified");
        } else {
            tracing::warn!(photo_id = photo_id, errors = ?report.errors, "Photo verification found problems");
        }

        Ok(report)
    }

    async fn check_asset(&self, base_url: &str, asset: &ImageAssetMeta, label: &str) -> AssetCheck {
        let url = join_url(base_url, &asset.key);
        let bytes = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AssetCheck {
                    problem: Some(format!("{} not accessible: {}", label, e)),
                    ..Default::default()
                }
            }
        };

        match PhotoCodec::dimensions(&bytes) {
            Ok((width, height)) => {
                let dimension_match = i64::from(width) == i64::from(asset.width)
                    && i64::from(height) == i64::from(asset.height);
                let problem = (!dimension_match).then(|| {
                    format!(
                        "{} is {}x{} but stored as {}x{}",
                        label, width, height, asset.width, asset.height
                    )
                });
                AssetCheck {
                    accessible: true,
                    dimensions: Some((width, height)),
                    dimension_match,
                    problem,
                }
            }
            Err(e) => AssetCheck {
                accessible: true,
                problem: Some(format!("{} could not be decoded: {}", label, e)),
                ..Default::default()
            },
        }
    }
}
