use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal { $($variant:ident => $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            /// Single-character code stored in the database
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn from_code(code: &str) -> Result<Self, AppError> {
                match code.trim() {
                    $($code => Ok($name::$variant),)+
                    other => Err(AppError::InvalidInput(format!(
                        "Invalid {} code: {:?}",
                        $label, other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s)
            }
        }
    };
}

code_enum! {
    /// What the photo shows
    PhotoType, "photo type" {
        Trigpoint => "T",
        FlushBracket => "F",
        Landscape => "L",
        People => "P",
        Other => "O",
    }
}

code_enum! {
    /// Licence the uploader granted, which also decides public visibility
    Visibility, "license" {
        PublicDomain => "Y",
        CreativeCommons => "C",
        Private => "N",
    }
}

code_enum! {
    /// Row lifecycle: only `Active` rows are visible to readers
    LifecycleFlag, "lifecycle" {
        Active => "N",
        SoftDeleted => "Y",
        Moderated => "M",
    }
}

code_enum! {
    /// Where the row's bytes came from
    Provenance, "provenance" {
        Upload => "F",
        Revised => "R",
    }
}

/// Byte size and pixel dimensions of one encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDimensions {
    pub byte_size: i64,
    pub width: i32,
    pub height: i32,
}

/// Stored object plus its dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAssetMeta {
    /// Object store key; empty while the row is a placeholder
    pub key: String,
    pub byte_size: i64,
    pub width: i32,
    pub height: i32,
}

impl ImageAssetMeta {
    pub fn new(key: impl Into<String>, dims: AssetDimensions) -> Self {
        Self {
            key: key.into(),
            byte_size: dims.byte_size,
            width: dims.width,
            height: dims.height,
        }
    }

    pub fn dimensions(&self) -> AssetDimensions {
        AssetDimensions {
            byte_size: self.byte_size,
            width: self.width,
            height: self.height,
        }
    }
}

/// One photo row with its main image and thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoAsset {
    pub id: i64,
    pub log_id: i64,
    pub server_id: i64,
    pub photo_type: PhotoType,
    pub main: ImageAssetMeta,
    pub thumbnail: ImageAssetMeta,
    pub caption: String,
    pub description: String,
    pub ip_addr: String,
    pub visibility: Visibility,
    pub lifecycle: LifecycleFlag,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

impl PhotoAsset {
    pub fn is_active(&self) -> bool {
        self.lifecycle == LifecycleFlag::Active
    }

    /// Whether the row still waits for its object keys
    pub fn is_placeholder(&self) -> bool {
        self.main.key.is_empty() || self.thumbnail.key.is_empty()
    }

    /// Copies the fields a revision inherits from this photo.
    pub fn revision_of(&self, main: AssetDimensions, thumbnail: AssetDimensions) -> NewPhoto {
        NewPhoto {
            log_id: self.log_id,
            server_id: self.server_id,
            photo_type: self.photo_type,
            main,
            thumbnail,
            caption: self.caption.clone(),
            description: self.description.clone(),
            ip_addr: self.ip_addr.clone(),
            visibility: self.visibility,
            provenance: Provenance::Revised,
        }
    }
}

/// Placeholder row contents: everything except the object keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub log_id: i64,
    pub server_id: i64,
    pub photo_type: PhotoType,
    pub main: AssetDimensions,
    pub thumbnail: AssetDimensions,
    pub caption: String,
    pub description: String,
    pub ip_addr: String,
    pub visibility: Visibility,
    pub provenance: Provenance,
}

/// Caller-supplied metadata accompanying a new upload
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct PhotoSubmission {
    pub log_id: i64,
    #[validate(length(
        min = 1,
        max = 80,
        message = "Caption must be between 1 and 80 characters"
    ))]
    pub caption: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub text_desc: String,
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    pub license: Visibility,
    #[serde(default)]
    pub client_ip: Option<String>,
}

impl PhotoSubmission {
    /// Trims text fields and validates them.
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.caption = self.caption.trim().to_string();
        self.text_desc = self.text_desc.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

/// Allow-listed partial update of a photo's descriptive fields.
///
/// Unknown fields are rejected at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct PhotoMetadataUpdate {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 80,
        message = "Caption must be between 1 and 80 characters"
    ))]
    pub caption: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub text_desc: Option<String>,
    #[serde(default)]
    pub license: Option<Visibility>,
}

impl PhotoMetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none() && self.text_desc.is_none() && self.license.is_none()
    }

    /// Trims text fields and rejects empty or invalid updates.
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.caption = self.caption.map(|c| c.trim().to_string());
        self.text_desc = self.text_desc.map(|d| d.trim().to_string());
        if self.is_empty() {
            return Err(AppError::InvalidInput(
                "Update must contain caption, text_desc or license".to_string(),
            ));
        }
        self.validate()?;
        Ok(self)
    }
}

/// Photo as returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PhotoView {
    pub id: i64,
    pub log_id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    pub filesize: i64,
    pub width: i32,
    pub height: i32,
    pub icon_filesize: i64,
    pub icon_width: i32,
    pub icon_height: i32,
    pub caption: String,
    pub text_desc: String,
    pub license: Visibility,
    pub photo_url: String,
    pub icon_url: String,
}

impl PhotoView {
    pub fn from_asset(asset: &PhotoAsset, user_id: i64, base_url: &str) -> Self {
        Self {
            id: asset.id,
            log_id: asset.log_id,
            user_id,
            photo_type: asset.photo_type,
            filesize: asset.main.byte_size,
            width: asset.main.width,
            height: asset.main.height,
            icon_filesize: asset.thumbnail.byte_size,
            icon_width: asset.thumbnail.width,
            icon_height: asset.thumbnail.height,
            caption: asset.caption.clone(),
            text_desc: asset.description.clone(),
            license: asset.visibility,
            photo_url: join_url(base_url, &asset.main.key),
            icon_url: join_url(base_url, &asset.thumbnail.key),
        }
    }
}

/// Result of checking a photo's stored objects against its row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PhotoVerification {
    pub photo_id: i64,
    pub photo_accessible: bool,
    pub icon_accessible: bool,
    pub photo_dimension_match: bool,
    pub icon_dimension_match: bool,
    pub photo_width_actual: Option<u32>,
    pub photo_height_actual: Option<u32>,
    pub icon_width_actual: Option<u32>,
    pub icon_height_actual: Option<u32>,
    pub errors: Vec<String>,
}

/// Joins a server base URL and an object key with exactly one `/`.
///
/// An empty base yields the key unchanged.
pub fn join_url(base: &str, key: &str) -> String {
    if base.is_empty() {
        return key.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
