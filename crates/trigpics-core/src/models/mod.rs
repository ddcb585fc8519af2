//! Domain models for photos, their servers and the calling actor.

pub mod actor;
pub mod photo;
pub mod server;

pub use actor::Actor;
pub use photo::{
    join_url, AssetDimensions, ImageAssetMeta, LifecycleFlag, NewPhoto, PhotoAsset,
    PhotoMetadataUpdate, PhotoSubmission, PhotoType, PhotoVerification, PhotoView, Provenance,
    Visibility,
};
pub use server::Server;
