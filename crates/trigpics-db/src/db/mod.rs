//! Database repositories for the photo pipeline
//!
//! `tphoto` rows are the Asset Record Store; `server` and `tlog` are read
//! only, for URL building and ownership checks. [`PhotoRecordStore`] is the
//! seam the lifecycle orchestrator depends on.

pub mod log;
pub mod photo;
pub mod server;
pub mod store;

pub use log::LogRepository;
pub use photo::{PhotoRepository, PhotoRow};
pub use server::ServerRepository;
pub use store::{PgPhotoRecordStore, PhotoRecordStore};
