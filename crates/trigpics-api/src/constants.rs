//! API constants shared by routing and the OpenAPI document.

/// Current API version, used in path prefixes.
pub const API_VERSION: &str = "v1";

/// Prefix every versioned route is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Public path the local storage backend is served from.
pub const LOCAL_PHOTOS_PATH: &str = "/photos";

/// Header carrying the authenticated user id, set by the fronting gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header marking the authenticated user as an administrator.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// Room left for multipart boundaries and text fields on top of the image.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
