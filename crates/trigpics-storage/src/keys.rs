//! Key derivation for photo objects.
//!
//! Key format: `{folder:03}/{P|I}{id:05}[_r{N}].jpg` with `folder = id / 1000`.

use regex::Regex;
use std::sync::LazyLock;

const MAIN_PREFIX: char = 'P';
const THUMBNAIL_PREFIX: char = 'I';
const EXTENSION: &str = "jpg";

/// `<base>(_r<N>)?.<ext>` where the extension belongs to the last path segment.
static REVISION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.*?)(?:_r(?P<rev>\d+))?\.(?P<ext>[A-Za-z0-9]+)$").ok()
});

fn object_key(prefix: char, photo_id: i64) -> String {
    format!(
        "{:03}/{}{:05}.{}",
        photo_id / 1000,
        prefix,
        photo_id,
        EXTENSION
    )
}

/// Key of the main image for a freshly uploaded photo.
pub fn photo_key(photo_id: i64) -> String {
    object_key(MAIN_PREFIX, photo_id)
}

/// Key of the thumbnail for a freshly uploaded photo.
pub fn thumbnail_key(photo_id: i64) -> String {
    object_key(THUMBNAIL_PREFIX, photo_id)
}

/// Derive the key of the next revision of `current_key`.
///
/// `P00001.jpg` becomes `P00001_r1.jpg` and `P00001_r12.jpg` becomes
/// `P00001_r13.jpg`. Keys of any other shape get `_r1` inserted before their
/// final extension, or appended when there is none. The result is not
/// checked against the store.
pub fn next_revision(current_key: &str) -> String {
    if let Some(caps) = REVISION_PATTERN
        .as_ref()
        .and_then(|re| re.captures(current_key))
    {
        let base = &caps["base"];
        let ext = &caps["ext"];
        match caps.name("rev").map(|m| m.as_str().parse::<u64>()) {
            None => return format!("{}_r1.{}", base, ext),
            Some(Ok(rev)) => {
                if let Some(next) = rev.checked_add(1) {
                    return format!("{}_r{}.{}", base, next, ext);
                }
            }
            Some(Err(_)) => {}
        }
    }

    insert_before_extension(current_key, "_r1")
}

/// Revision number carried by `key`, `0` for an unrevised key.
pub fn revision_number(key: &str) -> Option<u64> {
    let caps = REVISION_PATTERN.as_ref()?.captures(key)?;
    match caps.name("rev") {
        Some(rev) => rev.as_str().parse().ok(),
        None => Some(0),
    }
}

fn insert_before_extension(key: &str, suffix: &str) -> String {
    let segment_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let split = segment_start + dot;
            format!("{}{}{}", &key[..split], suffix, &key[split..])
        }
        _ => format!("{}{}", key, suffix),
    }
}
