//! Volume identity helpers
//!
//! Volume ids are opaque strings that embed the UUID of the backing
//! namespace somewhere inside them (`pvc-<uuid>`, `<pool>/<uuid>`, ...).

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMBEDDED_UUID: Regex = Regex::new(
        r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
    )
    .expect("static UUID pattern");
    static ref CANONICAL_UUID: Regex = Regex::new(
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
    )
    .expect("static UUID pattern");
}

/// Extract the leftmost UUID embedded in `volume_id`, lowercased
pub fn extract_volume_uuid(volume_id: &str) -> Option<String> {
    EMBEDDED_UUID
        .find(volume_id)
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Whether `value` is exactly a lowercase 8-4-4-4-12 hex UUID
pub fn is_canonical_uuid(value: &str) -> bool {
    CANONICAL_UUID.is_match(value)
}
