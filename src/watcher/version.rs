//! Shard name and format version resolution.
//!
//! The builder names shards `<name>_v<version>.<ext>`, where `<name>` is
//! the url-encoded repository name. Several format versions of the same
//! logical shard may sit side by side during an upgrade.

/// Highest shard format version this process knows how to read.
pub const INDEX_FORMAT_VERSION: u64 = 16;

/// Split a shard path into its logical name and format version.
///
/// Never fails. A path without a recognizable `_v<digits>.` suffix is its
/// own logical name with version 0. A version too large to represent
/// resolves to `u64::MAX`, so it is never considered readable.
pub fn version_from_path(path: &str) -> (&str, u64) {
    let Some(und) = path.rfind('_') else {
        return (path, 0);
    };
    let Some(dot) = path[und..].find('.').map(|offset| und + offset) else {
        return (path, 0);
    };

    // Skip the two-byte `_v` marker.
    match path.get(und + 2..dot).and_then(parse_version) {
        Some(version) => (&path[..und], version),
        None => (path, 0),
    }
}

/// Parse `[+]<digits>`, saturating on overflow.
fn parse_version(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Only overflow can fail here.
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}
