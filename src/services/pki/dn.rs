//! Distinguished-name helpers.
//!
//! TLS terminators such as nginx emit `$ssl_client_s_dn` in the legacy
//! path-style form (`/CN=Jane Doe/OU=Org/O=Example`, root last). Profiles are
//! stored in the conventional leaf-first form (`O=Example, OU=Org, CN=Jane Doe`).

use std::sync::LazyLock;

use regex::Regex;

const USERNAME_MAX_CHARS: usize = 30;
const COLLISION_PREFIX_CHARS: usize = 27;

static COMMA_WITHOUT_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\w)").expect("static regex"));

/// Convert a path-style DN into comma-separated canonical form.
pub fn normalize(raw_dn: &str) -> String {
    let dn = raw_dn.strip_prefix('/').unwrap_or(raw_dn);
    let joined = dn.split('/').rev().collect::<Vec<_>>().join(", ");
    COMMA_WITHOUT_SPACE
        .replace_all(&joined, ", ${1}")
        .into_owned()
}

/// Text between the first `CN=` and the next comma, or the whole DN without a `CN=`.
pub fn display_name(dn: &str) -> &str {
    let Some(start) = dn.find("CN=") else {
        return dn;
    };
    let rest = &dn[start + "CN=".len()..];
    match rest.find(',') {
        Some(end) => &rest[..end],
        None => rest,
    }
}

pub fn base_username(display_name: &str) -> String {
    display_name
        .chars()
        .take(USERNAME_MAX_CHARS)
        .collect::<String>()
        .replace(' ', "_")
        .replace('\'', "")
        .to_lowercase()
}

/// Shortened base that leaves room for a `_N` suffix.
pub fn collision_prefix(username: &str) -> String {
    username.chars().take(COLLISION_PREFIX_CHARS).collect()
}

pub fn suffixed_username(prefix: &str, existing: u64) -> String {
    format!("{}_{}", prefix, existing + 1)
}
