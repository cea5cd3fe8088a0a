//! Schema address resolution
//!
//! Maps a STAC version plus an object kind (or an extension identifier) to the
//! URL of the JSON Schema that validates it. Every function here is pure: the
//! address never depends on anything fetched at runtime.

use crate::document::AssetType;

/// Releases whose schemas are published on schemas.stacspec.org
pub const NEW_SCHEME_VERSIONS: &[&str] = &[
    "1.0.0-beta.2",
    "1.0.0-rc.1",
    "1.0.0-rc.2",
    "1.0.0-rc.3",
    "1.0.0-rc.4",
    "1.0.0",
];

/// Host serving schemas for the versions in [`NEW_SCHEME_VERSIONS`]
pub const SPEC_HOST: &str = "https://schemas.stacspec.org";

/// CDN serving core schemas for every other version, and all extension schemas
pub const LEGACY_CDN: &str = "https://cdn.staclint.com";

/// Version whose extension schemas were never published
const UNPUBLISHED_EXTENSION_VERSION: &str = "1.0.0-beta.2";

/// Version used in place of [`UNPUBLISHED_EXTENSION_VERSION`] for extension addresses
const EXTENSION_FALLBACK_VERSION: &str = "1.0.0-beta.1";

/// Whether `version` uses the schemas.stacspec.org addressing scheme
pub fn uses_new_scheme(version: &str) -> bool {
    NEW_SCHEME_VERSIONS.contains(&version)
}

/// Core schema address for a kind given by name (case-insensitive)
pub fn resolve_core_schema(version: &str, kind: &str) -> String {
    let kind = kind.to_lowercase();
    if uses_new_scheme(version) {
        format!(
            "{}/v{}/{}-spec/json-schema/{}.json",
            SPEC_HOST, version, kind, kind
        )
    } else {
        format!("{}/v{}/{}.json", LEGACY_CDN, version, kind)
    }
}

/// Core schema address for a classified document
pub fn core_schema_for(version: &str, asset_type: AssetType) -> String {
    resolve_core_schema(version, asset_type.as_str())
}

/// Extension schema address.
///
/// URLs and `.json` references are taken verbatim; short identifiers are
/// alias-normalized and placed on the legacy CDN.
pub fn resolve_extension_schema(version: &str, extension: &str) -> String {
    if is_http_url(extension) || extension.ends_with(".json") {
        return extension.to_string();
    }

    format!(
        "{}/v{}/extension/{}.json",
        LEGACY_CDN,
        extension_version(version),
        normalize_extension(extension)
    )
}

/// Rewrite short extension aliases to their published names
pub fn normalize_extension(extension: &str) -> &str {
    match extension {
        "proj" => "projection",
        other => other,
    }
}

/// Version namespace that actually hosts the extension schemas for `version`
pub fn extension_version(version: &str) -> &str {
    if version == UNPUBLISHED_EXTENSION_VERSION {
        EXTENSION_FALLBACK_VERSION
    } else {
        version
    }
}

fn is_http_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
