//! STAC document model, type classification and link resolution

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Result, ValidationError};

/// The three kinds of document forming a STAC tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Item,
    Collection,
    Catalog,
}

impl AssetType {
    /// Lower-case name as used in schema addresses
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Item => "item",
            AssetType::Collection => "collection",
            AssetType::Catalog => "catalog",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine the kind of a raw document.
///
/// GeoJSON `Feature`s are items; an explicit STAC `type` wins next; documents
/// carrying `extent` or `license` are collections; anything else is a catalog.
pub fn classify(document: &Value) -> Result<AssetType> {
    let object = document
        .as_object()
        .ok_or_else(|| ValidationError::Classification {
            details: format!("expected a JSON object, found {}", json_kind(document)),
        })?;

    match object.get("type").and_then(Value::as_str) {
        Some("Feature") | Some("Item") => return Ok(AssetType::Item),
        Some("Collection") => return Ok(AssetType::Collection),
        Some("Catalog") => return Ok(AssetType::Catalog),
        _ => {}
    }

    if object.contains_key("extent") || object.contains_key("license") {
        Ok(AssetType::Collection)
    } else {
        Ok(AssetType::Catalog)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Link relations that drive traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRel {
    Child,
    Item,
}

/// A traversable link of a catalog or collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub rel: LinkRel,
    pub href: String,
}

/// A loaded document together with where it came from
#[derive(Debug, Clone)]
pub struct StacDocument {
    pub location: String,
    pub content: Arc<Value>,
}

impl StacDocument {
    pub fn new(location: impl Into<String>, content: Arc<Value>) -> Self {
        Self {
            location: location.into(),
            content,
        }
    }

    /// The declared `stac_version`, if any
    pub fn version(&self) -> Option<&str> {
        self.content.get("stac_version").and_then(Value::as_str)
    }

    /// The declared version, failing when absent
    pub fn require_version(&self) -> Result<String> {
        self.version()
            .map(str::to_string)
            .ok_or_else(|| ValidationError::MissingField {
                field: "stac_version".to_string(),
                location: self.location.clone(),
            })
    }

    /// Declared extension identifiers in document order
    pub fn extensions(&self) -> Vec<String> {
        self.content
            .get("stac_extensions")
            .and_then(Value::as_array)
            .map(|extensions| {
                extensions
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `child` and `item` links in document order; other relations are ignored
    pub fn traversable_links(&self) -> Vec<Link> {
        let Some(links) = self.content.get("links").and_then(Value::as_array) else {
            return Vec::new();
        };

        links
            .iter()
            .filter_map(|link| {
                let rel = match link.get("rel").and_then(Value::as_str)? {
                    "child" => LinkRel::Child,
                    "item" => LinkRel::Item,
                    _ => return None,
                };
                let href = link.get("href").and_then(Value::as_str)?;
                Some(Link {
                    rel,
                    href: href.to_string(),
                })
            })
            .collect()
    }
}

/// A location with both a scheme and a host, e.g. `https://host/catalog.json`
pub fn is_network_location(location: &str) -> bool {
    Url::parse(location)
        .map(|url| url.has_host() && url.scheme() != "file")
        .unwrap_or(false)
}

/// Resolve a link `href` against the location of the document that owns it
pub fn resolve_href(base: &str, href: &str) -> String {
    if is_network_location(href) {
        return href.to_string();
    }

    if (is_network_location(base) || base.starts_with("file:"))
        && let Ok(joined) = Url::parse(base).and_then(|base_url| base_url.join(href))
    {
        return joined.to_string();
    }

    let directory = Path::new(base).parent().unwrap_or(Path::new(""));
    normalize_path(&directory.join(href))
        .to_string_lossy()
        .into_owned()
}

/// Single spelling for a location, so `a/./b/../c.json` and `a/c.json` compare equal
pub fn normalize_location(location: &str) -> String {
    if is_network_location(location) || location.starts_with("file:") {
        return Url::parse(location)
            .map(String::from)
            .unwrap_or_else(|_| location.to_string());
    }
    normalize_path(Path::new(location))
        .to_string_lossy()
        .into_owned()
}

/// Drop `.` components and fold `..` into the preceding directory, without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) =>
            {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
