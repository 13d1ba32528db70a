//! JSON shapes returned by the catalog API.
//!
//! Only the fields the core relies on are typed; everything else is kept in
//! a flattened `extra` map so callers can still render it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One item of a listing or search page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Resource identifier (numbers are normalised to strings).
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Thumbnail URL, when the resource has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A downloadable file attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment identifier, the key of the download directory.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Server-side file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Declared MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mime: Option<String>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Single-resource detail object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetail {
    /// Resource identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Abstract text.
    #[serde(
        rename = "abstract",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<String>,
    /// Downloadable files.
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    /// Remaining fields (authors, publishers, subjects, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts `"42"` or `42`.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
