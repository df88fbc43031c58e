//! JSON bodies returned by the HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::request::RenderRequest;
use crate::store::CacheEntry;

/// Query string of `GET /api/og`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuery {
    pub id: Option<String>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub site_name: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub regenerate: Option<String>,
}

impl GenerateQuery {
    pub fn into_request(self) -> RenderRequest {
        RenderRequest {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            description: self.desc,
            author: self.author,
            category: self.category,
            site_name: self.site_name,
            background_color: self.background_color,
            text_color: self.text_color,
            force_regenerate: self.regenerate.as_deref() == Some("true"),
        }
    }
}

/// Query string of `/api/og-cache`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheQuery {
    pub action: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct GenerateResponse {
    pub success: bool,
    pub url: String,
    pub cached: bool,
    /// RFC 3339 timestamp of a fresh render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CachedImage {
    pub filename: String,
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CacheListResponse {
    pub success: bool,
    pub count: usize,
    pub images: Vec<CachedImage>,
}

impl CacheListResponse {
    pub fn new(entries: &[CacheEntry], url: impl Fn(&CacheEntry) -> String) -> Self {
        let images: Vec<CachedImage> = entries
            .iter()
            .map(|entry| CachedImage {
                filename: entry.id.file_name(),
                id: entry.id.to_string(),
                url: url(entry),
            })
            .collect();
        Self {
            success: true,
            count: images.len(),
            images,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CacheCheckResponse {
    pub success: bool,
    pub id: String,
    pub exists: bool,
    /// Present only when the image exists; serialized as `null` otherwise.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CacheClearResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct CacheDeleteResponse {
    /// Whether an image was actually removed.
    pub success: bool,
    pub message: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
