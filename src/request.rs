//! Render requests and their validated form.
//!
//! A [`RenderRequest`] is what callers send: loose strings, all optional except
//! the id and title. [`RenderRequest::validate`] checks it once and produces a
//! [`PreviewId`] plus [`RenderOptions`], which is all the renderer ever sees.
//!
//! # Example
//!
//! ```
//! use og_preview::RenderRequest;
//!
//! let request = RenderRequest::new("blog-42", "Great Tool")
//!     .with_description("Short desc")
//!     .with_category("Productivity");
//!
//! let (id, options) = request.validate().unwrap();
//! assert_eq!(id.as_str(), "blog-42");
//! assert_eq!(options.site_name, "SaaSPilot");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{InvalidPreviewId, PreviewId};
use crate::theme::{Color, InvalidColor, Theme};

/// Footer text used when the request names no site.
pub const DEFAULT_SITE_NAME: &str = "SaaSPilot";

// ============================================================================
// Errors
// ============================================================================

/// Reasons a request is rejected before any rendering or storage happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required parameter: id")]
    MissingId,
    #[error(transparent)]
    InvalidId(#[from] InvalidPreviewId),
    #[error("Missing required parameter: title")]
    MissingTitle,
    #[error("invalid {field}: {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: InvalidColor,
    },
}

// ============================================================================
// RenderRequest
// ============================================================================

/// A caller's request to generate (or fetch) a preview.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Cache key; becomes the file name `{id}.png`.
    pub id: String,
    /// Headline text. Required.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Footer text; [`DEFAULT_SITE_NAME`] when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// Hex color that replaces the background gradient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Hex color for the title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    /// Drop any cached image and render again.
    #[serde(default)]
    pub force_regenerate: bool,
}

impl RenderRequest {
    /// Creates a request with the two required fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = Some(site_name.into());
        self
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    /// Marks the request as a forced regeneration.
    pub fn regenerate(mut self, force: bool) -> Self {
        self.force_regenerate = force;
        self
    }

    /// Validates the id alone. Used by callers that must reject a request
    /// before looking at anything else.
    pub fn preview_id(&self) -> Result<PreviewId, ValidationError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        Ok(PreviewId::parse(id)?)
    }

    /// Checks every field and applies defaults.
    ///
    /// Blank optional strings count as absent.
    pub fn validate(&self) -> Result<(PreviewId, RenderOptions), ValidationError> {
        let id = self.preview_id()?;

        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }

        let background = parse_color("backgroundColor", self.background_color.as_deref())?;
        let text = parse_color("textColor", self.text_color.as_deref())?;

        let options = RenderOptions {
            title: title.to_string(),
            description: non_blank(self.description.as_deref()),
            author: non_blank(self.author.as_deref()),
            category: non_blank(self.category.as_deref()),
            site_name: non_blank(self.site_name.as_deref())
                .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
            theme: Theme::with_overrides(background, text),
        };
        Ok((id, options))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_color(field: &'static str, value: Option<&str>) -> Result<Option<Color>, ValidationError> {
    match non_blank(value) {
        Some(value) => Color::parse(&value)
            .map(Some)
            .map_err(|source| ValidationError::InvalidColor { field, source }),
        None => Ok(None),
    }
}

// ============================================================================
// RenderOptions
// ============================================================================

/// Validated, normalized input to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub site_name: String,
    pub theme: Theme,
}

impl RenderOptions {
    /// Options with only a title and every default applied.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            author: None,
            category: None,
            site_name: DEFAULT_SITE_NAME.to_string(),
            theme: Theme::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
