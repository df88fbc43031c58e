//! URLs for pages that embed previews in their meta tags.
//!
//! [`generate_url`] points at the generate-or-fetch endpoint and always works;
//! [`preview_url`] points straight at the stored file and 404s until the image
//! has been generated once.

use std::fmt::Display;

use url::form_urlencoded;

use crate::request::RenderRequest;
use crate::store::DEFAULT_URL_PREFIX;

/// Path of the generate-or-fetch endpoint.
pub const GENERATE_PATH: &str = "/api/og";

/// Builds `/api/og?...` for `request`. Absent fields are left out.
pub fn generate_url(request: &RenderRequest) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("id", &request.id);
    query.append_pair("title", &request.title);

    let optional = [
        ("desc", &request.description),
        ("author", &request.author),
        ("category", &request.category),
        ("siteName", &request.site_name),
        ("backgroundColor", &request.background_color),
        ("textColor", &request.text_color),
    ];
    for (key, value) in optional {
        if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
            query.append_pair(key, value);
        }
    }
    if request.force_regenerate {
        query.append_pair("regenerate", "true");
    }

    format!("{GENERATE_PATH}?{}", query.finish())
}

/// Direct path of a stored preview under the default prefix.
pub fn preview_url(id: &str) -> String {
    format!("{DEFAULT_URL_PREFIX}/{id}.png")
}

pub fn blog_id(post: impl Display) -> String {
    format!("blog-{post}")
}

pub fn tool_id(slug: impl Display) -> String {
    format!("tool-{slug}")
}

pub fn page_id(page: impl Display) -> String {
    format!("page-{page}")
}

/// Request for a blog post preview.
pub fn blog_request(
    post: impl Display,
    title: &str,
    excerpt: Option<&str>,
    author: Option<&str>,
    category: Option<&str>,
) -> RenderRequest {
    RenderRequest {
        description: excerpt.map(str::to_string),
        author: author.map(str::to_string),
        category: category.map(str::to_string),
        ..RenderRequest::new(blog_id(post), title)
    }
}

/// Request for a tool page preview.
pub fn tool_request(slug: &str, name: &str, description: Option<&str>) -> RenderRequest {
    RenderRequest {
        description: description.map(str::to_string),
        ..RenderRequest::new(tool_id(slug), name)
    }
}

/// Request for any other page.
pub fn page_request(page: &str, title: &str, description: Option<&str>) -> RenderRequest {
    RenderRequest {
        description: description.map(str::to_string),
        ..RenderRequest::new(page_id(page), title)
    }
}
