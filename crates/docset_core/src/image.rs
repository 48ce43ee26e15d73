use std::path::{Component, Path};

use url::Url;

pub const IMAGES_DIR: &str = "images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageClass {
    Remote,
    Local,
    DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub url: String,
    pub class: ImageClass,
}

impl ImageReference {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let class = classify_image_url(&url);
        Self { url, class }
    }
}

pub fn classify_image_url(url: &str) -> ImageClass {
    let trimmed = url.trim_start();
    if starts_with_ignore_case(trimmed, "http://") || starts_with_ignore_case(trimmed, "https://")
    {
        ImageClass::Remote
    } else if starts_with_ignore_case(trimmed, "data:") {
        ImageClass::DataUri
    } else {
        ImageClass::Local
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Number of directories between a page and the documents root.
///
/// `page` is either relative to `documents_root` or an absolute path below it.
pub fn page_depth(page: &Path, documents_root: &Path) -> usize {
    let relative = page.strip_prefix(documents_root).unwrap_or(page);
    relative
        .parent()
        .map(|dir| {
            dir.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0)
}

/// `"../"` repeated `depth` times.
pub fn depth_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Relative reference from a page at `depth` to the shared images directory.
pub fn relative_images_path(depth: usize) -> String {
    format!("{}{IMAGES_DIR}/", depth_prefix(depth))
}

/// Maps a declared content type to a file extension. Parameters are ignored.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "image/avif" => ".avif",
        "image/tiff" => ".tiff",
        _ => return None,
    };
    Some(ext)
}

/// Maps the suffix of a URL's path to a file extension.
pub fn extension_for_url(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, suffix) = last.rsplit_once('.')?;
    let ext = match suffix.to_ascii_lowercase().as_str() {
        "png" => ".png",
        "jpg" | "jpeg" => ".jpg",
        "gif" => ".gif",
        "svg" => ".svg",
        "webp" => ".webp",
        "bmp" => ".bmp",
        "ico" => ".ico",
        "avif" => ".avif",
        "tif" | "tiff" => ".tiff",
        _ => return None,
    };
    Some(ext)
}

/// Content type first, URL suffix second.
pub fn image_extension(content_type: Option<&str>, url: &str) -> Option<&'static str> {
    content_type
        .and_then(extension_for_content_type)
        .or_else(|| extension_for_url(url))
}
