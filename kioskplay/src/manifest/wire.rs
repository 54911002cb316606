//! Manifest wire format adapter.
//!
//! Two shapes are served by manifest endpoints in the field:
//!
//! ```text
//! { "version": 1700000000,
//!   "content": { "videos": [ { "filename", "url", "size", "modified", "type" } ] } }
//!
//! { "content": { "video": "https://host/videos/promo.mp4" } }      (legacy)
//! ```
//!
//! Both are normalized into a [`Manifest`] here. Entries that cannot be
//! played (no URL, non-video type, unusable filename) are dropped, and
//! relative URLs are resolved against the manifest URL.

use std::collections::HashSet;

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::error::{ManifestError, ManifestResult};
use super::model::{is_valid_filename, Manifest, ManifestVersion, VideoDescriptor};

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    content: Option<RawContent>,
    /// Older status-style responses carry the single video at top level.
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContent {
    #[serde(default)]
    videos: Option<Vec<RawVideo>>,
    #[serde(default)]
    video: Option<String>,
    #[serde(default, rename = "nextVideo")]
    next_video: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default, alias = "localUrl")]
    url: Option<String>,
    #[serde(default)]
    size: Option<Value>,
    #[serde(default)]
    modified: Option<Value>,
    #[serde(default, rename = "type")]
    mime_type: Option<String>,
}

/// Parses a manifest body fetched from `manifest_url`.
pub fn parse_manifest(body: &[u8], manifest_url: &str) -> ManifestResult<Manifest> {
    let raw: RawManifest = serde_json::from_slice(body).map_err(|e| ManifestError::Parse {
        url: manifest_url.to_string(),
        reason: e.to_string(),
    })?;

    let base = Url::parse(manifest_url).ok();
    let version = raw.version.as_ref().and_then(version_token);

    let raw_videos = match raw.content {
        Some(RawContent {
            videos: Some(videos),
            ..
        }) => videos,
        Some(RawContent {
            video, next_video, ..
        }) => legacy_entries([video, next_video]),
        None => legacy_entries([raw.video_url, None]),
    };

    let mut seen = HashSet::new();
    let mut videos = Vec::with_capacity(raw_videos.len());
    for raw_video in raw_videos {
        match normalize(raw_video, base.as_ref()) {
            Ok(video) => {
                if seen.insert(video.filename.clone()) {
                    videos.push(video);
                } else {
                    debug!(filename = %video.filename, "Dropping duplicate manifest entry");
                }
            }
            Err(reason) => debug!(reason, "Dropping manifest entry"),
        }
    }

    Ok(Manifest { version, videos })
}

fn legacy_entries(urls: [Option<String>; 2]) -> Vec<RawVideo> {
    urls.into_iter()
        .flatten()
        .filter(|url| !url.trim().is_empty())
        .map(|url| RawVideo {
            filename: None,
            url: Some(url),
            size: None,
            modified: None,
            mime_type: None,
        })
        .collect()
}

fn normalize(raw: RawVideo, base: Option<&Url>) -> Result<VideoDescriptor, &'static str> {
    let url = raw
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or("entry has no url")?;
    let resolved = resolve_url(url, base).ok_or("entry url cannot be resolved")?;

    let filename = raw
        .filename
        .as_deref()
        .map(basename)
        .filter(|f| !f.is_empty())
        .or_else(|| filename_from_url(&resolved))
        .ok_or("entry has no filename")?;
    if !is_valid_filename(&filename) {
        return Err("entry filename is not a plain basename");
    }

    let mime_type = match raw.mime_type.as_deref().map(str::trim) {
        Some(declared) if !declared.is_empty() => {
            if !declared.to_ascii_lowercase().starts_with("video/") {
                return Err("entry is not a video");
            }
            declared.to_string()
        }
        _ => infer_mime_type(&filename)
            .ok_or("entry type cannot be inferred")?
            .to_string(),
    };

    Ok(VideoDescriptor {
        filename,
        source_url: resolved.to_string(),
        local_ref: None,
        mime_type,
        size_bytes: raw.size.as_ref().and_then(as_u64),
        modified_at: raw.modified.as_ref().and_then(as_i64),
    })
}

fn resolve_url(url: &str, base: Option<&Url>) -> Option<Url> {
    match Url::parse(url) {
        Ok(absolute) => Some(absolute),
        Err(_) => base.and_then(|b| b.join(url).ok()),
    }
}

fn basename(name: &str) -> String {
    name.trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Infers a video content type from a filename extension.
pub fn infer_mime_type(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        "ts" => Some("video/mp2t"),
        _ => None,
    }
}

fn version_token(value: &Value) -> Option<ManifestVersion> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(ManifestVersion::new(s.clone())),
        other => Some(ManifestVersion::new(other.to_string())),
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
