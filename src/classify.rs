//! Decide how a resolved URL should be rendered.

use url::Url;

use crate::overrides::MediaOverrides;
use crate::types::MediaKind;
use crate::uri::{is_ipfs_hash, strip_prefix_ci};

const VIDEO_EXTS: &[&str] = &["mp4", "webm", "mov", "m4v"];
const VIDEO_TOKENS: &[&str] = &["video", "mp4", "webm", "animation_url"];
const ANIMATION_EXTS: &[&str] = &["gif", "webp", "svg", "html", "htm", "glb", "gltf"];
const ANIMATION_MIME_TOKENS: &[&str] = &["gif", "webp", "svg", "html", "gltf"];
pub(crate) const AUDIO_EXTS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac", "flac"];

/// Extra signals that travel with a URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaHints<'a> {
    pub mime: Option<&'a str>,
    /// The extractor found this URL in an audio field.
    pub audio: bool,
}

impl<'a> MediaHints<'a> {
    pub fn mime(mime: Option<&'a str>) -> Self { Self { mime, audio: false } }
    pub fn audio() -> Self { Self { mime: None, audio: true } }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    overrides: MediaOverrides,
}

impl Classifier {
    pub fn new(overrides: MediaOverrides) -> Self { Self { overrides } }

    /// First matching rule wins. Never fails; an empty URL is `Unknown`.
    pub fn classify(&self, url: &str, hints: &MediaHints<'_>) -> MediaKind {
        let url = url.trim();
        if url.is_empty() {
            return MediaKind::Unknown;
        }

        if let Some(kind) = self.overrides.kind_for_url(url) {
            return kind;
        }

        let ext = path_extension(url);
        if ext.is_none() && last_segment(url).is_some_and(is_ipfs_hash) {
            return MediaKind::VideoOrAnimation;
        }

        let lower = url.to_ascii_lowercase();
        let mime = hints
            .mime
            .map(str::to_ascii_lowercase)
            .or_else(|| data_uri_mime(url))
            .unwrap_or_default();
        let ext = ext.as_deref();

        if ext.is_some_and(|e| VIDEO_EXTS.contains(&e))
            || VIDEO_TOKENS.iter().any(|t| lower.contains(t) || mime.contains(t))
        {
            return MediaKind::Video;
        }

        if ext.is_some_and(|e| ANIMATION_EXTS.contains(&e))
            || lower.contains("animation")
            || mime.contains("animation")
            || ANIMATION_MIME_TOKENS.iter().any(|t| mime.contains(t))
        {
            return MediaKind::Animation;
        }

        if ext.is_some_and(|e| AUDIO_EXTS.contains(&e)) || mime.contains("audio") {
            return MediaKind::Audio;
        }

        if hints.audio { MediaKind::Audio } else { MediaKind::Image }
    }
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) if !u.cannot_be_a_base() => u.path().to_string(),
        _ => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

fn last_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

/// Lowercased extension of the URL's last path segment, if it has one.
pub(crate) fn path_extension(url: &str) -> Option<String> {
    if strip_prefix_ci(url, "data:").is_some() {
        return None;
    }
    let path = url_path(url);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// `data:video/mp4;base64,...` -> `video/mp4`.
fn data_uri_mime(url: &str) -> Option<String> {
    let rest = strip_prefix_ci(url, "data:")?;
    let end = rest.find([';', ',']).unwrap_or(rest.len());
    Some(rest[..end].to_ascii_lowercase()).filter(|m| !m.is_empty())
}
