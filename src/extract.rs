//! Turn one heterogeneous NFT metadata record into a [`NormalizedNft`].
//!
//! Marketplaces disagree on where media lives, so each asset is looked up
//! through an ordered chain of fields. The order is the contract: when
//! several fields are populated, the earlier one wins.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::classify::{path_extension, Classifier, MediaHints, AUDIO_EXTS};
use crate::config::{Config, ExtractConfig, SoundOnlyPolicy};
use crate::overrides::MediaOverrides;
use crate::types::{non_empty_str, uri_of, MediaKind, NftKey, NormalizedNft, RawMetadata, RawNft, ResolvedAsset};
use crate::uri::Normalizer;

pub const UNKNOWN_COLLECTION: &str = "Unknown Collection";

const AUDIO_FIELDS: &[&[&str]] = &[
    &["animation_url"],
    &["audio"],
    &["audio_url"],
    &["music_url"],
    &["losslessAudio"],
    &["properties", "audio"],
    &["properties", "audio_url"],
    &["properties", "audio_file"],
    &["properties", "soundContent", "url"],
];

const IMAGE_FIELDS: &[&[&str]] = &[
    &["image"],
    &["image_url"],
    &["artwork", "uri"],
    &["artwork", "url"],
    &["properties", "image"],
    &["properties", "visual", "url"],
];

const ANIMATION_FIELDS: &[&[&str]] = &[
    &["animation_url"],
    &["animation"],
    &["video"],
    &["properties", "animation_url"],
    &["properties", "video"],
];

/// File-name extensions accepted when a `files[]` entry has no type.
const AUDIO_FILE_EXTS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac"];

/// Listing-level fields that travel alongside the metadata blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingContext<'a> {
    pub collection: Option<&'a str>,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub media: &'a [Value],
    pub hosted_image: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct Candidate {
    url: String,
    mime: Option<String>,
}

impl Candidate {
    fn plain(url: String) -> Self { Self { url, mime: None } }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    normalizer: Normalizer,
    classifier: Classifier,
    overrides: MediaOverrides,
    settings: ExtractConfig,
}

impl Default for Extractor {
    fn default() -> Self { Self::from_config(&Config::default()) }
}

impl Extractor {
    pub fn new(normalizer: Normalizer, overrides: MediaOverrides, settings: ExtractConfig) -> Self {
        let classifier = Classifier::new(overrides.clone());
        Self { normalizer, classifier, overrides, settings }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            Normalizer::new(cfg.gateways.clone()),
            MediaOverrides::from_config(&cfg.overrides),
            cfg.extract.clone(),
        )
    }

    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }
    pub fn classifier(&self) -> &Classifier { &self.classifier }

    /// `None` only when the record lacks a contract address or token id.
    pub fn extract(&self, raw: &RawNft) -> Option<NormalizedNft> {
        let Some(key) = raw.key() else {
            debug!("skipping listing record without contract/token id");
            return None;
        };
        let hosted = raw.hosted_image();
        let ctx = ListingContext {
            collection: raw.collection_name(),
            title: raw.title(),
            description: raw.description(),
            media: raw.media(),
            hosted_image: hosted.as_deref(),
        };
        Some(self.extract_metadata(key, &raw.metadata(), &ctx))
    }

    /// Pure and total: absent fields degrade to defaults.
    pub fn extract_metadata(&self, key: NftKey, md: &RawMetadata, ctx: &ListingContext<'_>) -> NormalizedNft {
        let name = md
            .str_at(&["name"])
            .or(ctx.title)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", key.token_id));
        let description = md.str_at(&["description"]).or(ctx.description).map(str::to_string);
        let collection_name = ctx
            .collection
            .or_else(|| md.str_at(&["collection", "name"]))
            .or_else(|| md.str_at(&["collection"]))
            .unwrap_or(UNKNOWN_COLLECTION)
            .to_string();

        let image_asset = self.image_candidate(md, ctx).map(|c| self.resolve(c, false));
        let animation_asset = self.animation_candidate(md, ctx).map(|c| self.resolve(c, false));

        let mut audio_asset = self.audio_candidate(md, ctx.media).map(|c| {
            let mut asset = self.resolve(c, true);
            asset.kind = if asset.kind == MediaKind::Video { MediaKind::Video } else { MediaKind::Audio };
            asset
        });

        let mut has_playable_audio = audio_asset.is_some();

        if audio_asset.is_none() {
            if let Some(id) = self.overrides.audio_id_for_title(&name) {
                let uri = self.normalizer.normalize(Some(id));
                if !uri.is_empty() {
                    audio_asset = Some(ResolvedAsset::from_uri(uri, MediaKind::Audio));
                }
                has_playable_audio = true;
            }
        }

        if !has_playable_audio && has_sound_signal(md) {
            match self.settings.sound_only {
                SoundOnlyPolicy::Playable => has_playable_audio = true,
                SoundOnlyPolicy::UseVisual => {
                    audio_asset = animation_asset.clone().or_else(|| image_asset.clone());
                    has_playable_audio = true;
                }
                SoundOnlyPolicy::Ignore => {}
            }
        }

        NormalizedNft {
            key,
            name,
            description,
            image_asset,
            animation_asset,
            audio_asset,
            has_playable_audio,
            collection_name,
            raw_metadata: md.clone(),
        }
    }

    /// Generated image for cards without artwork, keyed by name.
    pub fn placeholder_image_url(&self, nft: &NormalizedNft) -> String {
        let base = self.settings.placeholder_base.trim_end_matches('/');
        match Url::parse(base) {
            Ok(mut u) if !u.cannot_be_a_base() => {
                if let Ok(mut segs) = u.path_segments_mut() {
                    segs.pop_if_empty().push(&nft.name);
                }
                u.to_string()
            }
            _ => format!("{}/{}", base, nft.name),
        }
    }

    fn resolve(&self, c: Candidate, audio: bool) -> ResolvedAsset {
        let uri = self.normalizer.normalize(Some(&c.url));
        let hints = MediaHints { mime: c.mime.as_deref(), audio };
        let kind = self.classifier.classify(&uri.canonical_url, &hints);
        ResolvedAsset::from_uri(uri, kind)
    }

    fn resolvable(&self, url: &str) -> bool { !self.normalizer.normalize(Some(url)).is_empty() }

    fn audio_candidate(&self, md: &RawMetadata, media: &[Value]) -> Option<Candidate> {
        for path in AUDIO_FIELDS {
            let Some(url) = md.uri_at(path) else { continue };
            if !self.resolvable(&url) { continue; }
            // A still image or an HTML/GIF animation cannot carry sound.
            if path[0] == "animation_url" && self.is_silent_visual(&url) { continue; }
            return Some(Candidate::plain(url));
        }

        let files = md.array_at(&["properties", "files"]);
        let from_files = files.iter().find_map(|f| {
            let mime = file_mime(f);
            let typed = mime.as_deref().is_some_and(|m| m.contains("audio"));
            let named = ["uri", "url", "name"]
                .iter()
                .filter_map(|k| f.get(*k).and_then(non_empty_str))
                .any(has_audio_file_ext);
            if !(typed || named) { return None; }
            uri_of(f).filter(|u| self.resolvable(u)).map(|url| Candidate { url, mime })
        });
        if from_files.is_some() { return from_files; }

        media.iter().find_map(|m| {
            let format = media_format(m);
            let audio = format.as_deref().is_some_and(|f| f.contains("audio") || AUDIO_EXTS.contains(&f));
            if !audio { return None; }
            media_url(m).filter(|u| self.resolvable(u)).map(|url| Candidate { url, mime: format })
        })
    }

    fn image_candidate(&self, md: &RawMetadata, ctx: &ListingContext<'_>) -> Option<Candidate> {
        for path in IMAGE_FIELDS {
            if let Some(url) = md.uri_at(path).filter(|u| self.resolvable(u)) {
                let mime = (path[0] == "artwork")
                    .then(|| md.str_at(&["artwork", "mimeType"]).map(str::to_ascii_lowercase))
                    .flatten();
                return Some(Candidate { url, mime });
            }
        }
        if let Some(c) = ctx.media.iter().find_map(|m| {
            media_url(m).filter(|u| self.resolvable(u)).map(|url| Candidate { url, mime: media_format(m) })
        }) {
            return Some(c);
        }
        if let Some(first) = md.array_at(&["properties", "files"]).first() {
            if let Some(url) = uri_of(first).filter(|u| self.resolvable(u)) {
                return Some(Candidate { url, mime: file_mime(first) });
            }
        }
        ctx.hosted_image.filter(|u| self.resolvable(u)).map(|u| Candidate::plain(u.to_string()))
    }

    fn animation_candidate(&self, md: &RawMetadata, ctx: &ListingContext<'_>) -> Option<Candidate> {
        for path in ANIMATION_FIELDS {
            if let Some(url) = md.uri_at(path).filter(|u| self.resolvable(u)) {
                return Some(Candidate { url, mime: animation_mime(md) });
            }
        }
        ctx.media.iter().find_map(|m| {
            let format = media_format(m)?;
            let video = format.contains("video") || ["mp4", "webm", "mov", "m4v"].contains(&format.as_str());
            if !video { return None; }
            media_url(m).filter(|u| self.resolvable(u)).map(|url| Candidate { url, mime: Some(format) })
        })
    }

    fn is_silent_visual(&self, url: &str) -> bool {
        let uri = self.normalizer.normalize(Some(url));
        matches!(self.classifier.classify(&uri.canonical_url, &MediaHints::default()), MediaKind::Animation | MediaKind::Image)
            && path_extension(&uri.canonical_url).is_some()
    }
}

fn has_sound_signal(md: &RawMetadata) -> bool {
    md.str_at(&["properties", "category"]).is_some_and(|c| c.eq_ignore_ascii_case("audio"))
        || md.bool_at(&["properties", "sound"])
        || md.str_at(&["content", "mime"]).is_some_and(|m| m.to_ascii_lowercase().contains("audio"))
        || md.str_at(&["mime_type"]).is_some_and(|m| m.to_ascii_lowercase().contains("audio"))
}

fn has_audio_file_ext(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.split(['?', '#']).next().unwrap_or_default();
    AUDIO_FILE_EXTS.iter().any(|e| stem.ends_with(&format!(".{}", e)))
}

fn file_mime(f: &Value) -> Option<String> {
    ["type", "mimeType"].iter().find_map(|k| f.get(*k).and_then(non_empty_str)).map(str::to_ascii_lowercase)
}

fn media_format(m: &Value) -> Option<String> {
    ["format", "mimeType"].iter().find_map(|k| m.get(*k).and_then(non_empty_str)).map(str::to_ascii_lowercase)
}

fn media_url(m: &Value) -> Option<String> {
    ["gateway", "raw", "uri", "url"].iter().find_map(|k| m.get(*k).and_then(non_empty_str)).map(str::to_string)
}

fn animation_mime(md: &RawMetadata) -> Option<String> {
    md.str_at(&["animation_details", "format"])
        .or_else(|| md.str_at(&["content", "mime"]))
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(md: Value) -> NormalizedNft {
        Extractor::default().extract_metadata(NftKey::new("0xC0", "42"), &RawMetadata::new(md), &ListingContext::default())
    }

    #[test]
    fn sound_content_url_is_playable() {
        let nft = extract(json!({ "properties": { "soundContent": { "url": "https://x/a.mp3" } } }));
        assert!(nft.has_playable_audio);
        let audio = nft.audio_asset.unwrap();
        assert_eq!(audio.canonical_url, "https://x/a.mp3");
        assert_eq!(audio.kind, MediaKind::Audio);
    }

    #[test]
    fn sound_flag_without_url_is_playable_but_sourceless() {
        let nft = extract(json!({ "properties": { "sound": true }, "image": "https://x/cover.png" }));
        assert!(nft.has_playable_audio);
        assert!(nft.audio_asset.is_none());
    }

    #[test]
    fn sound_only_policy_variants() {
        let md = json!({ "properties": { "category": "audio" }, "animation_url": "https://x/loop.gif" });
        let mut cfg = Config::default();
        cfg.extract.sound_only = SoundOnlyPolicy::UseVisual;
        let nft = Extractor::from_config(&cfg)
            .extract_metadata(NftKey::new("0x1", "1"), &RawMetadata::new(md.clone()), &ListingContext::default());
        assert!(nft.has_playable_audio);
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/loop.gif");

        cfg.extract.sound_only = SoundOnlyPolicy::Ignore;
        let nft = Extractor::from_config(&cfg)
            .extract_metadata(NftKey::new("0x1", "1"), &RawMetadata::new(md), &ListingContext::default());
        assert!(!nft.has_playable_audio);
    }

    #[test]
    fn allow_listed_title_is_playable() {
        let mut cfg = Config::default();
        cfg.overrides
            .audio_titles
            .insert("Test Track #1".into(), "bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U".into());
        let ex = Extractor::from_config(&cfg);
        let nft = ex.extract_metadata(
            NftKey::new("0x1", "1"),
            &RawMetadata::new(json!({ "name": "Test Track #1", "image": "https://x/cover.png" })),
            &ListingContext::default(),
        );
        assert!(nft.has_playable_audio);
        assert_eq!(
            nft.audio_asset.unwrap().canonical_url,
            "https://arweave.net/bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U"
        );

        cfg.extract.sound_only = SoundOnlyPolicy::Ignore;
        let nft = Extractor::from_config(&cfg).extract_metadata(
            NftKey::new("0x1", "1"),
            &RawMetadata::new(json!({ "name": "Test Track #1" })),
            &ListingContext::default(),
        );
        assert!(nft.has_playable_audio);
    }

    #[test]
    fn titles_are_not_playable_without_a_configured_override() {
        let nft = extract(json!({ "name": "Mint Songs Genesis", "image": "https://x/cover.png" }));
        assert!(!nft.has_playable_audio);
        assert!(nft.audio_asset.is_none());
    }

    #[test]
    fn secondary_sound_signals_mark_playable() {
        let cases = [
            json!({ "image": "https://x/c.png", "properties": { "category": "Audio" } }),
            json!({ "image": "https://x/c.png", "properties": { "sound": true } }),
            json!({ "image": "https://x/c.png", "content": { "mime": "Audio/MPEG" } }),
            json!({ "image": "https://x/c.png", "mime_type": "audio/wav" }),
        ];
        for md in cases {
            let nft = extract(md.clone());
            assert!(nft.has_playable_audio, "signal {}", md);
            assert!(nft.audio_asset.is_none(), "signal {}", md);
        }

        let nft = extract(json!({ "content": { "mime": "image/png" }, "mime_type": "video/mp4" }));
        assert!(!nft.has_playable_audio);
    }

    #[test]
    fn properties_audio_fields_in_order() {
        let nft = extract(json!({ "properties": {
            "audio_url": "https://x/first.mp3",
            "audio_file": "https://x/second.mp3",
            "soundContent": { "url": "https://x/third.mp3" }
        } }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/first.mp3");

        let nft = extract(json!({ "properties": {
            "audio_file": "https://x/second.mp3",
            "soundContent": { "url": "https://x/third.mp3" }
        } }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/second.mp3");

        let nft = extract(json!({ "properties": { "soundContent": { "url": "https://x/third.mp3" } } }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/third.mp3");
    }

    #[test]
    fn earlier_fields_win() {
        let nft = extract(json!({
            "audio": "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
            "audio_url": "https://x/second.mp3",
            "properties": { "audio": "https://x/third.mp3" }
        }));
        let audio = nft.audio_asset.unwrap();
        assert_eq!(audio.canonical_url, "https://ipfs.io/ipfs/QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
        assert_eq!(audio.fallback_urls.len(), 4);

        let nft = extract(json!({ "music_url": "https://x/m.wav", "losslessAudio": "https://x/l.flac" }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/m.wav");
    }

    #[test]
    fn video_animation_url_doubles_as_audio() {
        let nft = extract(json!({ "animation_url": "https://x/clip.mp4", "image": "https://x/c.png" }));
        assert!(nft.has_playable_audio);
        assert_eq!(nft.audio_asset.as_ref().unwrap().kind, MediaKind::Video);
        assert!(nft.is_video());

        let nft = extract(json!({ "animation_url": "https://x/generative.html" }));
        assert!(!nft.has_playable_audio);
        assert!(nft.is_animation());
    }

    #[test]
    fn files_and_media_entries() {
        let nft = extract(json!({ "properties": { "files": [
            { "uri": "https://x/cover.png", "type": "image/png" },
            { "uri": "https://x/song", "type": "audio/mpeg" }
        ] } }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://x/song");
        assert_eq!(nft.image_asset.unwrap().canonical_url, "https://x/cover.png");

        let nft = extract(json!({ "properties": { "files": [{ "name": "Track.MP3", "url": "ar://bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U" }] } }));
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://arweave.net/bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U");

        let media = vec![json!({ "gateway": "https://g/x.png", "format": "png" }), json!({ "gateway": "https://g/a.wav", "format": "wav" })];
        let nft = Extractor::default().extract_metadata(
            NftKey::new("0x1", "1"),
            &RawMetadata::default(),
            &ListingContext { media: &media, ..ListingContext::default() },
        );
        assert_eq!(nft.audio_asset.unwrap().canonical_url, "https://g/a.wav");
        assert_eq!(nft.image_asset.unwrap().canonical_url, "https://g/x.png");
    }

    #[test]
    fn image_chain_order() {
        let nft = extract(json!({
            "artwork": { "uri": "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG", "mimeType": "video/mp4" },
            "properties": { "image": "https://x/p.png" }
        }));
        let image = nft.image_asset.unwrap();
        assert!(image.canonical_url.starts_with("https://ipfs.io/ipfs/"));
        assert_eq!(image.kind, MediaKind::VideoOrAnimation);

        let nft = extract(json!({ "properties": { "visual": { "url": "http://x/v.jpg" } } }));
        assert_eq!(nft.image_asset.unwrap().canonical_url, "https://x/v.jpg");
    }

    #[test]
    fn empty_record_degrades_to_defaults() {
        let nft = extract(json!(null));
        assert_eq!(nft.name, "#42");
        assert_eq!(nft.collection_name, UNKNOWN_COLLECTION);
        assert!(nft.image_asset.is_none());
        assert!(nft.visual().is_none());
        assert!(!nft.has_playable_audio);
        assert_eq!(Extractor::default().placeholder_image_url(&nft), "https://avatar.vercel.sh/%2342");
    }

    #[test]
    fn extract_reads_listing_record_and_is_idempotent() {
        let raw = RawNft(json!({
            "contract": { "address": "0xAbC", "name": "Beats" },
            "tokenId": "3",
            "title": "Beat Three",
            "description": "third",
            "metadata": { "audio_url": "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG/3.mp3" },
            "media": [{ "gateway": "https://g/3.png" }]
        }));
        let ex = Extractor::default();
        let nft = ex.extract(&raw).unwrap();
        assert_eq!(nft.key, NftKey::new("0xabc", "3"));
        assert_eq!(nft.name, "Beat Three");
        assert_eq!(nft.collection_name, "Beats");
        assert_eq!(nft.description.as_deref(), Some("third"));
        assert_eq!(nft.image_asset.as_ref().unwrap().canonical_url, "https://g/3.png");
        assert!(nft.has_playable_audio);
        assert_eq!(ex.extract(&raw).unwrap(), nft);

        assert!(ex.extract(&RawNft(json!({ "tokenId": "1" }))).is_none());
    }
}
