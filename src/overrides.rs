//! Small override tables for assets whose metadata cannot be trusted.
//!
//! The classifier checks fragments before its general rules; the extractor
//! checks titles only after every audio field came up empty.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::config::{FragmentOverride, OverrideConfig};
use crate::types::MediaKind;

const BUILTIN: &str = include_str!("../data/overrides.toml");

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaOverrides {
    /// Exact display title -> Arweave id of the audio file.
    #[serde(default)]
    pub audio_titles: BTreeMap<String, String>,
    /// URL substring or content-hash fragment -> forced media kind.
    #[serde(default)]
    pub media_fragments: Vec<FragmentOverride>,
}

impl MediaOverrides {
    pub fn builtin() -> Self {
        toml::from_str(BUILTIN).unwrap_or_else(|e| {
            warn!("built-in override table is invalid: {}", e);
            Self::default()
        })
    }

    /// Built-in tables with the user's entries layered on top.
    pub fn from_config(cfg: &OverrideConfig) -> Self {
        let mut out = Self::builtin();
        out.merge(cfg);
        out
    }

    pub fn merge(&mut self, cfg: &OverrideConfig) {
        for (title, id) in &cfg.audio_titles {
            self.audio_titles.insert(title.clone(), id.clone());
        }
        for f in &cfg.media_fragments {
            self.media_fragments.retain(|e| e.fragment != f.fragment);
            self.media_fragments.push(f.clone());
        }
    }

    pub fn audio_id_for_title(&self, title: &str) -> Option<&str> {
        self.audio_titles.get(title).map(String::as_str)
    }

    pub fn kind_for_url(&self, url: &str) -> Option<MediaKind> {
        self.media_fragments
            .iter()
            .filter(|f| !f.fragment.is_empty())
            .find(|f| url.contains(f.fragment.as_str()))
            .map(|f| f.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
[audio_titles]
"Test Track #1" = "bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U"

[[media_fragments]]
fragment = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"
kind = "video_or_animation"
"#;

    fn fixture() -> MediaOverrides { toml::from_str(FIXTURE).unwrap() }

    #[test]
    fn builtin_table_parses_and_ships_empty() {
        let parsed: MediaOverrides = toml::from_str(BUILTIN).unwrap();
        assert!(parsed.audio_titles.is_empty());
        assert!(parsed.media_fragments.is_empty());
        assert_eq!(MediaOverrides::builtin(), parsed);
    }

    #[test]
    fn title_lookup_is_exact() {
        let o = fixture();
        assert!(o.audio_id_for_title("Test Track #1").is_some());
        assert!(o.audio_id_for_title("test track #1").is_none());
        assert!(o.audio_id_for_title("Test Track #1 ").is_none());
        assert!(MediaOverrides::builtin().audio_id_for_title("Test Track #1").is_none());
    }

    #[test]
    fn user_entries_replace_existing_fragments() {
        let mut o = fixture();
        let cfg = OverrideConfig {
            audio_titles: BTreeMap::from([("Extra".to_string(), "x".repeat(43))]),
            media_fragments: vec![FragmentOverride {
                fragment: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
                kind: MediaKind::Video,
            }],
        };
        o.merge(&cfg);
        assert!(o.audio_id_for_title("Extra").is_some());
        assert!(o.audio_id_for_title("Test Track #1").is_some());
        assert_eq!(o.media_fragments.len(), 1);
        assert_eq!(
            o.kind_for_url("https://ipfs.io/ipfs/QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"),
            Some(MediaKind::Video)
        );
        assert_eq!(o.kind_for_url("https://example.com/a.png"), None);
        assert_eq!(MediaOverrides::from_config(&cfg).media_fragments.len(), 1);
    }
}
