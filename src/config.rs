//! Runtime configuration loaded from `config.toml` with environment overrides.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::types::MediaKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub neynar: NeynarConfig,
    #[serde(default)]
    pub alchemy: AlchemyConfig,
    #[serde(default)]
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub overrides: OverrideConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeynarConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_neynar_base")]
    pub base_url: String,
    #[serde(default)]
    pub rate_limit_ms: Option<u64>,
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl Default for NeynarConfig {
    fn default() -> Self {
        Self { api_key: None, base_url: default_neynar_base(), rate_limit_ms: None, call_timeout_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlchemyConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_networks")]
    pub networks: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub rate_limit_ms: Option<u64>,
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl Default for AlchemyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            networks: default_networks(),
            max_pages: default_max_pages(),
            rate_limit_ms: None,
            call_timeout_ms: None,
        }
    }
}

/// Gateway hosts used to turn content-addressed references into HTTPS URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_ipfs_primary")]
    pub ipfs_primary: String,
    #[serde(default = "default_ipfs_fallbacks")]
    pub ipfs_fallbacks: Vec<String>,
    #[serde(default = "default_arweave_primary")]
    pub arweave_primary: String,
    #[serde(default = "default_arweave_fallbacks")]
    pub arweave_fallbacks: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ipfs_primary: default_ipfs_primary(),
            ipfs_fallbacks: default_ipfs_fallbacks(),
            arweave_primary: default_arweave_primary(),
            arweave_fallbacks: default_arweave_fallbacks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: i64,
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { search_ttl_secs: default_search_ttl(), listing_ttl_secs: default_listing_ttl() }
    }
}

/// How a record that only says "I make sound" (no audio URL) is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundOnlyPolicy {
    /// Flag the NFT as playable but leave it without an audio source.
    #[default]
    Playable,
    /// Flag it as playable and play the visual asset's soundtrack.
    UseVisual,
    /// Only a resolvable audio URL or a title override counts.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub sound_only: SoundOnlyPolicy,
    #[serde(default = "default_placeholder_base")]
    pub placeholder_base: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { sound_only: SoundOnlyPolicy::default(), placeholder_base: default_placeholder_base() }
    }
}

/// User-supplied entries merged over the built-in override tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideConfig {
    #[serde(default)]
    pub audio_titles: BTreeMap<String, String>,
    #[serde(default)]
    pub media_fragments: Vec<FragmentOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentOverride {
    pub fragment: String,
    pub kind: MediaKind,
}

impl Config {
    /// Default config location in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "tunecast", "tunecast").map(|p| p.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply env overrides.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut cfg = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub(crate) fn apply_env<F>(&mut self, get: F)
    where F: Fn(&str) -> Option<String> {
        let first = |names: &[&str]| names.iter().find_map(|n| get(n)).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(k) = first(&["TUNECAST_NEYNAR_API_KEY", "NEYNAR_API_KEY"]) { self.neynar.api_key = Some(k); }
        if let Some(k) = first(&["TUNECAST_ALCHEMY_API_KEY", "ALCHEMY_API_KEY"]) { self.alchemy.api_key = Some(k); }
        if let Some(v) = first(&["TUNECAST_SEARCH_TTL_SECS"]).and_then(|s| s.parse().ok()) { self.cache.search_ttl_secs = v; }
        if let Some(v) = first(&["TUNECAST_LISTING_TTL_SECS"]).and_then(|s| s.parse().ok()) { self.cache.listing_ttl_secs = v; }
    }
}

fn default_neynar_base() -> String { "https://api.neynar.com".to_string() }
fn default_networks() -> Vec<String> { vec!["eth-mainnet".to_string(), "base-mainnet".to_string()] }
fn default_max_pages() -> usize { 5 }
fn default_ipfs_primary() -> String { "ipfs.io".to_string() }
fn default_ipfs_fallbacks() -> Vec<String> {
    ["cloudflare-ipfs.com", "gateway.pinata.cloud", "dweb.link", "nftstorage.link"].iter().map(|s| s.to_string()).collect()
}
fn default_arweave_primary() -> String { "arweave.net".to_string() }
fn default_arweave_fallbacks() -> Vec<String> {
    ["arweave.dev", "gateway.arweave.dev", "arweave.gateway.cloudflare.com"].iter().map(|s| s.to_string()).collect()
}
fn default_search_ttl() -> i64 { 60 * 60 }
fn default_listing_ttl() -> i64 { 15 * 60 }
fn default_placeholder_base() -> String { "https://avatar.vercel.sh".to_string() }
