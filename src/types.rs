use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of an NFT: contract address (lowercased) plus token id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NftKey {
    pub contract: String,
    pub token_id: String,
}

impl NftKey {
    pub fn new(contract: &str, token_id: &str) -> Self {
        Self { contract: contract.trim().to_ascii_lowercase(), token_id: token_id.trim().to_string() }
    }
}

impl std::fmt::Display for NftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contract, self.token_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Animation,
    Audio,
    /// No reliable signal; the renderer should try a video tag and an animation tag.
    VideoOrAnimation,
    Unknown,
}

impl MediaKind {
    pub fn is_video(self) -> bool { matches!(self, MediaKind::Video | MediaKind::VideoOrAnimation) }
    pub fn is_animation(self) -> bool { matches!(self, MediaKind::Animation | MediaKind::VideoOrAnimation) }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Audio => "audio",
            MediaKind::VideoOrAnimation => "video_or_animation",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "animation" => Ok(Self::Animation),
            "audio" => Ok(Self::Audio),
            "video_or_animation" | "both" => Ok(Self::VideoOrAnimation),
            "unknown" => Ok(Self::Unknown),
            other => Err(anyhow::anyhow!("unknown media kind `{}`", other)),
        }
    }
}

/// Output of the URI normalizer. An empty `canonical_url` means "no asset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUri {
    pub canonical_url: String,
    pub fallback_urls: Vec<String>,
}

impl ResolvedUri {
    pub fn is_empty(&self) -> bool { self.canonical_url.is_empty() }

    /// Canonical URL followed by every fallback, in retry order.
    pub fn sources(&self) -> Vec<String> {
        if self.is_empty() { return Vec::new(); }
        std::iter::once(self.canonical_url.clone()).chain(self.fallback_urls.iter().cloned()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAsset {
    pub canonical_url: String,
    pub fallback_urls: Vec<String>,
    pub kind: MediaKind,
}

impl ResolvedAsset {
    pub fn from_uri(uri: ResolvedUri, kind: MediaKind) -> Self {
        Self { canonical_url: uri.canonical_url, fallback_urls: uri.fallback_urls, kind }
    }

    pub fn sources(&self) -> Vec<String> {
        std::iter::once(self.canonical_url.clone()).chain(self.fallback_urls.iter().cloned()).collect()
    }
}

/// Loosely-typed metadata blob. Every lookup is optional and never panics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMetadata(pub Value);

impl RawMetadata {
    pub fn new(value: Value) -> Self {
        // Some marketplaces ship metadata as a JSON string.
        match value {
            Value::String(s) => Self(serde_json::from_str(&s).unwrap_or(Value::Null)),
            other => Self(other),
        }
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> { value_at(&self.0, path) }

    pub fn str_at(&self, path: &[&str]) -> Option<&str> { self.get(path).and_then(non_empty_str) }

    pub fn uri_at(&self, path: &[&str]) -> Option<String> { self.get(path).and_then(uri_of) }

    pub fn bool_at(&self, path: &[&str]) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn array_at(&self, path: &[&str]) -> &[Value] {
        self.get(path).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub(crate) fn value_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |v, seg| v.get(*seg))
}

pub(crate) fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// A field that names an asset may be a plain string or an object carrying one.
pub(crate) fn uri_of(v: &Value) -> Option<String> {
    match v {
        Value::String(_) => non_empty_str(v).map(str::to_string),
        Value::Object(_) => ["uri", "url", "src", "gateway"]
            .iter()
            .find_map(|k| v.get(*k).and_then(non_empty_str))
            .map(str::to_string),
        _ => None,
    }
}

/// One record as returned by the NFT listing API (v2 or v3 shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawNft(pub Value);

impl RawNft {
    pub fn contract_address(&self) -> Option<&str> {
        value_at(&self.0, &["contract", "address"]).and_then(non_empty_str)
    }

    pub fn token_id(&self) -> Option<String> {
        let raw = value_at(&self.0, &["tokenId"])
            .or_else(|| value_at(&self.0, &["id", "tokenId"]))?;
        let text = match raw {
            Value::Number(n) => n.to_string(),
            other => non_empty_str(other)?.to_string(),
        };
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            if let Some(n) = hex_to_decimal(hex) { return Some(n); }
        }
        Some(text)
    }

    pub fn key(&self) -> Option<NftKey> {
        Some(NftKey::new(self.contract_address()?, &self.token_id()?))
    }

    pub fn title(&self) -> Option<&str> {
        ["title", "name"].iter().find_map(|k| self.0.get(*k).and_then(non_empty_str))
    }

    pub fn description(&self) -> Option<&str> { self.0.get("description").and_then(non_empty_str) }

    pub fn collection_name(&self) -> Option<&str> {
        value_at(&self.0, &["contract", "name"])
            .or_else(|| value_at(&self.0, &["contract", "openSeaMetadata", "collectionName"]))
            .or_else(|| value_at(&self.0, &["collection", "name"]))
            .and_then(non_empty_str)
    }

    pub fn metadata(&self) -> RawMetadata {
        let v = self.0.get("metadata")
            .filter(|v| !v.is_null())
            .or_else(|| value_at(&self.0, &["raw", "metadata"]))
            .cloned()
            .unwrap_or(Value::Null);
        RawMetadata::new(v)
    }

    pub fn media(&self) -> &[Value] {
        self.0.get("media").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cached image copy served by the listing API itself (v3 only).
    pub fn hosted_image(&self) -> Option<String> {
        value_at(&self.0, &["image", "cachedUrl"])
            .or_else(|| value_at(&self.0, &["image", "originalUrl"]))
            .and_then(non_empty_str)
            .map(str::to_string)
    }
}

/// Hex digits to a decimal string of any width (ERC-1155 ids use all 256 bits).
fn hex_to_decimal(hex: &str) -> Option<String> {
    const BASE: u64 = 1_000_000_000;
    if hex.is_empty() { return None; }
    // little-endian limbs of nine decimal digits
    let mut limbs: Vec<u64> = vec![0];
    for c in hex.chars() {
        let mut carry = u64::from(c.to_digit(16)?);
        for limb in limbs.iter_mut() {
            let v = *limb * 16 + carry;
            *limb = v % BASE;
            carry = v / BASE;
        }
        while carry > 0 {
            limbs.push(carry % BASE);
            carry /= BASE;
        }
    }
    let mut out = limbs.last().copied().unwrap_or_default().to_string();
    for limb in limbs.iter().rev().skip(1) {
        out.push_str(&format!("{:09}", limb));
    }
    Some(out)
}

/// The normalized, immutable view of one NFT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNft {
    pub key: NftKey,
    pub name: String,
    pub description: Option<String>,
    pub image_asset: Option<ResolvedAsset>,
    pub animation_asset: Option<ResolvedAsset>,
    pub audio_asset: Option<ResolvedAsset>,
    pub has_playable_audio: bool,
    pub collection_name: String,
    pub raw_metadata: RawMetadata,
}

impl NormalizedNft {
    /// What the card shows: animation when present, otherwise the image.
    pub fn visual(&self) -> Option<&ResolvedAsset> {
        self.animation_asset.as_ref().or(self.image_asset.as_ref())
    }

    pub fn is_video(&self) -> bool { self.visual().is_some_and(|a| a.kind.is_video()) }
    pub fn is_animation(&self) -> bool { self.visual().is_some_and(|a| a.kind.is_animation()) }
}
