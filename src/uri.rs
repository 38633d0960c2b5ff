//! Content reference normalization: IPFS, Arweave and plain URLs to one
//! fetchable HTTPS URL plus an ordered list of gateway fallbacks.

use url::{Position, Url};

use crate::config::GatewayConfig;
use crate::types::ResolvedUri;

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    gateways: GatewayConfig,
}

/// Normalize with the default gateway set.
pub fn normalize(uri: Option<&str>) -> ResolvedUri {
    Normalizer::default().normalize(uri)
}

impl Normalizer {
    pub fn new(gateways: GatewayConfig) -> Self { Self { gateways } }

    pub fn gateways(&self) -> &GatewayConfig { &self.gateways }

    /// Never fails: null, blank or unusable input gives an empty result.
    /// Rules are checked in order and the first match wins.
    pub fn normalize(&self, uri: Option<&str>) -> ResolvedUri {
        let Some(raw) = uri.map(str::trim).filter(|s| !s.is_empty()) else {
            return ResolvedUri::default();
        };

        if strip_prefix_ci(raw, "data:").is_some() {
            return unchanged(raw);
        }

        if let Some(id) = strip_prefix_ci(raw, "ar://") {
            let id = id.trim_start_matches('/');
            if id.is_empty() { return ResolvedUri::default(); }
            return self.arweave(id);
        }
        if is_arweave_id(raw) {
            return self.arweave(raw);
        }

        if let Some(resolved) = self.absolute_arweave(raw) {
            return resolved;
        }

        if let Some(rest) = strip_prefix_ci(raw, "ipfs://") {
            let rest = rest.trim_start_matches('/');
            let rest = strip_prefix_ci(rest, "ipfs/").unwrap_or(rest);
            if rest.is_empty() { return ResolvedUri::default(); }
            return self.ipfs(rest);
        }
        if let Some(idx) = raw.find("/ipfs/") {
            let rest = &raw[idx + "/ipfs/".len()..];
            if rest.split(['/', '?', '#']).next().is_some_and(is_ipfs_hash) {
                return self.ipfs(rest);
            }
        }
        if let Some(rest) = subdomain_gateway_path(raw) {
            return self.ipfs(&rest);
        }
        if !raw.contains("://") && raw.split('/').next().is_some_and(is_ipfs_hash) {
            return self.ipfs(raw);
        }

        if let Some(rest) = strip_prefix_ci(raw, "http://") {
            return unchanged(&format!("https://{}", rest));
        }

        if raw.starts_with('/') {
            return unchanged(&format!("{}{}", base(&self.gateways.ipfs_primary), raw));
        }

        unchanged(raw)
    }

    fn arweave(&self, id: &str) -> ResolvedUri {
        ResolvedUri {
            canonical_url: format!("{}/{}", base(&self.gateways.arweave_primary), id),
            fallback_urls: self.gateways.arweave_fallbacks.iter().map(|h| format!("{}/{}", base(h), id)).collect(),
        }
    }

    fn ipfs(&self, rest: &str) -> ResolvedUri {
        ResolvedUri {
            canonical_url: format!("{}/ipfs/{}", base(&self.gateways.ipfs_primary), rest),
            fallback_urls: self.gateways.ipfs_fallbacks.iter().map(|h| format!("{}/ipfs/{}", base(h), rest)).collect(),
        }
    }

    /// Absolute URLs already on the Arweave gateway are kept as they are.
    fn absolute_arweave(&self, raw: &str) -> Option<ResolvedUri> {
        let parsed = Url::parse(raw).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let primary = host_of(&self.gateways.arweave_primary);
        if host != primary && !host.ends_with(&format!(".{}", primary)) {
            return None;
        }
        let rest = parsed[Position::BeforePath..].trim_start_matches('/');
        let first = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let fallback_urls = if is_arweave_id(first) {
            self.gateways.arweave_fallbacks.iter().map(|h| format!("{}/{}", base(h), rest)).collect()
        } else {
            Vec::new()
        };
        Some(ResolvedUri { canonical_url: raw.to_string(), fallback_urls })
    }
}

fn unchanged(s: &str) -> ResolvedUri {
    ResolvedUri { canonical_url: s.to_string(), fallback_urls: Vec::new() }
}

/// Gateway entries are host names; a full origin is accepted too.
fn base(host: &str) -> String {
    let h = host.trim().trim_end_matches('/');
    if h.contains("://") { h.to_string() } else { format!("https://{}", h) }
}

fn host_of(host: &str) -> String {
    let h = host.trim().trim_end_matches('/');
    h.split_once("://").map(|(_, rest)| rest).unwrap_or(h).to_ascii_lowercase()
}

pub(crate) fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// `Qm` + 44 base58-ish chars, or a CIDv1 starting with `bafy`.
pub fn is_ipfs_hash(s: &str) -> bool {
    if let Some(tail) = s.strip_prefix("Qm") {
        return tail.len() == 44 && tail.chars().all(|c| c.is_ascii_alphanumeric() && c != '0');
    }
    if let Some(tail) = s.strip_prefix("bafy") {
        return tail.len() >= 44 && tail.chars().all(|c| c.is_ascii_alphanumeric());
    }
    false
}

/// 43 characters from the base64url alphabet.
pub fn is_arweave_id(s: &str) -> bool {
    s.len() == 43 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `https://<cid>.ipfs.<gateway>/path` -> `<cid>/path`.
fn subdomain_gateway_path(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    let (cid, gateway) = host.split_once(".ipfs.")?;
    if gateway.is_empty() || !is_ipfs_hash(cid) { return None; }
    let rest = parsed[Position::BeforePath..].trim_start_matches('/');
    Some(if rest.is_empty() { cid.to_string() } else { format!("{}/{}", cid, rest) })
}
