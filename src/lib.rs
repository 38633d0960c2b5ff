pub mod classify;
pub mod config;
pub mod extract;
pub mod mapping;
pub mod overrides;
pub mod playback;
pub mod probe;
pub mod providers;
pub mod storage;
pub mod types;
pub mod uri;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::classify::{Classifier, MediaHints};
    pub use crate::config::{Config, SoundOnlyPolicy};
    pub use crate::extract::Extractor;
    pub use crate::playback::{MediaEvent, MediaHost, PlayOutcome, PlaybackCoordinator, PlaybackPhase, PlaybackState};
    pub use crate::providers::{NftPage, NftSource, ProfileSource};
    pub use crate::types::{MediaKind, NftKey, NormalizedNft, RawMetadata, RawNft, ResolvedAsset, ResolvedUri};
    pub use crate::uri::Normalizer;
    pub use crate::{AudioCollection, Tunecast, UserProfile};
}

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::Extractor;
use crate::providers::{AlchemyClient, NeynarClient, NftSource, ProfileSource};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{NormalizedNft, RawNft};

const SUGGEST_MIN_CHARS: usize = 2;
const SUGGEST_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub fid: u64,
    pub username: String,
    pub display_name: String,
    pub pfp_url: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub bio: String,
    pub verified_addresses: Vec<String>,
    pub custody_address: Option<String>,
}

impl UserProfile {
    /// Verified addresses then custody, lowercased and de-duplicated.
    pub fn owner_addresses(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.verified_addresses
            .iter()
            .chain(self.custody_address.iter())
            .map(|a| a.trim().to_ascii_lowercase())
            .filter(|a| !a.is_empty() && seen.insert(a.clone()))
            .collect()
    }
}

/// Result of a full lookup: the user, the NFTs kept, and how many were scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCollection {
    pub profile: UserProfile,
    pub nfts: Vec<NormalizedNft>,
    pub owners: Vec<String>,
    pub scanned: usize,
}

/// Async library entry point. Owns the upstream sources, the response cache
/// and the extractor.
pub struct Tunecast {
    profiles: Arc<dyn ProfileSource>,
    nfts: Arc<dyn NftSource>,
    cache: Arc<dyn Storage>,
    extractor: Extractor,
    max_pages: usize,
    // Caching TTLs (seconds)
    search_ttl_secs: i64,
    listing_ttl_secs: i64,
}

impl Tunecast {
    /// Build HTTP clients from config. No network traffic happens until the first lookup.
    pub fn connect(config: &Config) -> Result<Self> {
        let profiles = NeynarClient::from_config(&config.neynar)?;
        let nfts = AlchemyClient::from_config(&config.alchemy)?;
        Ok(Self::with_sources(config, Arc::new(profiles), Arc::new(nfts), Arc::new(MemoryStorage::new())))
    }

    pub fn with_sources(
        config: &Config,
        profiles: Arc<dyn ProfileSource>,
        nfts: Arc<dyn NftSource>,
        cache: Arc<dyn Storage>,
    ) -> Self {
        Self {
            profiles,
            nfts,
            cache,
            extractor: Extractor::from_config(config),
            max_pages: config.alchemy.max_pages.max(1),
            search_ttl_secs: config.cache.search_ttl_secs,
            listing_ttl_secs: config.cache.listing_ttl_secs,
        }
    }

    pub fn extractor(&self) -> &Extractor { &self.extractor }

    /// User search with caching per source and normalized query.
    pub async fn search_users(&self, query: &str, refresh: bool) -> Result<Vec<UserProfile>> {
        let norm = norm_query(query);
        let now = current_epoch();
        let key = format!("{}|search|{}", self.profiles.name(), norm);

        if !refresh {
            if let Some(payload) = self.cache.get_cache(&key, now).await.ok().flatten() {
                if let Ok(users) = serde_json::from_str::<Vec<UserProfile>>(&payload) {
                    debug!(%key, "cache hit");
                    return Ok(users);
                }
            }
        }

        let users = self.profiles.search_users(query.trim()).await?;
        let payload = serde_json::to_string(&users)?;
        self.store(&key, &payload, now, self.search_ttl_secs).await;
        Ok(users)
    }

    /// Type-ahead suggestions: nothing below two characters, at most five users.
    pub async fn suggest_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        if query.trim().chars().count() < SUGGEST_MIN_CHARS {
            return Ok(Vec::new());
        }
        let mut users = self.search_users(query, false).await?;
        users.truncate(SUGGEST_LIMIT);
        Ok(users)
    }

    /// Exact, case-insensitive username match among the search results.
    pub async fn lookup_user(&self, username: &str, refresh: bool) -> Result<Option<UserProfile>> {
        let wanted = username.trim().trim_start_matches('@');
        if wanted.is_empty() {
            return Ok(None);
        }
        let users = self.search_users(wanted, refresh).await?;
        Ok(users.into_iter().find(|u| u.username.eq_ignore_ascii_case(wanted)))
    }

    /// Every raw record one owner holds on one network, following page keys
    /// up to the configured page cap. Cached per (source, network, owner).
    pub async fn list_owned(&self, owner: &str, network: &str, refresh: bool) -> Result<Vec<RawNft>> {
        let now = current_epoch();
        let key = format!("{}|{}|{}", self.nfts.name(), network, owner);

        if !refresh {
            if let Some(payload) = self.cache.get_cache(&key, now).await.ok().flatten() {
                if let Ok(list) = serde_json::from_str::<Vec<RawNft>>(&payload) {
                    debug!(%key, "cache hit");
                    return Ok(list);
                }
            }
        }

        let mut all = Vec::new();
        let mut page_key: Option<String> = None;
        for fetched in 1..=self.max_pages {
            let page = self.nfts.list_nfts(owner, network, page_key.as_deref()).await?;
            all.extend(page.nfts);
            match page.next_page {
                Some(next) if fetched == self.max_pages => {
                    warn!(owner, network, max_pages = self.max_pages, next = %next, "listing truncated at max_pages");
                }
                Some(next) => page_key = Some(next),
                None => break,
            }
        }

        let payload = serde_json::to_string(&all)?;
        self.store(&key, &payload, now, self.listing_ttl_secs).await;
        Ok(all)
    }

    /// Normalized NFTs across every owner address and network, de-duplicated
    /// by key. A failing listing is logged and skipped.
    pub async fn collect_nfts(&self, profile: &UserProfile, refresh: bool) -> Result<(Vec<NormalizedNft>, usize)> {
        let owners = profile.owner_addresses();
        let networks = self.nfts.networks();
        let pairs: Vec<(&str, &str)> = owners
            .iter()
            .flat_map(|o| networks.iter().map(move |n| (o.as_str(), n.as_str())))
            .collect();

        let results = join_all(pairs.iter().map(|(o, n)| self.list_owned(o, n, refresh))).await;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut scanned = 0;
        for ((owner, network), res) in pairs.iter().zip(results) {
            let list = match res {
                Ok(list) => list,
                Err(e) => {
                    warn!(owner, network, error = %e, "listing failed, skipping");
                    continue;
                }
            };
            scanned += list.len();
            for raw in &list {
                let Some(nft) = self.extractor.extract(raw) else { continue };
                if seen.insert(nft.key.clone()) {
                    out.push(nft);
                }
            }
        }
        Ok((out, scanned))
    }

    /// Resolve `username` and gather its NFTs. Only playable-audio NFTs are
    /// kept unless `include_all`. `Ok(None)` for an unknown user.
    pub async fn audio_collection(&self, username: &str, include_all: bool, refresh: bool) -> Result<Option<AudioCollection>> {
        let Some(profile) = self.lookup_user(username, refresh).await? else {
            info!(username, "user not found");
            return Ok(None);
        };
        let owners = profile.owner_addresses();
        info!(username = %profile.username, fid = profile.fid, owners = owners.len(), "collecting NFTs");
        let (mut nfts, scanned) = self.collect_nfts(&profile, refresh).await?;
        if !include_all {
            nfts.retain(|n| n.has_playable_audio);
        }
        info!(username = %profile.username, scanned, kept = nfts.len(), "lookup done");
        Ok(Some(AudioCollection { profile, nfts, owners, scanned }))
    }

    /// Drop cached responses whose key starts with `prefix` (all when `None`).
    pub async fn clear_cache_prefix(&self, prefix: Option<&str>) -> Result<u64> {
        self.cache.clear_cache_prefix(prefix).await
    }

    pub async fn purge_expired_cache(&self) -> Result<u64> {
        self.cache.purge_expired(current_epoch()).await
    }

    // Expired entries are swept on every write.
    async fn store(&self, key: &str, payload: &str, now: i64, ttl_secs: i64) {
        match self.cache.purge_expired(now).await {
            Ok(n) if n > 0 => debug!(purged = n, "expired cache entries dropped"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cache purge failed"),
        }
        let _ = self.cache.put_cache(key, payload, now + ttl_secs).await;
    }
}

fn norm_query(q: &str) -> String {
    let trimmed = q.trim().to_ascii_lowercase();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_space = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !last_space { out.push(' '); last_space = true; }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

fn current_epoch() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}
