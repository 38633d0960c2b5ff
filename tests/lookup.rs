use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;

use tunecast::config::Config;
use tunecast::providers::{NftPage, NftSource, ProfileSource};
use tunecast::storage::{MemoryStorage, Storage};
use tunecast::types::RawNft;
use tunecast::{Tunecast, UserProfile};

struct FakeProfiles {
    users: Vec<UserProfile>,
    calls: AtomicUsize,
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    fn name(&self) -> &str { "fake-profiles" }

    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let q = query.to_ascii_lowercase();
        Ok(self.users.iter().filter(|u| u.username.contains(&q)).cloned().collect())
    }
}

#[derive(Default)]
struct FakeNfts {
    /// owner -> pages, in order
    pages: HashMap<String, Vec<Vec<RawNft>>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl NftSource for FakeNfts {
    fn name(&self) -> &str { "fake-nfts" }

    fn networks(&self) -> Vec<String> { vec!["eth-mainnet".into()] }

    async fn list_nfts(&self, owner: &str, _network: &str, page_key: Option<&str>) -> Result<NftPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(owner) {
            bail!("upstream 500 for {}", owner);
        }
        let idx: usize = page_key.map(|p| p.trim_start_matches('p').parse().unwrap()).unwrap_or(0);
        let pages = self.pages.get(owner).cloned().unwrap_or_default();
        let nfts = pages.get(idx).cloned().unwrap_or_default();
        let next_page = if idx + 1 < pages.len() { Some(format!("p{}", idx + 1)) } else { None };
        Ok(NftPage { nfts, next_page })
    }
}

fn user(name: &str, verified: &[&str], custody: Option<&str>) -> UserProfile {
    UserProfile {
        fid: name.len() as u64,
        username: name.to_string(),
        display_name: name.to_string(),
        pfp_url: format!("https://avatar.vercel.sh/{}", name),
        follower_count: 0,
        following_count: 0,
        bio: String::new(),
        verified_addresses: verified.iter().map(|s| s.to_string()).collect(),
        custody_address: custody.map(str::to_string),
    }
}

fn song(contract: &str, token: &str, title: &str) -> RawNft {
    RawNft(json!({
        "contract": { "address": contract, "name": "Songs" },
        "tokenId": token,
        "raw": { "metadata": { "name": title, "animation_url": format!("https://cdn.example/{}.mp3", token) } }
    }))
}

fn picture(contract: &str, token: &str) -> RawNft {
    RawNft(json!({
        "contract": { "address": contract },
        "tokenId": token,
        "raw": { "metadata": { "name": "Pic", "image": "https://cdn.example/pic.png" } }
    }))
}

fn app_with(config: &Config, profiles: Arc<FakeProfiles>, nfts: Arc<FakeNfts>, cache: Arc<MemoryStorage>) -> Tunecast {
    Tunecast::with_sources(config, profiles, nfts, cache)
}

fn app(profiles: Arc<FakeProfiles>, nfts: Arc<FakeNfts>) -> Tunecast {
    app_with(&Config::default(), profiles, nfts, Arc::new(MemoryStorage::new()))
}

fn profiles(users: Vec<UserProfile>) -> Arc<FakeProfiles> {
    Arc::new(FakeProfiles { users, calls: AtomicUsize::new(0) })
}

#[tokio::test]
async fn search_is_served_from_cache_until_refresh() {
    let p = profiles(vec![user("dwr", &[], None)]);
    let app = app(p.clone(), Arc::new(FakeNfts::default()));

    assert_eq!(app.search_users("DWR", false).await.unwrap().len(), 1);
    assert_eq!(app.search_users("  dwr ", false).await.unwrap().len(), 1);
    assert_eq!(p.calls.load(Ordering::SeqCst), 1);

    app.search_users("dwr", true).await.unwrap();
    assert_eq!(p.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn suggestions_need_two_chars_and_cap_at_five() {
    let users = (0..7).map(|i| user(&format!("da{}", i), &[], None)).collect();
    let p = profiles(users);
    let app = app(p.clone(), Arc::new(FakeNfts::default()));

    assert!(app.suggest_users("d").await.unwrap().is_empty());
    assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.suggest_users("da").await.unwrap().len(), 5);
}

#[tokio::test]
async fn lookup_takes_exact_username_only() {
    let p = profiles(vec![user("dwr", &[], None), user("dwr.eth", &[], None)]);
    let app = app(p, Arc::new(FakeNfts::default()));

    assert_eq!(app.lookup_user("DWR", false).await.unwrap().unwrap().username, "dwr");
    assert_eq!(app.lookup_user("@dwr.eth", false).await.unwrap().unwrap().username, "dwr.eth");
    assert!(app.lookup_user("dw", false).await.unwrap().is_none());
    assert!(app.audio_collection("nobody", false, false).await.unwrap().is_none());
}

#[tokio::test]
async fn collection_dedupes_paginates_and_skips_failing_owners() {
    let p = profiles(vec![user("artist", &["0xAAA", "0xBAD", "0xBBB"], Some("0xaaa"))]);
    let mut nfts = FakeNfts::default();
    nfts.pages.insert("0xaaa".into(), vec![vec![song("0xC0", "1", "One"), picture("0xC0", "9")]]);
    nfts.pages.insert(
        "0xbbb".into(),
        vec![vec![song("0xc0", "0x1", "One again")], vec![song("0xC0", "2", "Two")]],
    );
    nfts.failing.insert("0xbad".into());
    let nfts = Arc::new(nfts);
    let app = app(p, nfts.clone());

    let c = app.audio_collection("artist", false, false).await.unwrap().unwrap();
    assert_eq!(c.owners, vec!["0xaaa", "0xbad", "0xbbb"]);
    assert_eq!(c.scanned, 4);
    let names: Vec<&str> = c.nfts.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two"]);
    assert!(c.nfts.iter().all(|n| n.has_playable_audio));

    let all = app.audio_collection("artist", true, false).await.unwrap().unwrap();
    assert_eq!(all.nfts.len(), 3);
}

#[tokio::test]
async fn listings_are_cached_per_owner() {
    let p = profiles(vec![user("solo", &["0x01"], None)]);
    let mut nfts = FakeNfts::default();
    nfts.pages.insert("0x01".into(), vec![vec![song("0xC0", "1", "One")], vec![song("0xC0", "2", "Two")]]);
    let nfts = Arc::new(nfts);
    let app = app(p, nfts.clone());

    assert_eq!(app.list_owned("0x01", "eth-mainnet", false).await.unwrap().len(), 2);
    assert_eq!(nfts.calls.load(Ordering::SeqCst), 2);
    app.list_owned("0x01", "eth-mainnet", false).await.unwrap();
    assert_eq!(nfts.calls.load(Ordering::SeqCst), 2);

    assert_eq!(app.clear_cache_prefix(Some("fake-nfts|")).await.unwrap(), 1);
    app.list_owned("0x01", "eth-mainnet", false).await.unwrap();
    assert_eq!(nfts.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn writes_sweep_expired_cache_entries() {
    let cache = Arc::new(MemoryStorage::new());
    for i in 0..1000 {
        cache.put_cache(&format!("fake-profiles|search|old{}", i), "[]", 10).await.unwrap();
    }
    let p = profiles(vec![user("dwr", &[], None)]);
    let app = app_with(&Config::default(), p, Arc::new(FakeNfts::default()), cache.clone());

    app.search_users("dwr", false).await.unwrap();
    assert_eq!(cache.len().await, 1);

    cache.put_cache("stale", "[]", 10).await.unwrap();
    assert_eq!(app.purge_expired_cache().await.unwrap(), 1);
}

#[tokio::test]
async fn listing_stops_at_page_cap() {
    let mut config = Config::default();
    config.alchemy.max_pages = 2;
    let p = profiles(vec![user("solo", &["0x01"], None)]);
    let mut nfts = FakeNfts::default();
    nfts.pages.insert(
        "0x01".into(),
        vec![vec![song("0xC0", "1", "One")], vec![song("0xC0", "2", "Two")], vec![song("0xC0", "3", "Three")]],
    );
    let nfts = Arc::new(nfts);
    let app = app_with(&config, p, nfts.clone(), Arc::new(MemoryStorage::new()));

    let list = app.list_owned("0x01", "eth-mainnet", false).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(nfts.calls.load(Ordering::SeqCst), 2);
}
