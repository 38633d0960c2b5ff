use serde_json::Value;

use crate::providers::NftPage;
use crate::types::{non_empty_str, value_at, RawNft};
use crate::UserProfile;

const AVATAR_BASE: &str = "https://avatar.vercel.sh";

/// Users from a `user/search` response (`result.users[]`).
pub fn profiles_from_search(body: &Value) -> Vec<UserProfile> {
    value_at(body, &["result", "users"])
        .and_then(Value::as_array)
        .map(|users| users.iter().filter_map(profile_from_user).collect())
        .unwrap_or_default()
}

pub fn profile_from_user(u: &Value) -> Option<UserProfile> {
    let fid = u.get("fid").and_then(Value::as_u64)?;
    let username = u.get("username").and_then(non_empty_str)?.to_string();
    let display_name = u.get("display_name").and_then(non_empty_str).unwrap_or(&username).to_string();
    let pfp_url = u
        .get("pfp_url")
        .and_then(non_empty_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/{}", AVATAR_BASE, username));
    let bio = match value_at(u, &["profile", "bio"]) {
        Some(Value::String(s)) => s.clone(),
        Some(b) => b.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        None => String::new(),
    };
    let mut verified_addresses = strings(value_at(u, &["verified_addresses", "eth_addresses"]));
    if verified_addresses.is_empty() {
        verified_addresses = strings(u.get("verifications"));
    }
    Some(UserProfile {
        fid,
        username,
        display_name,
        pfp_url,
        follower_count: u.get("follower_count").and_then(Value::as_u64).unwrap_or(0),
        following_count: u.get("following_count").and_then(Value::as_u64).unwrap_or(0),
        bio,
        verified_addresses,
        custody_address: u.get("custody_address").and_then(non_empty_str).map(str::to_string),
    })
}

/// One page of `getNFTsForOwner` (`ownedNfts[]` + `pageKey`).
pub fn nft_page_from_listing(body: &Value) -> NftPage {
    let nfts = body
        .get("ownedNfts")
        .and_then(Value::as_array)
        .map(|list| list.iter().cloned().map(RawNft).collect())
        .unwrap_or_default();
    let next_page = body.get("pageKey").and_then(non_empty_str).map(str::to_string);
    NftPage { nfts, next_page }
}

fn strings(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|a| a.iter().filter_map(non_empty_str).map(str::to_string).collect())
        .unwrap_or_default()
}
