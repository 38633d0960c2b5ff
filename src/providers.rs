//! Upstream data sources: the Farcaster profile API and the NFT listing API.

pub mod alchemy;
pub mod client;
pub mod neynar;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RawNft;
use crate::UserProfile;

pub use alchemy::AlchemyClient;
pub use neynar::NeynarClient;

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Stable id used in cache keys.
    fn name(&self) -> &str;
    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NftPage {
    pub nfts: Vec<RawNft>,
    pub next_page: Option<String>,
}

#[async_trait]
pub trait NftSource: Send + Sync {
    fn name(&self) -> &str;
    /// Chains queried for every owner address.
    fn networks(&self) -> Vec<String>;
    async fn list_nfts(&self, owner: &str, network: &str, page_key: Option<&str>) -> Result<NftPage>;
}
