use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::config::AlchemyConfig;
use crate::mapping;
use crate::providers::client::ApiClient;
use crate::providers::{NftPage, NftSource};

const PAGE_SIZE: &str = "100";

/// Owned-NFT listings from the Alchemy NFT API v3.
pub struct AlchemyClient {
    api: ApiClient,
    api_key: Option<String>,
    networks: Vec<String>,
}

impl AlchemyClient {
    pub fn from_config(cfg: &AlchemyConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("alchemy", cfg.rate_limit_ms, cfg.call_timeout_ms)?,
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            networks: cfg.networks.iter().map(|n| n.trim().to_ascii_lowercase()).filter(|n| !n.is_empty()).collect(),
        })
    }

    pub(crate) fn listing_url(&self, key: &str, owner: &str, network: &str, page_key: Option<&str>) -> Result<Url> {
        if !network.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            bail!("invalid network name {:?}", network);
        }
        let base = format!("https://{}.g.alchemy.com/nft/v3/{}/getNFTsForOwner", network, key);
        let mut url = Url::parse(&base).with_context(|| format!("building listing URL for {}", network))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("owner", owner);
            q.append_pair("withMetadata", "true");
            q.append_pair("pageSize", PAGE_SIZE);
            if let Some(pk) = page_key {
                q.append_pair("pageKey", pk);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl NftSource for AlchemyClient {
    fn name(&self) -> &str { &self.api.name }

    fn networks(&self) -> Vec<String> { self.networks.clone() }

    async fn list_nfts(&self, owner: &str, network: &str, page_key: Option<&str>) -> Result<NftPage> {
        let key = self.api_key.as_deref().ok_or_else(|| anyhow!("Alchemy API key not configured"))?;
        let url = self.listing_url(key, owner, network, page_key)?;
        let body = self.api.get_json(url, &[("accept", "application/json")], "getNFTsForOwner").await?;
        Ok(mapping::nft_page_from_listing(&body))
    }
}
