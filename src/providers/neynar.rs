use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::config::NeynarConfig;
use crate::mapping;
use crate::providers::client::ApiClient;
use crate::providers::ProfileSource;
use crate::UserProfile;

/// Farcaster user search backed by the Neynar v2 API.
pub struct NeynarClient {
    api: ApiClient,
    base: Url,
    api_key: Option<String>,
}

impl NeynarClient {
    pub fn from_config(cfg: &NeynarConfig) -> Result<Self> {
        let mut base = Url::parse(&cfg.base_url).with_context(|| format!("invalid Neynar base URL {}", cfg.base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            api: ApiClient::new("neynar", cfg.rate_limit_ms, cfg.call_timeout_ms)?,
            base,
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub(crate) fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self.base.join("v2/farcaster/user/search")?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }
}

#[async_trait]
impl ProfileSource for NeynarClient {
    fn name(&self) -> &str { &self.api.name }

    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let key = self.api_key.as_deref().ok_or_else(|| anyhow!("Neynar API key not configured"))?;
        let url = self.search_url(query)?;
        let body = self
            .api
            .get_json(url, &[("accept", "application/json"), ("api_key", key)], "user search")
            .await?;
        Ok(mapping::profiles_from_search(&body))
    }
}
