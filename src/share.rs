//! Profile share codes hosted by Thunderstore's legacy profile service.

use crate::{
    profile::Profile,
    transfer::{self, ProfileExport},
    transport::USER_AGENT,
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

const SHARE_API: &str = "https://thunderstore.io/api/experimental/legacyprofile";

#[derive(Deserialize)]
struct CreatedShare {
    key: String,
}

pub struct ShareClient {
    agent: ureq::Agent,
    api_root: String,
}

impl ShareClient {
    pub fn new() -> Self {
        Self::with_api_root(SHARE_API)
    }

    pub fn with_api_root(api_root: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .timeout_write(Duration::from_secs(30))
            .build();
        Self {
            agent,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        }
    }

    fn create_url(&self) -> String {
        format!("{}/create/", self.api_root)
    }

    fn get_url(&self, code: &str) -> String {
        format!("{}/get/{}/", self.api_root, code.trim())
    }

    /// Uploads the profile's export and returns the share code.
    pub fn share_profile(&self, profile: &Profile) -> Result<String> {
        let payload = transfer::encode_share(profile)?;
        let url = self.create_url();
        let response = self
            .agent
            .post(&url)
            .set("User-Agent", USER_AGENT)
            .set("Content-Type", "application/octet-stream")
            .send_string(&payload)
            .with_context(|| format!("upload shared profile to {url}"))?;
        let body = response.into_string().context("read share response")?;
        let key = parse_share_key(&body)?;
        info!(profile = %profile.name, code = %key, "profile shared");
        Ok(key)
    }

    /// Downloads and decodes the export behind a share code.
    pub fn fetch_export(&self, code: &str) -> Result<ProfileExport> {
        if code.trim().is_empty() {
            bail!("share code is empty");
        }
        let url = self.get_url(code);
        let response = self
            .agent
            .get(&url)
            .set("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("fetch shared profile {}", code.trim()))?;
        let payload = response.into_string().context("read shared profile")?;
        transfer::decode_share(&payload)
    }
}

impl Default for ShareClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_share_key(body: &str) -> Result<String> {
    let created: CreatedShare =
        serde_json::from_str(body).context("parse share response")?;
    if created.key.is_empty() {
        bail!("share response carried an empty key");
    }
    Ok(created.key)
}
