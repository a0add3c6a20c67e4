//! URL availability check.

use crate::error::{Error, Result};
use crate::fields;
use crate::poll::{LogCallback, PollSettings, poll_until, with_poll_fields};
use enactor::{CallContext, FieldType, Health, HealthCheck, NodeHandle, Schema, Section};
use std::net::IpAddr;
use std::time::Duration;

pub const NAME: &str = "urls";

/// Time allowed for one HEAD request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn schema() -> Schema {
    with_poll_fields(Schema::new().required("urls", FieldType::list(FieldType::String)))
}

/// Substitute `{ip}` with the node address
pub fn expand(url: &str, ip: IpAddr) -> String {
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    url.replace("{ip}", &host)
}

pub(crate) fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into()
}

/// HEAD request that succeeds on a non-error status
pub fn head(agent: &ureq::Agent, url: &str) -> Result<()> {
    agent
        .head(url)
        .call()
        .map(drop)
        .map_err(|e| Error::http(url, e))
}

/// Healthy when every URL answers
pub(crate) fn probe_urls(agent: &ureq::Agent, ip: IpAddr, urls: &[String]) -> Health {
    let failed: Vec<String> = urls
        .iter()
        .map(|u| expand(u, ip))
        .filter_map(|url| head(agent, &url).err().map(|e| e.to_string()))
        .collect();
    if failed.is_empty() {
        Health::Healthy
    } else {
        Health::unhealthy(failed.join("; "))
    }
}

/// Checks that URLs served by the node respond
pub struct UrlsCheck {
    agent: ureq::Agent,
}

impl Default for UrlsCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlsCheck {
    pub fn new() -> Self {
        Self { agent: agent() }
    }
}

impl HealthCheck for UrlsCheck {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> anyhow::Result<Health> {
        let urls = fields::strings(NAME, section, "urls")?;
        let settings = PollSettings::from_section(NAME, section)?;
        let ip = node.ip()?;
        poll_until(&settings, ctx, Some(&LogCallback), || Ok(probe_urls(&self.agent, ip, &urls)))
    }
}
