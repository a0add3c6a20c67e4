//! Composite check over ports and URLs.
//!
//! Components are evaluated lazily in order, ports first: the first one that
//! is unhealthy decides the result and the rest are not probed.

use crate::fields;
use crate::poll::{LogCallback, PollSettings, poll_until, with_poll_fields};
use crate::port::probe_ports;
use crate::url::{agent, probe_urls};
use enactor::{CallContext, FieldType, Health, HealthCheck, NodeHandle, Schema, Section};

pub const NAME: &str = "basic";

pub fn schema() -> Schema {
    with_poll_fields(
        Schema::new()
            .optional("ports", FieldType::list(FieldType::Port))
            .optional("urls", FieldType::list(FieldType::String)),
    )
}

pub struct BasicCheck {
    agent: ureq::Agent,
}

impl Default for BasicCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicCheck {
    pub fn new() -> Self {
        Self { agent: agent() }
    }
}

impl HealthCheck for BasicCheck {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> anyhow::Result<Health> {
        let ports = fields::ports(NAME, section, "ports")?;
        let urls = fields::strings(NAME, section, "urls")?;
        let settings = PollSettings::from_section(NAME, section)?;
        let ip = node.ip()?;

        poll_until(&settings, ctx, Some(&LogCallback), || {
            let ports_health = probe_ports(ip, &ports);
            if !ports_health.is_healthy() {
                return Ok(ports_health);
            }
            Ok(probe_urls(&self.agent, ip, &urls))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{closed_port, http_server, loopback};
    use serde_json::json;
    use std::net::TcpListener;

    #[test]
    fn test_empty_section_is_healthy() {
        let health = BasicCheck::new()
            .check(&loopback(), &Section::new(NAME), &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn test_ports_then_urls() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let web = http_server("200 OK");
        let section = Section::new(NAME)
            .with("ports", json!([port]))
            .with("urls", json!([format!("http://{{ip}}:{web}/")]));
        let health = BasicCheck::new()
            .check(&loopback(), &section, &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn test_closed_port_decides_before_urls() {
        let closed = closed_port();
        let section = Section::new(NAME)
            .with("ports", json!([closed]))
            .with("urls", json!(["http://{ip}:1/never-requested"]));
        let health = BasicCheck::new()
            .check(&loopback(), &section, &CallContext::default())
            .unwrap();
        assert_eq!(
            health,
            Health::unhealthy(format!("port(s) {closed} not reachable on 127.0.0.1"))
        );
    }
}
