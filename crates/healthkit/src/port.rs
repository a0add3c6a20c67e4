//! Port reachability check.

use crate::error::{Error, Result};
use crate::fields;
use crate::poll::{LogCallback, PollSettings, poll_until, with_poll_fields};
use enactor::{CallContext, FieldType, Health, HealthCheck, NodeHandle, Schema, Section};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

pub const NAME: &str = "ports";

/// Time allowed for one TCP connect
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn schema() -> Schema {
    with_poll_fields(Schema::new().required("ports", FieldType::list(FieldType::Port)))
}

/// Whether a TCP connection to `ip:port` completes within `timeout`
pub fn port_open(ip: IpAddr, port: u16, timeout: Duration) -> Result<()> {
    TcpStream::connect_timeout(&SocketAddr::new(ip, port), timeout)
        .map(drop)
        .map_err(|e| Error::Unreachable {
            target: format!("{ip}:{port}"),
            message: e.to_string(),
        })
}

/// Healthy when every port accepts a connection
pub(crate) fn probe_ports(ip: IpAddr, ports: &[u16]) -> Health {
    let closed: Vec<String> = ports
        .iter()
        .filter(|&&port| port_open(ip, port, CONNECT_TIMEOUT).is_err())
        .map(u16::to_string)
        .collect();
    if closed.is_empty() {
        Health::Healthy
    } else {
        Health::unhealthy(format!("port(s) {} not reachable on {ip}", closed.join(", ")))
    }
}

/// Checks that the node's primary address accepts TCP connections
#[derive(Debug, Default)]
pub struct PortsCheck;

impl HealthCheck for PortsCheck {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> anyhow::Result<Health> {
        let ports = fields::ports(NAME, section, "ports")?;
        let settings = PollSettings::from_section(NAME, section)?;
        let ip = node.ip()?;
        log::debug!("checking port(s) {ports:?} on {} ({ip})", node.name());
        poll_until(&settings, ctx, Some(&LogCallback), || Ok(probe_ports(ip, &ports)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{closed_port, loopback};
    use serde_json::json;
    use std::net::{Ipv4Addr, TcpListener};

    #[test]
    fn test_open_port_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let section = Section::new(NAME).with("ports", json!([port]));

        let health = PortsCheck
            .check(&loopback(), &section, &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn test_closed_port_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port();
        let section = Section::new(NAME).with("ports", json!([open, closed]));

        let health = PortsCheck
            .check(&loopback(), &section, &CallContext::default())
            .unwrap();
        assert_eq!(
            health,
            Health::unhealthy(format!("port(s) {closed} not reachable on 127.0.0.1"))
        );
    }

    #[test]
    fn test_port_open_error() {
        let err = port_open(IpAddr::V4(Ipv4Addr::LOCALHOST), closed_port(), CONNECT_TIMEOUT).unwrap_err();
        assert!(err.to_string().starts_with("127.0.0.1:"));
    }

    #[test]
    fn test_schema_requires_ports() {
        let params = enactor::Params::new();
        let err = schema().validate("health check 'ports'", &params).unwrap_err();
        assert!(err.to_string().contains("Missing key(s): ports"));
    }
}
