//! Named-service reachability check.
//!
//! A node is healthy only when every listed service answers. All services
//! are probed on every attempt so the unhealthy reason names each one that
//! did not.

use crate::error::{Error, Result};
use crate::poll::{LogCallback, PollSettings, poll_until, with_poll_fields};
use crate::port::{CONNECT_TIMEOUT, port_open};
use enactor::{CallContext, FieldType, Health, HealthCheck, NodeHandle, Schema, Section};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "services";

pub fn schema() -> Schema {
    let service = Schema::new()
        .required("name", FieldType::String)
        .required("port", FieldType::Port)
        .optional("user", FieldType::String)
        .optional("pass", FieldType::String);
    with_poll_fields(Schema::new().required("services", FieldType::list(FieldType::Object(service))))
}

/// One service expected on the node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Service {
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
}

/// How a single service is probed
pub trait ServiceProbe: Send + Sync {
    fn probe(&self, addr: IpAddr, service: &Service) -> Result<()>;
}

/// Probe by opening a TCP connection to the service port
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ServiceProbe for TcpProbe {
    fn probe(&self, addr: IpAddr, service: &Service) -> Result<()> {
        port_open(addr, service.port, self.timeout)
    }
}

pub struct ServicesCheck {
    probe: Arc<dyn ServiceProbe>,
}

impl Default for ServicesCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl ServicesCheck {
    pub fn new() -> Self {
        Self::with_probe(TcpProbe::default())
    }

    pub fn with_probe(probe: impl ServiceProbe + 'static) -> Self {
        Self {
            probe: Arc::new(probe),
        }
    }
}

fn services(section: &Section) -> Result<Vec<Service>> {
    match section.get("services") {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| Error::field(NAME, "services", e.to_string())),
    }
}

/// Probe every service, naming each one that fails
pub(crate) fn probe_all(probe: &dyn ServiceProbe, addr: IpAddr, services: &[Service]) -> Health {
    let unreachable: Vec<String> = services
        .iter()
        .filter_map(|svc| match probe.probe(addr, svc) {
            Ok(()) => {
                log::debug!("service {} is reachable", svc.name);
                None
            }
            Err(e) => Some(format!("{} ({e})", svc.name)),
        })
        .collect();
    if unreachable.is_empty() {
        Health::Healthy
    } else {
        Health::unhealthy(format!("unreachable service(s): {}", unreachable.join("; ")))
    }
}

impl HealthCheck for ServicesCheck {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> anyhow::Result<Health> {
        let services = services(section)?;
        let settings = PollSettings::from_section(NAME, section)?;
        let addr = node.ip()?;
        poll_until(&settings, ctx, Some(&LogCallback), || {
            Ok(probe_all(self.probe.as_ref(), addr, &services))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{closed_port, loopback};
    use serde_json::json;
    use std::collections::HashSet;
    use std::net::TcpListener;

    struct Scripted {
        down: HashSet<&'static str>,
    }

    impl ServiceProbe for Scripted {
        fn probe(&self, addr: IpAddr, service: &Service) -> Result<()> {
            if self.down.contains(service.name.as_str()) {
                return Err(Error::Unreachable {
                    target: format!("{addr}:{}", service.port),
                    message: "connection refused".into(),
                });
            }
            Ok(())
        }
    }

    fn section() -> Section {
        Section::new(NAME).with(
            "services",
            json!([
                { "name": "wordpress", "port": 3306, "user": "wp", "pass": "secret" },
                { "name": "sessions", "port": 3306 },
                { "name": "analytics", "port": 3306 },
            ]),
        )
    }

    #[test]
    fn test_one_unreachable_service_is_named() {
        let check = ServicesCheck::with_probe(Scripted {
            down: HashSet::from(["analytics"]),
        });
        let health = check
            .check(&loopback(), &section(), &CallContext::default())
            .unwrap();
        let Health::Unhealthy { reason } = health else {
            panic!("expected unhealthy");
        };
        assert_eq!(
            reason,
            "unreachable service(s): analytics (127.0.0.1:3306 is unreachable: connection refused)"
        );
    }

    #[test]
    fn test_all_services_reachable() {
        let check = ServicesCheck::with_probe(Scripted { down: HashSet::new() });
        let health = check
            .check(&loopback(), &section(), &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn test_tcp_probe() {
        let a = TcpListener::bind("127.0.0.1:0").unwrap();
        let b = TcpListener::bind("127.0.0.1:0").unwrap();
        let section = Section::new(NAME).with(
            "services",
            json!([
                { "name": "db", "port": a.local_addr().unwrap().port() },
                { "name": "cache", "port": b.local_addr().unwrap().port() },
                { "name": "queue", "port": closed_port() },
            ]),
        );
        let health = ServicesCheck::new()
            .check(&loopback(), &section, &CallContext::default())
            .unwrap();
        let Health::Unhealthy { reason } = health else {
            panic!("expected unhealthy");
        };
        assert!(reason.contains("queue"));
        assert!(!reason.contains("db"));
        assert!(!reason.contains("cache"));
    }

    #[test]
    fn test_schema_rejects_service_without_port() {
        let mut params = enactor::Params::new();
        params.insert("services".into(), json!([{ "name": "db" }]));
        assert!(schema().validate("health check 'services'", &params).is_err());
    }
}
