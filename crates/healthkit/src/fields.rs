//! Typed access to check configuration values
//!
//! Sections are range-checked by their schema at load time. These accessors
//! check again for callers that hand a section straight to a check.

use crate::error::{Error, Result};
use enactor::Section;
use serde_json::Value;
use std::time::Duration;

/// Optional whole number of seconds
pub(crate) fn seconds(check: &'static str, section: &Section, key: &'static str) -> Result<Option<Duration>> {
    match section.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|s| Some(Duration::from_secs(s)))
            .ok_or_else(|| Error::field(check, key, format!("expected a non-negative number of seconds, found {v}"))),
    }
}

/// List of TCP ports; missing means empty
pub(crate) fn ports(check: &'static str, section: &Section, key: &'static str) -> Result<Vec<u16>> {
    let Some(Value::Array(items)) = section.get(key) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .filter(|&p| p != 0)
                .ok_or_else(|| Error::field(check, key, format!("{v} is not a valid port")))
        })
        .collect()
}

/// List of strings; missing means empty
pub(crate) fn strings(check: &'static str, section: &Section, key: &'static str) -> Result<Vec<String>> {
    let Some(Value::Array(items)) = section.get(key) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::field(check, key, format!("expected a string, found {v}")))
        })
        .collect()
}

pub(crate) fn optional_string(section: &Section, key: &str) -> Option<String> {
    section.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ports() {
        let s = Section::new("ports").with("ports", json!([22, 80]));
        assert_eq!(ports("ports", &s, "ports").unwrap(), vec![22, 80]);

        let s = Section::new("ports").with("ports", json!([80, 70000]));
        assert!(ports("ports", &s, "ports").is_err());

        let s = Section::new("ports").with("ports", json!([0]));
        assert!(ports("ports", &s, "ports").is_err());

        assert!(ports("ports", &Section::new("ports"), "ports").unwrap().is_empty());
    }

    #[test]
    fn test_seconds() {
        let s = Section::new("ports").with("timeout", 30);
        assert_eq!(seconds("ports", &s, "timeout").unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(seconds("ports", &s, "poll_delay").unwrap(), None);

        let s = Section::new("ports").with("timeout", -1);
        assert!(seconds("ports", &s, "timeout").is_err());
    }

    #[test]
    fn test_strings() {
        let s = Section::new("command").with("args", json!(["-c", "true"]));
        assert_eq!(strings("command", &s, "args").unwrap(), vec!["-c", "true"]);
        assert_eq!(optional_string(&s, "command"), None);
    }
}
