//! Node name generation
//!
//! Names are produced by a small template language:
//!
//! ```text
//! {infra}-{name}-{index}
//! {infra|cut:0:8}-{name}{index}
//! ```
//!
//! Available placeholders are `infra`, `name`, `index` and `seed`. A
//! placeholder may carry a `cut:START:END` slice over its characters (either
//! bound may be omitted or negative). Rendering is pure: the same template,
//! context and length limit always give the same bytes.
//!
//! Rendered names longer than the backend limit go through
//! [`truncate_name`], which keeps a stable prefix and appends a short hash of
//! the full name so distinct long names stay distinct.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Template used when a node family does not declare one
pub const DEFAULT_TEMPLATE: &str = "{infra}-{name}-{index}";

/// Default maximum name length (a DNS label)
pub const DEFAULT_MAX_LEN: usize = 63;

/// Hex characters of the blake3 digest appended by [`truncate_name`]
const HASH_LEN: usize = 8;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_]+)(?:\|cut:(-?\d*):(-?\d*))?\}").expect("placeholder regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    Infra,
    Name,
    Index,
    Seed,
}

impl Var {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "infra" => Some(Self::Infra),
            "name" => Some(Self::Name),
            "index" => Some(Self::Index),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var {
        var: Var,
        cut: Option<(Option<isize>, Option<isize>)>,
    },
}

/// Values available to a name template
#[derive(Debug, Clone, Copy)]
pub struct NameContext<'a> {
    pub infra: &'a str,
    pub name: &'a str,
    pub index: usize,
    pub seed: &'a str,
}

/// A parsed name-generation template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    parts: Vec<Part>,
}

impl NameTemplate {
    /// Parse a template, rejecting unknown placeholders and stray braces
    pub fn parse(source: &str) -> Result<Self> {
        let err = |message: String| Error::Template {
            template: source.to_string(),
            message,
        };

        let mut parts = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(source) {
            let whole = caps.get(0).expect("group 0 always matches");
            push_literal(&mut parts, &source[last..whole.start()]).map_err(err)?;
            last = whole.end();

            let var_name = &caps[1];
            let var = Var::parse(var_name).ok_or_else(|| err(format!("unknown placeholder '{var_name}'")))?;
            let cut = match (caps.get(2), caps.get(3)) {
                (Some(start), Some(end)) => Some((
                    parse_bound(start.as_str()).map_err(err)?,
                    parse_bound(end.as_str()).map_err(err)?,
                )),
                _ => None,
            };
            parts.push(Part::Var { var, cut });
        }
        push_literal(&mut parts, &source[last..]).map_err(err)?;

        if parts.is_empty() {
            return Err(err("template is empty".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Render the template for one node
    pub fn render(&self, ctx: &NameContext<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Var { var, cut: slice } => {
                    let index;
                    let value = match var {
                        Var::Infra => ctx.infra,
                        Var::Name => ctx.name,
                        Var::Seed => ctx.seed,
                        Var::Index => {
                            index = ctx.index.to_string();
                            index.as_str()
                        }
                    };
                    match slice {
                        Some((start, end)) => out.push_str(&cut(value, *start, *end)),
                        None => out.push_str(value),
                    }
                }
            }
        }
        out
    }

    /// Whether the template varies with the instance index
    pub fn uses_index(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Var { var: Var::Index, .. }))
    }

    /// The original template text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE).expect("default template is valid")
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn push_literal(parts: &mut Vec<Part>, text: &str) -> std::result::Result<(), String> {
    if text.contains('{') || text.contains('}') {
        return Err(format!("unbalanced or malformed placeholder near '{text}'"));
    }
    if !text.is_empty() {
        parts.push(Part::Literal(text.to_string()));
    }
    Ok(())
}

fn parse_bound(s: &str) -> std::result::Result<Option<isize>, String> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<isize>()
        .map(Some)
        .map_err(|e| format!("invalid cut bound '{s}': {e}"))
}

/// Slice `input` by character offsets
///
/// Negative bounds count from the end; out-of-range bounds are clamped and an
/// empty string is returned when `start >= end`.
pub fn cut(input: &str, start: Option<isize>, end: Option<isize>) -> String {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len() as isize;
    let norm = |bound: isize| -> usize {
        let b = if bound < 0 { len + bound } else { bound };
        b.clamp(0, len) as usize
    };
    let from = start.map_or(0, norm);
    let to = end.map_or(chars.len(), norm);
    if from >= to {
        return String::new();
    }
    chars[from..to].iter().collect()
}

/// Deterministically shorten `name` to at most `max_len` bytes
///
/// Names that already fit are returned unchanged. Longer names keep as much
/// of their prefix as fits and end in `-` plus the first eight hex characters
/// of the blake3 digest of the full name.
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    let digest = blake3::hash(name.as_bytes()).to_hex();
    let hash = &digest.as_str()[..HASH_LEN];

    if max_len <= HASH_LEN + 1 {
        return hash[..max_len.min(HASH_LEN)].to_string();
    }

    let budget = max_len - HASH_LEN - 1;
    let mut prefix_end = 0;
    for (i, c) in name.char_indices() {
        if i + c.len_utf8() > budget {
            break;
        }
        prefix_end = i + c.len_utf8();
    }
    format!("{}-{}", &name[..prefix_end], hash)
}

/// Deterministic node identifier derived from infra, seed and node name
pub fn node_id(infra: &str, seed: &str, name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(infra.as_bytes());
    hasher.update(&[0]);
    hasher.update(seed.as_bytes());
    hasher.update(&[0]);
    hasher.update(name.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Tracks names handed out within one plan
#[derive(Debug, Clone)]
pub struct NameRegistry {
    max_len: usize,
    seen: HashSet<String>,
}

impl NameRegistry {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            seen: HashSet::new(),
        }
    }

    /// Truncate `rendered` to the limit and reserve it
    pub fn claim(&mut self, rendered: &str) -> Result<String> {
        let name = truncate_name(rendered, self.max_len);
        if !self.seen.insert(name.clone()) {
            return Err(Error::NameCollision(name));
        }
        Ok(name)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(index: usize) -> NameContext<'static> {
        NameContext {
            infra: "wordpress-demo",
            name: "mysql",
            index,
            seed: "7f3a",
        }
    }

    #[test]
    fn test_default_template() {
        let t = NameTemplate::default();
        assert_eq!(t.render(&ctx(0)), "wordpress-demo-mysql-0");
        assert_eq!(t.render(&ctx(2)), "wordpress-demo-mysql-2");
        assert!(t.uses_index());
    }

    #[test]
    fn test_cut_placeholder() {
        let t = NameTemplate::parse("{infra|cut:0:4}-{name|cut::2}{index}-{seed|cut:-2:}").unwrap();
        assert_eq!(t.render(&ctx(3)), "word-my3-3a");
    }

    #[test]
    fn test_cut_function_slicing() {
        assert_eq!(cut("abcdef", Some(1), Some(3)), "bc");
        assert_eq!(cut("abcdef", None, Some(-2)), "abcd");
        assert_eq!(cut("abcdef", Some(-3), None), "def");
        assert_eq!(cut("abcdef", Some(4), Some(2)), "");
        assert_eq!(cut("abc", Some(0), Some(100)), "abc");
        assert_eq!(cut("héllo", Some(1), Some(3)), "él");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            NameTemplate::parse("{infra}-{colour}"),
            Err(Error::Template { .. })
        ));
        assert!(NameTemplate::parse("{infra").is_err());
        assert!(NameTemplate::parse("node}").is_err());
        assert!(NameTemplate::parse("{name|cut:a:b}").is_err());
        assert!(NameTemplate::parse("").is_err());
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = NameTemplate::parse("{infra}-{name}-{index}-{seed}").unwrap();
        let a = truncate_name(&t.render(&ctx(1)), 16);
        let b = truncate_name(&t.render(&ctx(1)), 16);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_truncate_keeps_short_names() {
        assert_eq!(truncate_name("web-0", 63), "web-0");
    }

    #[test]
    fn test_truncate_respects_limit_and_uniqueness() {
        let long_a = format!("{}-a", "x".repeat(80));
        let long_b = format!("{}-b", "x".repeat(80));
        let a = truncate_name(&long_a, 20);
        let b = truncate_name(&long_b, 20);
        assert_eq!(a.len(), 20);
        assert_eq!(b.len(), 20);
        assert_ne!(a, b);
        assert!(a.starts_with("xxxxxxxxxxx-"));
    }

    #[test]
    fn test_truncate_tiny_limits() {
        let name = "a-very-long-node-name";
        assert_eq!(truncate_name(name, 4).len(), 4);
        assert_eq!(truncate_name(name, 9).len(), 8);
        assert_eq!(truncate_name(name, 0), "");
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        let name = "ééééééééééééééééééé";
        let t = truncate_name(name, 14);
        assert!(t.len() <= 14);
        assert!(t.ends_with(&blake3::hash(name.as_bytes()).to_hex()[..8]));
    }

    #[test]
    fn test_name_registry_rejects_duplicates() {
        let mut names = NameRegistry::new(63);
        assert_eq!(names.claim("web").unwrap(), "web");
        assert!(matches!(names.claim("web"), Err(Error::NameCollision(n)) if n == "web"));
    }

    #[test]
    fn test_node_id_stable() {
        let a = node_id("demo", "s", "web-0");
        assert_eq!(a, node_id("demo", "s", "web-0"));
        assert_ne!(a, node_id("demo", "s", "web-1"));
        assert_eq!(a.len(), 16);
    }
}
