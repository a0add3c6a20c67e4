//! Structural schema checking for plugin configuration
//!
//! Every plugin registers a [`Schema`] describing the keys its section
//! accepts. Configurations are checked once, while the plan is built, so an
//! invalid section can never surface halfway through a batch.

use serde_json::Value;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Free-form plugin configuration (a section without its `type` key)
pub type Params = serde_json::Map<String, Value>;

/// Expected type of a configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Any value is accepted
    Any,
    String,
    Integer,
    /// Integer `>= 0`
    UnsignedInteger,
    /// Integer in `1..=65535`
    Port,
    /// String holding an IPv4 or IPv6 address
    IpAddr,
    /// Integer or float
    Number,
    Bool,
    /// A list whose items all match the inner type
    List(Box<FieldType>),
    /// Like `List`, with at least one item
    NonEmptyList(Box<FieldType>),
    /// An object with arbitrary keys
    Map,
    /// A string restricted to the given values
    Enum(Vec<String>),
    /// A nested object checked against its own schema
    Object(Schema),
}

impl FieldType {
    /// Shorthand for `List(Box::new(item))`
    pub fn list(item: FieldType) -> Self {
        Self::List(Box::new(item))
    }

    /// Shorthand for `NonEmptyList(Box::new(item))`
    pub fn non_empty_list(item: FieldType) -> Self {
        Self::NonEmptyList(Box::new(item))
    }

    /// Shorthand for an enum of string values
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::UnsignedInteger => write!(f, "non-negative integer"),
            Self::Port => write!(f, "port"),
            Self::IpAddr => write!(f, "IP address"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
            Self::List(item) => write!(f, "list of {item}"),
            Self::NonEmptyList(item) => write!(f, "non-empty list of {item}"),
            Self::Map => write!(f, "map"),
            Self::Enum(values) => write!(f, "one of [{}]", values.join(", ")),
            Self::Object(_) => write!(f, "object"),
        }
    }
}

/// One declared configuration key
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub ty: FieldType,
    pub required: bool,
}

/// Declared configuration schema of a plugin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
    allow_unknown: bool,
}

impl Schema {
    /// Create an empty schema (accepts only an empty configuration)
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required key
    pub fn required(mut self, key: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(Field {
            key: key.into(),
            ty,
            required: true,
        });
        self
    }

    /// Declare an optional key
    pub fn optional(mut self, key: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(Field {
            key: key.into(),
            ty,
            required: false,
        });
        self
    }

    /// Accept keys that are not declared
    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a declared field
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Check a configuration, wrapping violations in a [`SchemaError`]
    pub fn validate(&self, context: &str, config: &Params) -> Result<(), SchemaError> {
        let violations = self.check(config);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError {
                context: context.to_string(),
                violations,
            })
        }
    }

    /// Collect every violation of this schema in `config`
    ///
    /// Missing keys are reported first, then unknown keys, then type errors.
    pub fn check(&self, config: &Params) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.check_at("", config, &mut violations);
        violations
    }

    fn check_at(&self, path: &str, config: &Params, out: &mut Vec<Violation>) {
        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.required && !config.contains_key(&f.key))
            .map(|f| join_path(path, &f.key))
            .collect();
        if !missing.is_empty() {
            out.push(Violation::MissingKeys(missing));
        }

        if !self.allow_unknown {
            let unknown: Vec<String> = config
                .keys()
                .filter(|k| self.field(k).is_none())
                .map(|k| join_path(path, k))
                .collect();
            if !unknown.is_empty() {
                out.push(Violation::UnknownKeys(unknown));
            }
        }

        for field in &self.fields {
            if let Some(value) = config.get(&field.key) {
                check_value(&join_path(path, &field.key), &field.ty, value, out);
            }
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn check_value(path: &str, ty: &FieldType, value: &Value, out: &mut Vec<Violation>) {
    let mismatch = |out: &mut Vec<Violation>| {
        out.push(Violation::WrongType {
            path: path.to_string(),
            expected: ty.to_string(),
            found: type_name(value).to_string(),
        });
    };
    let invalid = |out: &mut Vec<Violation>, message: String| {
        out.push(Violation::Invalid {
            path: path.to_string(),
            message,
        });
    };

    match ty {
        FieldType::Any => {}
        FieldType::String => {
            if !value.is_string() {
                mismatch(out);
            }
        }
        FieldType::Integer => {
            if !(value.is_i64() || value.is_u64()) {
                mismatch(out);
            }
        }
        FieldType::UnsignedInteger => {
            if value.is_u64() {
                return;
            }
            if value.is_i64() {
                invalid(out, format!("{value} is negative"));
            } else {
                mismatch(out);
            }
        }
        FieldType::Port => {
            if !(value.is_i64() || value.is_u64()) {
                mismatch(out);
            } else if !value
                .as_u64()
                .is_some_and(|p| (1..=u64::from(u16::MAX)).contains(&p))
            {
                invalid(out, format!("{value} is not a valid port (1-65535)"));
            }
        }
        FieldType::IpAddr => match value.as_str() {
            Some(s) if s.parse::<IpAddr>().is_ok() => {}
            Some(s) => invalid(out, format!("'{s}' is not an IP address")),
            None => mismatch(out),
        },
        FieldType::Number => {
            if !value.is_number() {
                mismatch(out);
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                mismatch(out);
            }
        }
        FieldType::Map => {
            if !value.is_object() {
                mismatch(out);
            }
        }
        FieldType::List(item) => match value.as_array() {
            Some(items) => {
                for (i, v) in items.iter().enumerate() {
                    check_value(&format!("{path}[{i}]"), item, v, out);
                }
            }
            None => mismatch(out),
        },
        FieldType::NonEmptyList(item) => match value.as_array() {
            Some(items) if items.is_empty() => invalid(out, "must not be empty".to_string()),
            Some(items) => {
                for (i, v) in items.iter().enumerate() {
                    check_value(&format!("{path}[{i}]"), item, v, out);
                }
            }
            None => mismatch(out),
        },
        FieldType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => {}
            Some(s) => out.push(Violation::NotAllowed {
                path: path.to_string(),
                value: s.to_string(),
                allowed: allowed.clone(),
            }),
            None => mismatch(out),
        },
        FieldType::Object(schema) => match value.as_object() {
            Some(map) => schema.check_at(path, map, out),
            None => mismatch(out),
        },
    }
}

/// JSON type name of a value, for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingKeys(Vec<String>),
    UnknownKeys(Vec<String>),
    WrongType {
        path: String,
        expected: String,
        found: String,
    },
    NotAllowed {
        path: String,
        value: String,
        allowed: Vec<String>,
    },
    /// Free-form violation raised by the node definition model
    Invalid { path: String, message: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeys(keys) => write!(f, "Missing key(s): {}", keys.join(", ")),
            Self::UnknownKeys(keys) => write!(f, "Unknown key(s): {}", keys.join(", ")),
            Self::WrongType {
                path,
                expected,
                found,
            } => write!(f, "'{path}' must be {expected}, found {found}"),
            Self::NotAllowed {
                path,
                value,
                allowed,
            } => write!(
                f,
                "'{path}' has invalid value '{value}' (allowed: {})",
                allowed.join(", ")
            ),
            Self::Invalid { path, message } => write!(f, "'{path}': {message}"),
        }
    }
}

/// A configuration or definition failed its schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {context}: {}", join_violations(.violations))]
pub struct SchemaError {
    /// What was being checked (e.g. "health_check 'ports' of node family 'web'")
    pub context: String,
    pub violations: Vec<Violation>,
}

impl SchemaError {
    /// Build an error with a single free-form violation
    pub fn invalid(context: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            violations: vec![Violation::Invalid {
                path: path.into(),
                message: message.into(),
            }],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
