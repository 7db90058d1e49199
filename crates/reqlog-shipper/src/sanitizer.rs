// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload sanitization before anything leaves the process.
//!
//! Three rules apply to every captured body:
//!
//! 1. **Redaction**: values under a sensitive key (password, token, api key,
//!    secret, authorization, bearer, auth, credit card, SSN, plus configured
//!    extras) are replaced by [`REDACTED_MARKER`], whatever their type.
//! 2. **Cycle safety**: a composite value seen twice in one call becomes
//!    [`CIRCULAR_MARKER`] instead of being walked again, so any graph
//!    terminates.
//! 3. **Size capping**: the result is cut to the configured byte budget with
//!    a trailing [`TRUNCATION_MARKER`]. Strings are cut directly, structures
//!    after serialization.
//!
//! Sanitization is total: an internal failure yields
//! [`SANITIZE_FAILED_MARKER`] rather than an error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::constants::{
    BINARY_BODY_PLACEHOLDER, CIRCULAR_MARKER, MAX_SANITIZE_DEPTH, REDACTED_MARKER,
    SANITIZE_FAILED_MARKER, TRUNCATION_MARKER,
};
use crate::error::ShipperError;

const SENSITIVE_KEY_PATTERN: &str = "password|passwd|token|api[_-]?key|secret|authorization|bearer|auth|credit[_-]?card|card[_-]?number|ssn";

const SENSITIVE_HEADER_FRAGMENTS: [&str; 5] = ["authorization", "cookie", "api-key", "token", "secret"];

const BINARY_CONTENT_TYPES: [&str; 8] = [
    "multipart/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "image/",
    "audio/",
    "video/",
];

pub type SharedList = Arc<RwLock<Vec<CapturedValue>>>;
pub type SharedMap = Arc<RwLock<BTreeMap<String, CapturedValue>>>;

/// A dynamically typed value as seen by the capture hooks.
///
/// Lists and maps are shared handles, so the graph may alias itself the way
/// host objects do. `Debug` is implemented by hand for that reason: a derived
/// one would never return on a cyclic value.
#[derive(Clone)]
pub enum CapturedValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(SharedList),
    Map(SharedMap),
}

impl CapturedValue {
    #[must_use]
    pub fn list(items: Vec<CapturedValue>) -> Self {
        CapturedValue::List(Arc::new(RwLock::new(items)))
    }

    #[must_use]
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, CapturedValue)>) -> Self {
        CapturedValue::Map(Arc::new(RwLock::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Address of the shared allocation for composite values.
    fn identity(&self) -> Option<usize> {
        match self {
            CapturedValue::List(items) => Some(Arc::as_ptr(items).cast::<()>() as usize),
            CapturedValue::Map(entries) => Some(Arc::as_ptr(entries).cast::<()>() as usize),
            _ => None,
        }
    }
}

impl fmt::Debug for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturedValue::Null => write!(f, "Null"),
            CapturedValue::Bool(b) => write!(f, "Bool({b})"),
            CapturedValue::Number(n) => write!(f, "Number({n})"),
            CapturedValue::String(s) => write!(f, "String({} bytes)", s.len()),
            CapturedValue::List(_) => write!(f, "List(..)"),
            CapturedValue::Map(_) => write!(f, "Map(..)"),
        }
    }
}

impl From<Value> for CapturedValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CapturedValue::Null,
            Value::Bool(b) => CapturedValue::Bool(b),
            Value::Number(n) => CapturedValue::Number(n),
            Value::String(s) => CapturedValue::String(s),
            Value::Array(items) => {
                CapturedValue::list(items.into_iter().map(CapturedValue::from).collect())
            }
            Value::Object(entries) => {
                CapturedValue::map(entries.into_iter().map(|(k, v)| (k, CapturedValue::from(v))))
            }
        }
    }
}

impl From<&str> for CapturedValue {
    fn from(value: &str) -> Self {
        CapturedValue::String(value.to_string())
    }
}

impl From<String> for CapturedValue {
    fn from(value: String) -> Self {
        CapturedValue::String(value)
    }
}

#[derive(Debug, thiserror::Error)]
enum WalkError {
    #[error("value lock poisoned")]
    Poisoned,
    #[error("value nested too deeply")]
    TooDeep,
}

/// Stateless redaction, cycle breaking and size capping.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    sensitive_keys: Regex,
    max_body_bytes: usize,
}

impl Sanitizer {
    /// Builds a sanitizer from the body budget and extra sensitive field
    /// names in `config`.
    pub fn new(config: &Config) -> Result<Self, ShipperError> {
        let mut pattern = format!("(?i)({SENSITIVE_KEY_PATTERN}");
        for field in &config.sensitive_fields {
            pattern.push('|');
            pattern.push_str(&regex::escape(field));
        }
        pattern.push(')');

        let sensitive_keys = Regex::new(&pattern).map_err(|e| {
            ShipperError::ConfigInvalid(format!("invalid sensitive field pattern: {e}"))
        })?;

        Ok(Sanitizer {
            sensitive_keys,
            max_body_bytes: config.max_body_bytes,
        })
    }

    #[must_use]
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.sensitive_keys.is_match(key)
    }

    /// Redacts, breaks cycles and caps the size of `value`.
    #[must_use]
    pub fn sanitize(&self, value: &CapturedValue) -> Value {
        let mut visited = HashSet::new();
        match self.walk(value, &mut visited, 0) {
            Ok(walked) => self.cap_value(walked),
            Err(e) => {
                let e = ShipperError::SanitizationFailure(e.to_string());
                debug!("SANITIZER | {e}, replacing value with placeholder");
                Value::String(SANITIZE_FAILED_MARKER.to_string())
            }
        }
    }

    /// Same as [`Sanitizer::sanitize`] for an already-parsed JSON value.
    #[must_use]
    pub fn sanitize_json(&self, value: &Value) -> Value {
        self.sanitize(&CapturedValue::from(value.clone()))
    }

    /// Prepares a captured body for an event snapshot.
    ///
    /// Binary and multipart bodies are replaced by a placeholder without
    /// being walked.
    #[must_use]
    pub fn capture_body(&self, content_type: Option<&str>, body: &CapturedValue) -> Value {
        if content_type.is_some_and(is_binary_content_type) {
            return Value::String(BINARY_BODY_PLACEHOLDER.to_string());
        }
        self.sanitize(body)
    }

    /// Redacts headers whose name mentions a credential.
    #[must_use]
    pub fn redact_headers(&self, headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                if is_sensitive_header(name) {
                    (name.clone(), REDACTED_MARKER.to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }

    /// Sanitizes a snapshot body and renders it as the string sent on the wire.
    #[must_use]
    pub fn body_to_wire(&self, body: Option<&Value>) -> Option<String> {
        match self.sanitize_json(body?) {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(
                serde_json::to_string(&other)
                    .unwrap_or_else(|_| SANITIZE_FAILED_MARKER.to_string()),
            ),
        }
    }

    /// Cuts `value` to the byte budget on a character boundary.
    #[must_use]
    pub fn cap_string(&self, value: &str) -> String {
        if value.len() <= self.max_body_bytes {
            return value.to_string();
        }
        let mut end = self.max_body_bytes;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}{}", &value[..end], TRUNCATION_MARKER)
    }

    fn cap_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.cap_string(&s)),
            Value::Array(_) | Value::Object(_) => match serde_json::to_string(&value) {
                Ok(serialized) if serialized.len() > self.max_body_bytes => {
                    Value::String(self.cap_string(&serialized))
                }
                Ok(_) => value,
                Err(e) => {
                    debug!("SANITIZER | Failed to serialize value: {e}");
                    Value::String(SANITIZE_FAILED_MARKER.to_string())
                }
            },
            scalar => scalar,
        }
    }

    fn walk(
        &self,
        value: &CapturedValue,
        visited: &mut HashSet<usize>,
        depth: usize,
    ) -> Result<Value, WalkError> {
        if depth > MAX_SANITIZE_DEPTH {
            return Err(WalkError::TooDeep);
        }
        if let Some(identity) = value.identity() {
            if !visited.insert(identity) {
                return Ok(Value::String(CIRCULAR_MARKER.to_string()));
            }
        }

        match value {
            CapturedValue::Null => Ok(Value::Null),
            CapturedValue::Bool(b) => Ok(Value::Bool(*b)),
            CapturedValue::Number(n) => Ok(Value::Number(n.clone())),
            CapturedValue::String(s) => Ok(Value::String(s.clone())),
            CapturedValue::List(items) => {
                let items = items.read().map_err(|_| WalkError::Poisoned)?;
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(self.walk(item, visited, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            CapturedValue::Map(entries) => {
                let entries = entries.read().map_err(|_| WalkError::Poisoned)?;
                let mut out = Map::new();
                for (key, entry) in entries.iter() {
                    let sanitized = if self.is_sensitive_key(key) {
                        Value::String(REDACTED_MARKER.to_string())
                    } else {
                        self.walk(entry, visited, depth + 1)?
                    };
                    out.insert(key.clone(), sanitized);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

/// Whether a body of this content type must never be sanitized or serialized.
#[must_use]
pub fn is_binary_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    BINARY_CONTENT_TYPES
        .iter()
        .any(|prefix| media_type.starts_with(prefix))
}

fn is_sensitive_header(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_HEADER_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}
