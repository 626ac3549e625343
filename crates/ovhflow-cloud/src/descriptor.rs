//! Resource descriptors
//!
//! A [`ResourceData`] is the declarative configuration of one managed
//! object as handed over by the orchestrator, plus the computed attributes
//! reconcilers write back and the identity assigned at creation.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "a boolean",
            AttributeValue::Int(_) => "an integer",
            AttributeValue::String(_) => "a string",
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        AttributeValue::String(value.clone())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Configuration and computed state of one managed object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Identity assigned after a successful create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Assign the identity.
    ///
    /// Setting the same value again is a no-op; replacing an existing
    /// identity with a different one is refused.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        match &self.id {
            Some(current) if *current != id => Err(CloudError::Validation(format!(
                "resource already has identity {}, refusing to replace it with {}",
                current, id
            ))),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// String attribute; empty strings count as unset
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(AttributeValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Integer attribute; a value of another type is a validation error
    pub fn try_get_int(&self, key: &str) -> Result<Option<i64>> {
        self.typed(key, "an integer", AttributeValue::as_int)
    }

    /// Boolean attribute; a value of another type is a validation error
    pub fn try_get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.typed(key, "a boolean", AttributeValue::as_bool)
    }

    pub fn require_str(&self, key: &str) -> Result<String> {
        self.typed(key, "a string", |v| v.as_str().map(str::to_string))?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CloudError::Validation(format!("missing required attribute `{}`", key)))
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: &str,
        convert: impl Fn(&AttributeValue) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| {
                CloudError::Validation(format!(
                    "attribute `{}` must be {}, got {} ({})",
                    key,
                    expected,
                    value.kind(),
                    value
                ))
            }),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Set `key` when `value` is present, remove it otherwise
    pub fn set_opt<V: Into<AttributeValue>>(&mut self, key: &str, value: Option<V>) {
        match value {
            Some(v) => self.set(key, v),
            None => {
                self.attributes.remove(key);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }
}
