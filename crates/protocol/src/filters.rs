use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of a remote resource collection (`prices`, `suppliers`, ...).
///
/// The set is open: collections are created server-side and the client treats
/// them as opaque identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection(String);

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Collection {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A set of field constraints, all ANDed together.
///
/// Backed by a `BTreeMap` with sorted value lists so that two logically
/// identical filter sets always canonicalize to the same bytes, no matter the
/// insertion order. That property is what makes channel dedup work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    fields: BTreeMap<String, Vec<String>>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accepted value for a field. Values are kept sorted and deduped.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let values = self.fields.entry(field.into()).or_default();
        let value = value.into();
        if let Err(pos) = values.binary_search(&value) {
            values.insert(pos, value);
        }
    }

    /// Builder-style `insert`.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, values)| (field.as_str(), values.as_slice()))
    }

    /// Whether a payload record satisfies every field constraint.
    ///
    /// A field matches when the payload carries it as a string equal to one of
    /// the accepted values. Missing or non-string fields do not match.
    #[must_use]
    pub fn matches(&self, payload: &serde_json::Value) -> bool {
        self.fields.iter().all(|(field, values)| {
            payload
                .get(field)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|v| values.iter().any(|accepted| accepted == v))
        })
    }

    /// Canonical JSON form: keys sorted (BTreeMap order), values sorted on
    /// insert. Byte-identical for logically identical filter sets.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Canonical identifier of a (collection, filter set) pair.
///
/// At most one live transport channel exists per key; see the registry in
/// `tradesync-channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    #[must_use]
    pub fn new(collection: &Collection, filters: &FilterSet) -> Self {
        Self(format!("{}:{}", collection, filters.canonical_json()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
