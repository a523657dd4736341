//! Cached fragment entries and their wire shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Auxiliary payload captured alongside rendered markup.
///
/// `container_data` carries cross-cutting page metadata mutations and
/// `required_externals` carries asset declarations, both produced as side
/// effects of the regeneration and replayed on cache hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheExtra {
    #[serde(
        rename = "containerData",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    pub container_data: Map<String, Value>,
    #[serde(
        rename = "requiredExternals",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub required_externals: BTreeMap<String, Vec<String>>,
}

impl CacheExtra {
    pub fn is_empty(&self) -> bool {
        self.container_data.is_empty() && self.required_externals.is_empty()
    }
}

/// A rendered fragment as stored: markup, write timestamp (epoch seconds)
/// and the auxiliary payload. A write always replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub html: String,
    pub time: i64,
    #[serde(default, skip_serializing_if = "CacheExtra::is_empty")]
    pub extra: CacheExtra,
}

impl CacheEntry {
    pub fn new(html: impl Into<String>, time: i64) -> Self {
        Self {
            html: html.into(),
            time,
            extra: CacheExtra::default(),
        }
    }

    pub fn with_extra(mut self, extra: CacheExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Age of the entry relative to the supplied request time.
    pub fn age(&self, now: i64) -> i64 {
        now - self.time
    }
}
