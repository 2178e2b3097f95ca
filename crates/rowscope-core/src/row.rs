//! Row data as seen by a dynamic-data node.
//!
//! The node never owns its data. It asks a [`RowSource`] for the ordered key
//! sequence of a pass and resolves one [`KeyedItem`] per key when it binds a
//! row. Items are not retained past the binding that requested them.

use serde::{Deserialize, Serialize};

use crate::Value;

/// One row's data together with the key that identifies it within its node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedItem {
    pub key: String,
    pub value: Value,
}

impl KeyedItem {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Supplies rows to a dynamic-data node.
pub trait RowSource {
    /// Resolves `key` to its row, or `None` if the key is unknown.
    fn lookup(&self, key: &str) -> Option<KeyedItem>;

    /// Keys of every row, in processing order. Must be restartable: each
    /// phase of a request asks again.
    fn keys(&self) -> Vec<String>;
}

/// Row source backed by an in-memory list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VecSource {
    items: Vec<KeyedItem>,
}

impl VecSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.items.push(KeyedItem::new(key, value));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for VecSource {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|(key, value)| KeyedItem::new(key, value))
                .collect(),
        }
    }
}

impl RowSource for VecSource {
    fn lookup(&self, key: &str) -> Option<KeyedItem> {
        self.items.iter().find(|item| item.key == key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.items.iter().map(|item| item.key.clone()).collect()
    }
}
