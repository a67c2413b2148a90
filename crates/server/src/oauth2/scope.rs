//! Space-separated ordered lists (scopes, redirect URIs).
//!
//! The storage column holds the space-joined form; `SpaceList::decode` and
//! `SpaceList::encode` are the only conversions between the two.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, duplicate-free list of whitespace-free items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct SpaceList(Vec<String>);

impl SpaceList {
    /// Build from items, dropping empties and later duplicates.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for item in items {
            let item: String = item.into();
            let item = item.trim();
            if item.is_empty() || out.iter().any(|existing| existing == item) {
                continue;
            }
            out.push(item.to_string());
        }
        Self(out)
    }

    /// Parse the stored (or wire) space-joined form.
    pub fn decode(raw: &str) -> Self {
        Self::new(raw.split_whitespace())
    }

    /// Render the storage form.
    pub fn encode(&self) -> String {
        self.0.join(" ")
    }

    /// First item; for redirect URIs this is the client's default.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.iter().any(|i| i == item)
    }

    /// Every item of `self` is present in `other`.
    pub fn is_subset_of(&self, other: &SpaceList) -> bool {
        self.0.iter().all(|i| other.contains(i))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for SpaceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<String> for SpaceList {
    fn from(raw: String) -> Self {
        Self::decode(&raw)
    }
}

impl From<SpaceList> for String {
    fn from(list: SpaceList) -> Self {
        list.encode()
    }
}

impl<'a> FromIterator<&'a str> for SpaceList {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::new(iter)
    }
}
