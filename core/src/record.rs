//! Record entities returned by lookups.
//!
//! # Design
//! A record is an ordered string-to-string attribute map plus a shared,
//! immutable reference to the descriptor of the class it belongs to. Keys
//! are normalized to owned strings when they enter the map, so callers may
//! look them up with any `&str`. Attribute access by name is explicit:
//! `get` for indexed access, `attribute` for a read that must succeed, and
//! `invoke` for the legacy `name` / `name=` / `name?` accessor rules.

use std::fmt;
use std::sync::Arc;

use crate::error::AtomicsError;
use crate::resource::ResourceDescriptor;

/// Longest string value shown in full by `Debug`.
const INSPECT_LIMIT: usize = 50;

/// Insertion-ordered attribute map. Re-inserting a key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        attributes.extend(iter);
        attributes
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Attributes {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// How a dynamic accessor name is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor<'a> {
    /// `name`: read, failing when the attribute is absent.
    Read(&'a str),
    /// `name=`: assign.
    Write(&'a str),
    /// `name?`: the raw attribute value (not a boolean), absent is `None`.
    Query(&'a str),
}

impl<'a> Accessor<'a> {
    pub fn parse(accessor: &'a str) -> Self {
        if let Some(name) = accessor.strip_suffix('=') {
            Accessor::Write(name)
        } else if let Some(name) = accessor.strip_suffix('?') {
            Accessor::Query(name)
        } else {
            Accessor::Read(accessor)
        }
    }
}

/// One row returned by the service.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<ResourceDescriptor>,
    attributes: Attributes,
}

impl Record {
    pub fn new(descriptor: Arc<ResourceDescriptor>, attributes: Attributes) -> Self {
        Self {
            descriptor,
            attributes,
        }
    }

    /// Merge more attributes into this record.
    pub fn load<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.extend(attributes);
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Indexed access; `None` when the attribute is missing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    /// Read an attribute that must exist.
    pub fn attribute(&self, name: &str) -> Result<&str, AtomicsError> {
        self.attributes
            .get(name)
            .ok_or_else(|| AtomicsError::NoSuchAttribute(name.to_string()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name, value);
    }

    /// Apply a dynamic accessor. A write without a value stores the empty
    /// string; every form returns the resulting value.
    pub fn invoke(&mut self, accessor: &str, value: Option<String>) -> Result<Option<String>, AtomicsError> {
        match Accessor::parse(accessor) {
            Accessor::Write(name) => {
                let value = value.unwrap_or_default();
                self.set(name, value.clone());
                Ok(Some(value))
            }
            Accessor::Query(name) => Ok(self.get(name).map(str::to_string)),
            Accessor::Read(name) => self.attribute(name).map(|v| Some(v.to_string())),
        }
    }

    /// Integer value of the primary-key attribute; 0 when absent or
    /// non-numeric.
    pub fn id(&self) -> i64 {
        self.attributes
            .get(self.descriptor.primary_key())
            .map(integer_prefix)
            .unwrap_or(0)
    }

    pub fn to_key(&self) -> [i64; 1] {
        [self.id()]
    }

    /// The raw primary-key text, for building routes.
    pub fn to_param(&self) -> Option<&str> {
        self.attributes.get(self.descriptor.primary_key())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}", self.descriptor.name())?;
        for (i, (k, v)) in self.attributes.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{k}: {}", value_for_inspect(v))?;
        }
        write!(f, ">")
    }
}

fn value_for_inspect(value: &str) -> String {
    if value.chars().count() > INSPECT_LIMIT {
        let head: String = value.chars().take(INSPECT_LIMIT + 1).collect();
        format!("{:?}", format!("{head}..."))
    } else {
        format!("{value:?}")
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits with
/// single underscores between them. Stops at the first other character.
fn integer_prefix(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut n: i64 = 0;
    let mut prev_digit = false;
    let mut bytes = digits.bytes().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'0'..=b'9' => {
                let d = i64::from(b - b'0');
                n = if negative {
                    n.saturating_mul(10).saturating_sub(d)
                } else {
                    n.saturating_mul(10).saturating_add(d)
                };
                prev_digit = true;
            }
            b'_' if prev_digit && bytes.peek().is_some_and(u8::is_ascii_digit) => {
                prev_digit = false;
            }
            _ => break,
        }
    }
    n
}
