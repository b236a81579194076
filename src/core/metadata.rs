//! Key/value metadata attached to archives, objects and properties.
//!
//! The serialized form is `key=value;key2=value2`, with `\`, `;` and `=`
//! escaped by a backslash. That string is what the interning table
//! deduplicates and what header blobs carry when a token is not available.

use smallvec::SmallVec;
use std::fmt;

/// Ordered key/value pairs. Setting an existing key replaces its value in place.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize to `key=value;...` form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            escape_into(&mut out, k);
            out.push('=');
            escape_into(&mut out, v);
        }
        out
    }

    /// Parse the serialized form. Entries without `=` or with an empty key
    /// are skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        for part in split_unescaped(s, ';') {
            let Some(eq) = find_unescaped(part, '=') else {
                continue;
            };
            let key = unescape(&part[..eq]);
            if !key.is_empty() {
                meta.set(key, unescape(&part[eq + 1..]));
            }
        }
        meta
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | ';' | '=')) => out.push(next),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Byte offset of the first `sep` not preceded by an odd run of backslashes.
fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(i) = find_unescaped(rest, sep) {
        parts.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut meta = MetaData::new();
        meta.set("schema", "AbcGeom_Xform_v3");
        meta.set("interpretation", "matrix");
        meta.set("schema", "AbcGeom_PolyMesh_v1");
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("schema"), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(meta.serialize(), "schema=AbcGeom_PolyMesh_v1;interpretation=matrix");
    }

    #[test]
    fn test_parse() {
        let meta = MetaData::parse("schema=AbcGeom_PolyMesh_v1;interpretation=point");
        assert_eq!(meta.get("schema"), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(meta.get("interpretation"), Some("point"));
        assert!(MetaData::parse("").is_empty());
        assert!(MetaData::parse("novalue;=orphan").is_empty());
    }

    #[test]
    fn test_escaped_separators_survive() {
        let meta = MetaData::new().with("key=with;special", "value\\with=;");
        let parsed = MetaData::parse(&meta.serialize());
        assert_eq!(parsed, meta);
    }
}
