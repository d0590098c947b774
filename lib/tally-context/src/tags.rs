//! Metric tags.
use std::fmt;

use serde::Serialize;

/// A single metric tag.
///
/// Tags are either bare (`production`) or key/value (`env:production`). The value portion may itself contain colons:
/// only the first colon separates the name from the value.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Returns the name of the tag.
    ///
    /// For bare tags, this is the entire tag.
    pub fn name(&self) -> &str {
        match self.0.split_once(':') {
            Some((name, _)) => name,
            None => &self.0,
        }
    }

    /// Returns the value of the tag, if it has one.
    pub fn value(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, value)| value)
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the tag and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A canonical set of tags.
///
/// Tags are sorted and deduplicated at construction, so two sets built from the same tags in any order compare equal
/// and hash identically. This is what makes context identity invariant to the tag ordering seen on the wire.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    /// Returns `true` if the tag set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tags in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the given tag is contained in the set.
    ///
    /// This matches the complete tag, rather than just the name.
    pub fn has_tag<T>(&self, tag: T) -> bool
    where
        T: AsRef<str>,
    {
        let tag = tag.as_ref();
        self.0.iter().any(|existing| existing.as_str() == tag)
    }

    /// Returns an iterator over the tags in canonical order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    /// Splits the reserved `host` and `device` tags out of the set.
    ///
    /// Returns the remaining tags plus the extracted values. A reserved tag with an empty value (`host:`) yields
    /// `Some("")`, letting callers distinguish "clear the field" from "not specified". When a reserved tag appears
    /// more than once, the last occurrence in canonical order wins.
    pub fn extract_reserved(self) -> (Self, Option<String>, Option<String>) {
        let mut hostname = None;
        let mut device = None;
        let mut remaining = Vec::with_capacity(self.0.len());

        for tag in self.0 {
            match (tag.name(), tag.value()) {
                ("host", Some(value)) => hostname = Some(value.to_string()),
                ("device", Some(value)) => device = Some(value.to_string()),
                _ => remaining.push(tag),
            }
        }

        (Self(remaining), hostname, device)
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags = iter.into_iter().collect::<Vec<_>>();
        tags.sort_unstable();
        tags.dedup();
        Self(tags)
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(Tag::from).collect()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_name_and_value() {
        let bare = Tag::from("production");
        assert_eq!(bare.name(), "production");
        assert_eq!(bare.value(), None);

        let keyed = Tag::from("env:production");
        assert_eq!(keyed.name(), "env");
        assert_eq!(keyed.value(), Some("production"));

        let colon_bearing = Tag::from("url:http://localhost:8080");
        assert_eq!(colon_bearing.name(), "url");
        assert_eq!(colon_bearing.value(), Some("http://localhost:8080"));
    }

    #[test]
    fn tag_set_is_canonical() {
        let forward = ["a:1", "b:2", "c"].into_iter().collect::<TagSet>();
        let reversed = ["c", "b:2", "a:1"].into_iter().collect::<TagSet>();
        let duplicated = ["b:2", "a:1", "c", "a:1"].into_iter().collect::<TagSet>();

        assert_eq!(forward, reversed);
        assert_eq!(forward, duplicated);
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn extract_reserved_tags() {
        let tags = ["env:prod", "host:myhost", "device:sda1"].into_iter().collect::<TagSet>();
        let (remaining, hostname, device) = tags.extract_reserved();

        assert_eq!(remaining.len(), 1);
        assert!(remaining.has_tag("env:prod"));
        assert_eq!(hostname.as_deref(), Some("myhost"));
        assert_eq!(device.as_deref(), Some("sda1"));
    }

    #[test]
    fn extract_reserved_empty_value() {
        let tags = ["host:", "env:prod"].into_iter().collect::<TagSet>();
        let (remaining, hostname, device) = tags.extract_reserved();

        assert_eq!(remaining.len(), 1);
        assert_eq!(hostname.as_deref(), Some(""));
        assert_eq!(device, None);
    }

    #[test]
    fn bare_reserved_name_is_not_extracted() {
        // `host` without a value is an ordinary tag, not a reserved one.
        let tags = ["host", "env:prod"].into_iter().collect::<TagSet>();
        let (remaining, hostname, _) = tags.extract_reserved();

        assert_eq!(remaining.len(), 2);
        assert_eq!(hostname, None);
    }
}
