use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::tags::TagSet;

/// A metric context.
///
/// A context is the unique identity of a metric series: the metric name, the canonical tag set, and the optional
/// hostname and device name. Two samples with the same parts map to the same context regardless of the order their
/// tags arrived in, since [`TagSet`] canonicalizes at construction.
///
/// Contexts are cheaply cloneable: the parts live behind an `Arc`, and the identity hash is computed once at
/// construction rather than on every map operation.
#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    name: String,
    tags: TagSet,
    hostname: Option<String>,
    device: Option<String>,
    key: u64,
}

impl Context {
    /// Creates a new `Context` from the given parts.
    pub fn new<S: Into<String>>(name: S, tags: TagSet, hostname: Option<String>, device: Option<String>) -> Self {
        let name = name.into();
        let key = hash_parts(&name, &tags, hostname.as_deref(), device.as_deref());
        Self {
            inner: Arc::new(ContextInner {
                name,
                tags,
                hostname,
                device,
                key,
            }),
        }
    }

    /// Creates a new `Context` from the given name and tags, with no hostname or device.
    pub fn from_name_and_tags<S: Into<String>>(name: S, tags: TagSet) -> Self {
        Self::new(name, tags, None, None)
    }

    /// Returns the name of this context.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the tags of this context.
    pub fn tags(&self) -> &TagSet {
        &self.inner.tags
    }

    /// Returns the hostname of this context.
    pub fn hostname(&self) -> Option<&str> {
        self.inner.hostname.as_deref()
    }

    /// Returns the device name of this context.
    pub fn device(&self) -> Option<&str> {
        self.inner.device.as_deref()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        // The key is a hash over all identity parts, so comparing it first lets us skip the field-by-field comparison
        // in the overwhelmingly common case of distinct contexts.
        self.inner.key == other.inner.key
            && self.inner.name == other.inner.name
            && self.inner.tags == other.inner.tags
            && self.inner.hostname == other.inner.hostname
            && self.inner.device == other.inner.device
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)?;
        if !self.inner.tags.is_empty() {
            write!(f, "{{")?;

            let mut needs_separator = false;
            for tag in &self.inner.tags {
                if needs_separator {
                    write!(f, ", ")?;
                } else {
                    needs_separator = true;
                }

                write!(f, "{}", tag)?;
            }

            write!(f, "}}")?;
        }

        if let Some(hostname) = &self.inner.hostname {
            write!(f, "@{}", hostname)?;
        }

        Ok(())
    }
}

fn hash_parts(name: &str, tags: &TagSet, hostname: Option<&str>, device: Option<&str>) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    for tag in tags {
        tag.hash(&mut hasher);
    }
    hostname.hash(&mut hasher);
    device.hash(&mut hasher);
    hasher.finish()
}
