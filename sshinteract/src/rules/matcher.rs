//! Content matchers for interaction rules.

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;
use memchr::memmem;
use regex::bytes::Regex;

/// Trait for content matching - substring, regex, or custom predicates.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Match against event content, returning captured data on success.
    fn match_content(&self, content: &[u8]) -> Option<Captures>;

    /// Check if the content matches.
    fn is_match(&self, content: &[u8]) -> bool {
        self.match_content(content).is_some()
    }
}

/// Data captured by a successful match, handed to the rule's action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    /// The whole matched region (group 0).
    matched: Bytes,

    /// Numbered groups starting at 1; `None` for groups that did not participate.
    groups: Vec<Option<Bytes>>,

    /// Named groups that participated in the match.
    named: IndexMap<String, Bytes>,
}

impl Captures {
    /// Captures holding only the matched region.
    pub fn matched_only(matched: impl Into<Bytes>) -> Self {
        Self {
            matched: matched.into(),
            ..Self::default()
        }
    }

    /// The whole matched region.
    pub fn matched(&self) -> &[u8] {
        &self.matched
    }

    /// Numbered group `i`; group 0 is the whole match.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        if i == 0 {
            return Some(&self.matched);
        }
        self.groups.get(i - 1).and_then(|g| g.as_deref())
    }

    /// Named group.
    pub fn name(&self, name: &str) -> Option<&[u8]> {
        self.named.get(name).map(|b| &b[..])
    }

    /// Named group as a string (lossy UTF-8).
    pub fn name_str(&self, name: &str) -> Option<String> {
        self.name(name)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Number of numbered groups, excluding group 0.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Plain substring matcher.
#[derive(Clone, PartialEq, Eq)]
pub struct Substring {
    needle: Vec<u8>,
}

impl Substring {
    /// Create a matcher for `needle`.
    pub fn new(needle: impl AsRef<[u8]>) -> Self {
        Self {
            needle: needle.as_ref().to_vec(),
        }
    }
}

impl fmt::Debug for Substring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Substring({:?})", String::from_utf8_lossy(&self.needle))
    }
}

impl Matcher for Substring {
    fn match_content(&self, content: &[u8]) -> Option<Captures> {
        memmem::find(content, &self.needle)
            .map(|_| Captures::matched_only(Bytes::copy_from_slice(&self.needle)))
    }
}

/// Regex-based matcher (the most common implementation).
impl Matcher for Regex {
    fn match_content(&self, content: &[u8]) -> Option<Captures> {
        let caps = Regex::captures(self, content)?;

        let groups = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|m| Bytes::copy_from_slice(m.as_bytes())))
            .collect();

        let named = self
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), Bytes::copy_from_slice(m.as_bytes())))
            })
            .collect();

        Some(Captures {
            matched: Bytes::copy_from_slice(&caps[0]),
            groups,
            named,
        })
    }
}

/// Matcher backed by an arbitrary predicate over the content.
pub struct Predicate<F> {
    predicate: F,
}

impl<F> Predicate<F>
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    /// Wrap a predicate.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

impl<F> Matcher for Predicate<F>
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn match_content(&self, content: &[u8]) -> Option<Captures> {
        (self.predicate)(content).then(|| Captures::matched_only(Bytes::copy_from_slice(content)))
    }
}
