use std::fmt;

use serde::{Deserialize, Serialize};

/// Hierarchical resource address such as `managed/user/123`.
///
/// Paths are immutable; every operation returns a new path. Empty segments
/// (leading, trailing or doubled `/`) are dropped when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path without its last segment; `None` for the empty path.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn child(&self, segment: impl Into<String>) -> ResourcePath {
        let mut segments = self.segments.clone();
        segments.extend(ResourcePath::parse(&segment.into()).segments);
        Self { segments }
    }

    pub fn concat(&self, other: &ResourcePath) -> ResourcePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Segment-wise prefix test: `foo` is a prefix of `foo/bar` but not of `foobar`.
    pub fn starts_with(&self, prefix: &ResourcePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments.iter().zip(&prefix.segments).all(|(a, b)| a == b)
    }

    /// Split an instance path into its type path and identifier.
    pub fn split_instance(&self) -> Option<(ResourcePath, &str)> {
        match (self.parent(), self.leaf()) {
            (Some(parent), Some(id)) => Some((parent, id)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for ResourcePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for ResourcePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_segments() {
        let path = ResourcePath::parse("/managed//user/");
        assert_eq!(path.segments(), &["managed".to_string(), "user".to_string()]);
        assert_eq!(path.to_string(), "managed/user");
    }

    #[test]
    fn parent_leaf_child_concat() {
        let path = ResourcePath::parse("managed/user/123");
        assert_eq!(path.leaf(), Some("123"));
        assert_eq!(path.parent(), Some(ResourcePath::parse("managed/user")));
        assert_eq!(ResourcePath::empty().parent(), None);

        let repo = ResourcePath::parse("repo/generic");
        assert_eq!(repo.child("abc").to_string(), "repo/generic/abc");
        assert_eq!(repo.concat(&ResourcePath::parse("a/b")).to_string(), "repo/generic/a/b");
        // the original is untouched
        assert_eq!(repo.to_string(), "repo/generic");
    }

    #[test]
    fn prefix_matching_is_segment_wise() {
        let path = ResourcePath::parse("foo/bar/baz");
        assert!(path.starts_with(&ResourcePath::parse("foo")));
        assert!(path.starts_with(&ResourcePath::parse("foo/bar")));
        assert!(path.starts_with(&ResourcePath::empty()));
        assert!(!ResourcePath::parse("foobar").starts_with(&ResourcePath::parse("foo")));
    }

    #[test]
    fn split_instance_needs_two_parts() {
        let path = ResourcePath::parse("user/u1");
        let (type_path, id) = path.split_instance().unwrap();
        assert_eq!(type_path.to_string(), "user");
        assert_eq!(id, "u1");
        assert!(ResourcePath::empty().split_instance().is_none());
    }

    #[test]
    fn serializes_as_string() {
        let path = ResourcePath::parse("managed/user");
        assert_eq!(serde_json::to_value(&path).unwrap(), serde_json::json!("managed/user"));
        let back: ResourcePath = serde_json::from_value(serde_json::json!("/a/b")).unwrap();
        assert_eq!(back, ResourcePath::parse("a/b"));
    }
}
