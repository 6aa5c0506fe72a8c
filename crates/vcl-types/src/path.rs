use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Normalized path of an entry inside one backing store.
///
/// Segments are separated by `/`. There is no leading or trailing slash and
/// no empty, `.` or `..` segment. The empty path names the store root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryPath(String);

impl EntryPath {
    /// The store root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalize a path. A leading `/` is ignored and `\` is
    /// accepted as a separator. `..` may not climb above the root.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        if input.contains('\0') {
            return Err(TypeError::InvalidPath {
                input: input.to_string(),
                reason: "contains NUL".into(),
            });
        }
        let unified = input.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(TypeError::PathEscapesRoot(input.to_string()));
                    }
                }
                s => segments.push(s),
            }
        }
        Ok(Self(segments.join("/")))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over path segments. The root has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<EntryPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Resolve `relative` against this path.
    pub fn join(&self, relative: &str) -> Result<EntryPath, TypeError> {
        if self.is_root() {
            return Self::parse(relative);
        }
        Self::parse(&format!("{}/{}", self.0, relative))
    }

    /// Segment-wise prefix test. Every path starts with the root.
    pub fn starts_with(&self, prefix: &EntryPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes()[prefix.0.len()] == b'/')
    }
}

impl fmt::Debug for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryPath(/{})", self.0)
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl TryFrom<String> for EntryPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntryPath> for String {
    fn from(path: EntryPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_normalizes_separators_and_dots() {
        let p = EntryPath::parse("/org//apache/./vfs/../Foo.class").unwrap();
        assert_eq!(p.as_str(), "org/apache/Foo.class");
        assert_eq!(EntryPath::parse("a\\b\\c").unwrap().as_str(), "a/b/c");
        assert_eq!(EntryPath::parse("dir/").unwrap().as_str(), "dir");
    }

    #[test]
    fn empty_and_slash_are_root() {
        assert!(EntryPath::parse("").unwrap().is_root());
        assert!(EntryPath::parse("/").unwrap().is_root());
        assert!(EntryPath::parse("a/..").unwrap().is_root());
        assert_eq!(EntryPath::root().to_string(), "/");
    }

    #[test]
    fn escaping_root_is_rejected() {
        let err = EntryPath::parse("../etc/passwd").unwrap_err();
        assert!(matches!(err, TypeError::PathEscapesRoot(_)));
        assert!(EntryPath::parse("a/../../b").is_err());
    }

    #[test]
    fn nul_is_rejected() {
        assert!(matches!(
            EntryPath::parse("a\0b"),
            Err(TypeError::InvalidPath { .. })
        ));
    }

    #[test]
    fn parent_and_file_name() {
        let p = EntryPath::parse("org/apache/Foo.class").unwrap();
        assert_eq!(p.file_name(), Some("Foo.class"));
        let parent = p.parent().unwrap();
        assert_eq!(parent.as_str(), "org/apache");
        assert_eq!(parent.parent().unwrap().as_str(), "org");
        assert!(parent.parent().unwrap().parent().unwrap().is_root());
        assert!(EntryPath::root().parent().is_none());
        assert!(EntryPath::root().file_name().is_none());
    }

    #[test]
    fn join_resolves_relative_segments() {
        let base = EntryPath::parse("org/apache").unwrap();
        assert_eq!(base.join("vfs/A.class").unwrap().as_str(), "org/apache/vfs/A.class");
        assert_eq!(base.join("../B.class").unwrap().as_str(), "org/B.class");
        assert_eq!(EntryPath::root().join("x").unwrap().as_str(), "x");
    }

    #[test]
    fn starts_with_is_segment_aware() {
        let p = EntryPath::parse("org/apache/Foo.class").unwrap();
        assert!(p.starts_with(&EntryPath::parse("org").unwrap()));
        assert!(p.starts_with(&EntryPath::root()));
        assert!(!p.starts_with(&EntryPath::parse("or").unwrap()));
        assert!(p.starts_with(&p));
    }

    #[test]
    fn serde_uses_plain_string() {
        let p = EntryPath::parse("a/b").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"a/b\"");
        let back: EntryPath = serde_json::from_str("\"/a//b/\"").unwrap();
        assert_eq!(back, p);
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(segs in proptest::collection::vec("[a-zA-Z0-9_.$-]{1,8}", 0..6)) {
            let raw = segs.join("/");
            if let Ok(once) = EntryPath::parse(&raw) {
                let twice = EntryPath::parse(once.as_str()).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}
