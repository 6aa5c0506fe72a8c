use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::EntryPath;

const SCHEME_SEPARATOR: &str = "://";
const ENTRY_SEPARATOR: &str = "!/";

/// Normalized key identifying one backing store: `<scheme>://<path>`.
///
/// Two locators naming the same physical root compare equal: separators are
/// unified and collapsed, `.` and `..` are resolved, trailing slashes are
/// dropped and relative paths are made absolute against the working
/// directory. Scheme and path case are preserved.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootLocator {
    scheme: String,
    path: String,
}

impl RootLocator {
    /// Parse and normalize a `<scheme>://<path>` string.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let (scheme, rest) = input
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| TypeError::InvalidLocator {
                input: input.to_string(),
                reason: "missing \"://\"".into(),
            })?;
        Self::new(scheme, rest)
    }

    /// Build a locator from a scheme and a backing path.
    pub fn new(scheme: &str, path: &str) -> Result<Self, TypeError> {
        validate_scheme(scheme)?;
        let path = normalize_backing_path(path).map_err(|reason| TypeError::InvalidLocator {
            input: format!("{scheme}{SCHEME_SEPARATOR}{path}"),
            reason,
        })?;
        Ok(Self {
            scheme: scheme.to_string(),
            path,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The normalized, absolute backing path (always starts with `/`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The backing path as a host filesystem path.
    pub fn to_path_buf(&self) -> PathBuf {
        match self.path.strip_prefix('/') {
            Some(rest) if is_drive_prefix(rest.split('/').next().unwrap_or("")) => {
                PathBuf::from(rest)
            }
            _ => PathBuf::from(&self.path),
        }
    }

    /// URI naming `entry` inside this root.
    pub fn file_uri(&self, entry: &EntryPath) -> FileUri {
        FileUri {
            root: self.clone(),
            entry: entry.clone(),
        }
    }
}

impl fmt::Debug for RootLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootLocator({self})")
    }
}

impl fmt::Display for RootLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCHEME_SEPARATOR}{}", self.scheme, self.path)
    }
}

impl FromStr for RootLocator {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RootLocator {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RootLocator> for String {
    fn from(locator: RootLocator) -> Self {
        locator.to_string()
    }
}

/// A root locator plus the path of one entry inside it.
///
/// Written `<scheme>://<backing-path>!/<entry-path>`. The first `!/` ends the
/// backing path, so a backing path may contain `!` but not `!/`. Without an
/// entry part (or with a bare trailing `!`) the URI names the store root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileUri {
    pub root: RootLocator,
    pub entry: EntryPath,
}

impl FileUri {
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let (scheme, rest) = input
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| TypeError::InvalidLocator {
                input: input.to_string(),
                reason: "missing \"://\"".into(),
            })?;
        let (backing, entry) = match rest.split_once(ENTRY_SEPARATOR) {
            Some((backing, entry)) => (backing, EntryPath::parse(entry)?),
            None => (rest.strip_suffix('!').unwrap_or(rest), EntryPath::root()),
        };
        Ok(Self {
            root: RootLocator::new(scheme, backing)?,
            entry,
        })
    }
}

impl fmt::Display for FileUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entry.is_root() {
            write!(f, "{}", self.root)
        } else {
            write!(f, "{}{ENTRY_SEPARATOR}{}", self.root, self.entry.as_str())
        }
    }
}

impl FromStr for FileUri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_scheme(scheme: &str) -> Result<(), TypeError> {
    let mut chars = scheme.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(TypeError::InvalidScheme(scheme.to_string()))
    }
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn normalize_backing_path(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() {
        return Err("empty backing path".into());
    }
    if raw.contains('\0') {
        return Err("backing path contains NUL".into());
    }
    let unified = raw.replace('\\', "/");
    let first = unified.split('/').next().unwrap_or("");
    let absolute = if unified.starts_with('/') || is_drive_prefix(first) {
        unified
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| format!("cannot resolve relative path: {e}"))?;
        format!("{}/{}", cwd.to_string_lossy().replace('\\', "/"), unified)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in absolute.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}
