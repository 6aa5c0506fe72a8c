//! Conventional mapping between class/resource names and entry paths.

use crate::error::TypeError;
use crate::path::EntryPath;

const CLASS_SUFFIX: &str = ".class";

/// Map a binary class name (`org.example.Foo`, `org.example.Foo$Inner`) to
/// the entry path of its class file (`org/example/Foo.class`).
pub fn class_path_for(class_name: &str) -> Result<EntryPath, TypeError> {
    let name = class_name.trim();
    let invalid = |reason: &str| TypeError::InvalidPath {
        input: class_name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("empty class name"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("class name contains a path separator"));
    }
    if name.split('.').any(str::is_empty) {
        return Err(invalid("class name has an empty segment"));
    }
    EntryPath::parse(&format!("{}{CLASS_SUFFIX}", name.replace('.', "/")))
}

/// Map a resource name (`META-INF/services/x`, `/config.toml`) to its entry
/// path. A leading `/` is ignored.
pub fn resource_path_for(resource_name: &str) -> Result<EntryPath, TypeError> {
    EntryPath::parse(resource_name)
}

/// Inverse of [`class_path_for`] for paths ending in `.class`.
pub fn class_name_for(path: &EntryPath) -> Option<String> {
    path.as_str()
        .strip_suffix(CLASS_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.replace('/', "."))
}
