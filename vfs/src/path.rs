//! VFS path helpers.

use crate::VfsError;

/// Normalize a VFS path.
///
/// Backslashes become forward slashes, empty and `.` segments are dropped,
/// and leading/trailing slashes disappear. `..` is rejected outright.
///
/// Returns `Err(VfsError::InvalidPath)` if the path is empty after
/// normalization or contains `..`.
pub fn normalize(path: &str) -> Result<String, VfsError> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();

    for segment in replaced.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(VfsError::InvalidPath(format!(
                    "path traversal (..) not allowed: {path}"
                )));
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(VfsError::InvalidPath("empty path".into()));
    }

    Ok(segments.join("/"))
}

/// Removes a leading directory prefix such as `SourceData/` from a
/// normalized path. Paths outside that directory are returned unchanged.
pub fn strip_root<'a>(path: &'a str, root: &str) -> &'a str {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path;
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}

/// Split a normalized path into source name and remainder.
///
/// The path must already be normalized (no leading slash, no `..`).
pub(crate) fn split_source(path: &str) -> (&str, &str) {
    path.split_once('/').unwrap_or((path, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_cleans_separators() {
        assert_eq!(normalize("/levels//one/./main.wscn").unwrap(), "levels/one/main.wscn");
        assert_eq!(normalize("levels\\one\\").unwrap(), "levels/one");
        assert_eq!(normalize("file.txt").unwrap(), "file.txt");
    }

    #[test]
    fn normalize_rejects_traversal_and_empty() {
        assert!(normalize("levels/../secret.txt").is_err());
        assert!(normalize("").is_err());
        assert!(normalize("///").is_err());
        assert!(normalize("././.").is_err());
    }

    #[test]
    fn strip_root_only_whole_segments() {
        assert_eq!(strip_root("SourceData/Prefabs/lamp.json", "SourceData/"), "Prefabs/lamp.json");
        assert_eq!(strip_root("SourceDataX/lamp.json", "SourceData"), "SourceDataX/lamp.json");
        assert_eq!(strip_root("Prefabs/lamp.json", "SourceData"), "Prefabs/lamp.json");
        assert_eq!(strip_root("Prefabs/lamp.json", ""), "Prefabs/lamp.json");
    }

    #[test]
    fn split_source_parts() {
        assert_eq!(split_source("assets/textures/brick.png"), ("assets", "textures/brick.png"));
        assert_eq!(split_source("file.txt"), ("file.txt", ""));
    }
}
