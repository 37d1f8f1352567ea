//! Pure path helpers shared by the client and the daemon.
//!
//! Grounded in `global/path_util.cpp` of the original GekkoFS sources: same
//! semantics, same edge cases (trailing slash handling, `..`-free component
//! splitting), expressed over `&str`/`String` instead of `std::string`.

pub const SEPARATOR: char = '/';

pub fn is_relative(path: &str) -> bool {
    !path.is_empty() && !path.starts_with(SEPARATOR)
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

pub fn has_trailing_slash(path: &str) -> bool {
    !path.is_empty() && path.ends_with(SEPARATOR)
}

/// `prepend_path("/tmp/prefix", "./my/path") == "/tmp/prefix/./my/path"`
///
/// Panics if `prefix` itself carries a trailing slash, matching the
/// original's `assert(!has_trailing_slash(prefix_path))`.
pub fn prepend_path(prefix: &str, raw_path: &str) -> String {
    assert!(!has_trailing_slash(prefix));
    let mut res = String::with_capacity(prefix.len() + 1 + raw_path.len());
    res.push_str(prefix);
    res.push(SEPARATOR);
    res.push_str(raw_path);
    res
}

/// Splits a path into its non-empty components.
///
/// `split_path("/first/second/third") == ["first", "second", "third"]`
pub fn split_path(path: &str) -> Vec<String> {
    let trimmed = if path.starts_with(SEPARATOR) { &path[1..] } else { path };
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(SEPARATOR).map(str::to_string).collect()
}

/// Rewrites `absolute_path` relative to `root_path`.
///
/// Returns `None` if `absolute_path` does not start with `root_path`.
/// Returns `Some("/")` if the two are equal. Trailing slash is stripped
/// from the result unless the result is exactly `"/"`.
pub fn absolute_to_relative(root_path: &str, absolute_path: &str) -> Option<String> {
    assert!(is_absolute(root_path));
    assert!(is_absolute(absolute_path));
    assert!(!has_trailing_slash(root_path));

    let rest = absolute_path.strip_prefix(root_path)?;
    if rest.is_empty() {
        return Some("/".to_string());
    }
    if !rest.starts_with(SEPARATOR) {
        // root_path matched a partial path component, e.g. "/mnt" vs "/mntfoo"
        return None;
    }
    if rest.len() > 1 && rest.ends_with(SEPARATOR) {
        Some(rest[..rest.len() - 1].to_string())
    } else {
        Some(rest.to_string())
    }
}

/// Returns the parent directory of `path`. `dirname("/a/b") == "/a"`,
/// `dirname("/a") == "/"`.
pub fn dirname(path: &str) -> String {
    assert!(path.len() > 1 || path.starts_with(SEPARATOR));
    assert!(path.len() == 1 || !has_trailing_slash(path));

    match path.rfind(SEPARATOR) {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => unreachable!("path must be absolute"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(is_absolute("/foo"));
        assert!(!is_absolute("foo"));
        assert!(is_relative("foo"));
        assert!(!is_relative("/foo"));
        assert!(has_trailing_slash("/foo/"));
        assert!(!has_trailing_slash("/foo"));
    }

    #[test]
    fn prepend() {
        assert_eq!(prepend_path("/tmp/prefix", "./my/path"), "/tmp/prefix/./my/path");
    }

    #[test]
    fn split() {
        assert_eq!(split_path("/first/second/third"), vec!["first", "second", "third"]);
        assert_eq!(split_path("/"), Vec::<String>::new());
    }

    #[test]
    fn relativize() {
        assert_eq!(absolute_to_relative("/mnt", "/mnt"), Some("/".to_string()));
        assert_eq!(absolute_to_relative("/mnt", "/mnt/a/b"), Some("/a/b".to_string()));
        assert_eq!(absolute_to_relative("/mnt", "/mnt/a/b/"), Some("/a/b".to_string()));
        assert_eq!(absolute_to_relative("/mnt", "/other/a"), None);
        assert_eq!(absolute_to_relative("/mnt", "/mntfoo"), None);
    }

    #[test]
    fn dirname_cases() {
        assert_eq!(dirname("/a/b"), "/a");
        assert_eq!(dirname("/a"), "/");
    }
}
