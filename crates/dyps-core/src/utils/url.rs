//! Source URL normalization.
//!
//! Two manifests naming the same repository with cosmetic differences
//! (`https://GitHub.com/org/lib.git/` vs `https://github.com/org/lib`) must map
//! to the same `RepositoryId`.

/// Normalize a repository location
///
/// Trims whitespace, strips trailing `/` and a trailing `.git`, and lowercases
/// the scheme and host of `scheme://host/...` forms. Paths keep their case.
pub fn normalize_source_url(input: &str) -> String {
    let mut url = input.trim();

    loop {
        let stripped = url.trim_end_matches('/');
        let stripped = stripped.strip_suffix(".git").unwrap_or(stripped);
        if stripped.len() == url.len() {
            break;
        }
        url = stripped;
    }

    match url.split_once("://") {
        Some((scheme, rest)) => {
            let (authority, path) = match rest.find('/') {
                Some(index) => rest.split_at(index),
                None => (rest, ""),
            };
            format!(
                "{}://{}{}",
                scheme.to_ascii_lowercase(),
                lowercase_host(authority),
                path
            )
        },
        None => url.to_string(),
    }
}

/// Lowercase the host part of `user@host:port`, leaving user info untouched
fn lowercase_host(authority: &str) -> String {
    match authority.rsplit_once('@') {
        Some((user, host)) => format!("{}@{}", user, host.to_ascii_lowercase()),
        None => authority.to_ascii_lowercase(),
    }
}

/// Check if an identifier is a URL rather than a plain name
pub fn is_url(input: &str) -> bool {
    input.contains("://")
}

/// Last path segment of a location, the repository's short name
pub fn short_name(input: &str) -> &str {
    input
        .rsplit(|c| c == '/' || c == ':')
        .find(|segment| !segment.is_empty())
        .unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_git_suffix_and_slashes() {
        assert_eq!(
            normalize_source_url("https://github.com/org/lib.git"),
            "https://github.com/org/lib"
        );
        assert_eq!(
            normalize_source_url("https://github.com/org/lib/"),
            "https://github.com/org/lib"
        );
        assert_eq!(
            normalize_source_url("https://github.com/org/lib.git/"),
            "https://github.com/org/lib"
        );
    }

    #[test]
    fn test_lowercases_scheme_and_host_only() {
        assert_eq!(
            normalize_source_url("HTTPS://GitHub.COM/Org/Lib"),
            "https://github.com/Org/Lib"
        );
        assert_eq!(
            normalize_source_url("ssh://Git@Example.ORG:2222/Team/Repo.git"),
            "ssh://Git@example.org:2222/Team/Repo"
        );
    }

    #[test]
    fn test_plain_names_are_trimmed() {
        assert_eq!(normalize_source_url("  lib-a  "), "lib-a");
        assert_eq!(normalize_source_url("Lib"), "Lib");
    }

    #[test]
    fn test_host_without_path() {
        assert_eq!(normalize_source_url("file://LOCALHOST/"), "file://localhost");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("https://github.com/org/lib"), "lib");
        assert_eq!(short_name("git@github.com:org/tool"), "tool");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a"));
        assert!(!is_url("a"));
    }
}
