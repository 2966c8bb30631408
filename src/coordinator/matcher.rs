use url::Url;

/// Checks if a host matches a wildcard domain pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: "hiring.example.com" matches only "hiring.example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain,
///    nested or not
///
/// Both sides are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use shiftwatch::coordinator::matches_wildcard;
///
/// assert!(matches_wildcard("hiring.example.com", "hiring.example.com"));
/// assert!(!matches_wildcard("hiring.example.com", "example.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "jobs.hiring.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}

/// Checks whether a tab URL is an http(s) page on the target domain
pub fn url_matches_domain(pattern: &str, url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    parsed
        .host_str()
        .is_some_and(|host| matches_wildcard(pattern, host))
}

/// A page URL on the target domain, used when a tab is opened locally
pub fn landing_url(pattern: &str) -> String {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    format!("https://{}/", base.to_ascii_lowercase())
}
