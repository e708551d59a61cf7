use url::Url;

/// Extracts the lowercase host from a parsed URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the lowercase host from a raw URL string
///
/// Returns None when the string does not parse or has no host, which callers
/// treat as "not rate-limitable / not classifiable" rather than an error.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(extract_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_host_of_raw_string() {
        assert_eq!(host_of("http://Example.COM/a"), Some("example.com".to_string()));
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("mailto:user@example.com"), None);
    }
}
