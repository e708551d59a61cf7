use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Normalizes a URL so equivalent forms compare equal
///
/// # Normalization Steps
///
/// 1. Parse the URL; on failure the input is returned unchanged
/// 2. Lowercase scheme and host, strip default ports (the `url` crate
///    guarantees both during parsing)
/// 3. Normalize the path:
///    - Remove dot segments (`.` and `..`)
///    - Collapse duplicate slashes
///    - Remove the trailing slash (except for the root `/`)
/// 4. Drop the fragment
/// 5. Keep only allow-listed query parameters, sorted by key
///
/// This function is pure and never panics; malformed input degrades to a
/// pass-through so a bad href cannot take down the pipeline.
///
/// # Arguments
///
/// * `raw` - The URL string to normalize
/// * `keep_params` - Query parameter names preserved during normalization
pub fn normalize_url(raw: &str, keep_params: &HashSet<String>) -> String {
    let mut url = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };

    if url.host_str().is_none() {
        return raw.to_string();
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let kept = filter_and_sort_query_params(&url, keep_params);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            let query = kept
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    url.to_string()
}

/// Hex-encoded SHA-256 of a normalized URL, used as the dedup/upsert key
pub fn url_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalizes a URL path by removing dot segments, duplicate slashes, and
/// the trailing slash (root excepted)
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Keeps only allow-listed query parameters, sorted by key
fn filter_and_sort_query_params(url: &Url, keep_params: &HashSet<String>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| keep_params.contains(key.as_ref()))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(params: &[&str]) -> HashSet<String> {
        params.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lowercase_scheme_and_host() {
        let result = normalize_url("HTTP://EXAMPLE.COM/Page", &keep(&[]));
        assert_eq!(result, "http://example.com/Page");
    }

    #[test]
    fn test_default_port_stripped() {
        let result = normalize_url("http://example.com:80/page", &keep(&[]));
        assert_eq!(result, "http://example.com/page");

        let result = normalize_url("https://example.com:443/page", &keep(&[]));
        assert_eq!(result, "https://example.com/page");
    }

    #[test]
    fn test_non_default_port_kept() {
        let result = normalize_url("http://example.com:8080/page", &keep(&[]));
        assert_eq!(result, "http://example.com:8080/page");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("http://example.com/page/", &keep(&[]));
        assert_eq!(result, "http://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("http://example.com/", &keep(&[]));
        assert_eq!(result, "http://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("http://example.com/page#section", &keep(&[]));
        assert_eq!(result, "http://example.com/page");
    }

    #[test]
    fn test_dot_segments_collapsed() {
        let result = normalize_url("http://example.com/a/../b/./c", &keep(&[]));
        assert_eq!(result, "http://example.com/b/c");
    }

    #[test]
    fn test_duplicate_slashes_collapsed() {
        let result = normalize_url("http://example.com///a//b", &keep(&[]));
        assert_eq!(result, "http://example.com/a/b");
    }

    #[test]
    fn test_query_allow_list_sorted() {
        let result = normalize_url(
            "http://x/y?id=1&foo=2&page=3",
            &keep(&["id", "page", "category"]),
        );
        assert_eq!(result, "http://x/y?id=1&page=3");
    }

    #[test]
    fn test_query_fully_filtered_drops_question_mark() {
        let result = normalize_url("http://example.com/page?utm_source=a", &keep(&["id"]));
        assert_eq!(result, "http://example.com/page");
    }

    #[test]
    fn test_malformed_input_passes_through() {
        let raw = "not a url";
        assert_eq!(normalize_url(raw, &keep(&[])), raw);
    }

    #[test]
    fn test_idempotence() {
        let params = keep(&["id", "page", "category"]);
        for raw in [
            "HTTP://EXAMPLE.COM:80/a/../b/?page=2&x=1#frag",
            "http://example.com/",
            "http://example.com/deep/path/?category=c&id=9",
            "not a url",
        ] {
            let once = normalize_url(raw, &params);
            let twice = normalize_url(&once, &params);
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_url_hash_is_stable_hex() {
        let h1 = url_hash("http://example.com/");
        let h2 = url_hash("http://example.com/");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, url_hash("http://example.com/other"));
    }
}
