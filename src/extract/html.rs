use crate::config::ExtractConfig;
use crate::extract::{ContentExtractor, Document, ExtractedLink};
use scraper::{Html, Selector};
use url::Url;

/// Scraper-backed HTML extractor
///
/// Produces the page title, a whitespace-normalized full text, optional
/// main/secondary content blocks selected by configured CSS selectors, and
/// the outbound link list with internal/external classification.
pub struct HtmlExtractor {
    base_host: String,
    main_selector: Option<Selector>,
    secondary_selector: Option<Selector>,
}

impl HtmlExtractor {
    /// Builds an extractor scoped to `base_url`'s host
    ///
    /// Invalid configured selectors are logged and ignored rather than
    /// failing construction.
    pub fn new(base_url: &Url, config: &ExtractConfig) -> Self {
        Self {
            base_host: base_url.host_str().unwrap_or_default().to_lowercase(),
            main_selector: parse_selector(config.main_content_selector.as_deref()),
            secondary_selector: parse_selector(config.secondary_content_selector.as_deref()),
        }
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, payload: &[u8], content_type: &str, source_url: &Url) -> Document {
        let html = String::from_utf8_lossy(payload);
        let document = Html::parse_document(&html);

        let title = extract_title(&document);
        let full_text = extract_body_text(&document);
        let main_content = self
            .main_selector
            .as_ref()
            .and_then(|sel| select_text(&document, sel));
        let secondary_content = self
            .secondary_selector
            .as_ref()
            .and_then(|sel| select_text(&document, sel));
        let links = self.extract_links(&document, source_url);

        Document {
            url: source_url.to_string(),
            title,
            full_text,
            main_content,
            secondary_content,
            links,
            content_type: Some(content_type.to_string()),
            error: None,
        }
    }
}

impl HtmlExtractor {
    fn extract_links(&self, document: &Html, source_url: &Url) -> Vec<ExtractedLink> {
        let mut links = Vec::new();

        if let Ok(selector) = Selector::parse("a[href]") {
            for element in document.select(&selector) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                let Some(absolute) = resolve_link(href, source_url) else {
                    continue;
                };

                let is_internal = Url::parse(&absolute)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(&self.base_host)))
                    .unwrap_or(false);

                let text = clean_text(&element.text().collect::<String>());
                links.push(ExtractedLink {
                    url: absolute,
                    is_internal,
                    text: if text.is_empty() { None } else { Some(text) },
                });
            }
        }

        links
    }
}

fn parse_selector(raw: Option<&str>) -> Option<Selector> {
    let raw = raw?;
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(_) => {
            tracing::warn!("Ignoring invalid content selector: {}", raw);
            None
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_body_text(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Collapses whitespace runs so text reads as continuous prose
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href to an absolute http(s) URL, excluding non-navigable
/// links (scripts, mail, data URIs, same-page anchors)
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HtmlExtractor {
        let base = Url::parse("http://example.com/").unwrap();
        HtmlExtractor::new(
            &base,
            &ExtractConfig {
                main_content_selector: Some("section.content".to_string()),
                secondary_content_selector: None,
            },
        )
    }

    fn extract(html: &str) -> Document {
        let url = Url::parse("http://example.com/page").unwrap();
        extractor().extract(html.as_bytes(), "text/html", &url)
    }

    #[test]
    fn test_title_and_text() {
        let doc = extract(
            "<html><head><title>  Hello  World </title></head>\
             <body><p>Some   body\ntext</p></body></html>",
        );
        assert_eq!(doc.title.as_deref(), Some("Hello World"));
        assert_eq!(doc.full_text.as_deref(), Some("Some body text"));
    }

    #[test]
    fn test_main_content_selector() {
        let doc = extract(
            "<html><body><nav>menu</nav>\
             <section class=\"content\">the   article</section></body></html>",
        );
        assert_eq!(doc.main_content.as_deref(), Some("the article"));
    }

    #[test]
    fn test_links_resolved_and_classified() {
        let doc = extract(
            r##"<html><body>
            <a href="/about">About us</a>
            <a href="http://other.com/x">Elsewhere</a>
            <a href="mailto:hi@example.com">Mail</a>
            <a href="#top">Top</a>
            </body></html>"##,
        );

        assert_eq!(doc.links.len(), 2);
        assert_eq!(doc.links[0].url, "http://example.com/about");
        assert!(doc.links[0].is_internal);
        assert_eq!(doc.links[0].text.as_deref(), Some("About us"));
        assert_eq!(doc.links[1].url, "http://other.com/x");
        assert!(!doc.links[1].is_internal);
    }

    #[test]
    fn test_download_links_skipped() {
        let doc = extract(r#"<a href="/file.zip" download>Get it</a>"#);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_garbage_input_does_not_fail() {
        let url = Url::parse("http://example.com/").unwrap();
        let doc = extractor().extract(&[0xff, 0xfe, 0x00], "text/html", &url);
        assert!(doc.error.is_none());
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_invalid_selector_ignored() {
        let base = Url::parse("http://example.com/").unwrap();
        let extractor = HtmlExtractor::new(
            &base,
            &ExtractConfig {
                main_content_selector: Some(":::not-a-selector".to_string()),
                secondary_content_selector: None,
            },
        );
        let url = Url::parse("http://example.com/").unwrap();
        let doc = extractor.extract(b"<html><body>x</body></html>", "text/html", &url);
        assert!(doc.main_content.is_none());
        assert_eq!(doc.full_text.as_deref(), Some("x"));
    }
}
