//! Content extraction capability
//!
//! Extraction is a pluggable capability consumed by the fetch pipeline: it
//! takes raw bytes plus a content type and returns a structured document
//! with an outbound link list. Implementations must not fail - internal
//! errors populate `Document::error` and leave the content fields empty.
//!
//! The crate ships a scraper-backed HTML extractor; PDF extraction can be
//! plugged in the same way or left absent, in which case PDF payloads yield
//! an unsupported document.

mod html;

pub use html::HtmlExtractor;

use url::Url;

/// A structured document produced by content extraction
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub url: String,
    pub title: Option<String>,
    pub full_text: Option<String>,
    pub main_content: Option<String>,
    pub secondary_content: Option<String>,
    pub links: Vec<ExtractedLink>,
    pub content_type: Option<String>,
    pub error: Option<String>,
}

impl Document {
    /// An empty document for content types no extractor handles
    pub fn unsupported(source_url: &Url, content_type: &str) -> Self {
        Self {
            url: source_url.to_string(),
            content_type: Some(content_type.to_string()),
            ..Self::default()
        }
    }
}

/// An outbound link discovered in a document
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    /// Absolute URL, resolved against the source page
    pub url: String,

    /// Whether the link stays on the crawl's base host
    pub is_internal: bool,

    /// Anchor text, when present and non-empty
    pub text: Option<String>,
}

/// Turns a fetched payload into a structured document
pub trait ContentExtractor: Send + Sync {
    /// Extracts content; must not fail. On internal errors the returned
    /// document carries `error` and empty content fields.
    fn extract(&self, payload: &[u8], content_type: &str, source_url: &Url) -> Document;
}

/// Routes payloads to an extractor by normalized MIME type
pub struct ExtractorSet {
    html: Box<dyn ContentExtractor>,
    pdf: Option<Box<dyn ContentExtractor>>,
}

impl ExtractorSet {
    pub fn new(html: Box<dyn ContentExtractor>) -> Self {
        Self { html, pdf: None }
    }

    /// Registers a PDF extractor; without one, PDF payloads produce an
    /// unsupported document
    pub fn with_pdf(mut self, pdf: Box<dyn ContentExtractor>) -> Self {
        self.pdf = Some(pdf);
        self
    }

    /// Dispatches on the (case-normalized) content type
    pub fn extract(&self, payload: &[u8], content_type: &str, source_url: &Url) -> Document {
        let mime = content_type.to_ascii_lowercase();

        if mime.contains("application/pdf") {
            return match &self.pdf {
                Some(extractor) => extractor.extract(payload, content_type, source_url),
                None => {
                    tracing::warn!("No PDF extractor registered for {}", source_url);
                    Document::unsupported(source_url, content_type)
                }
            };
        }

        if mime.contains("text/html") || mime.contains("application/xhtml+xml") {
            return self.html.extract(payload, content_type, source_url);
        }

        tracing::debug!("Unsupported content type {} for {}", content_type, source_url);
        Document::unsupported(source_url, content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MarkerExtractor(&'static str);

    impl ContentExtractor for MarkerExtractor {
        fn extract(&self, _payload: &[u8], content_type: &str, source_url: &Url) -> Document {
            Document {
                url: source_url.to_string(),
                title: Some(self.0.to_string()),
                content_type: Some(content_type.to_string()),
                ..Document::default()
            }
        }
    }

    fn set() -> ExtractorSet {
        ExtractorSet::new(Box::new(MarkerExtractor("html")))
            .with_pdf(Box::new(MarkerExtractor("pdf")))
    }

    #[test]
    fn test_routes_html() {
        let url = Url::parse("http://example.com/").unwrap();
        let doc = set().extract(b"", "text/html; charset=utf-8", &url);
        assert_eq!(doc.title.as_deref(), Some("html"));
    }

    #[test]
    fn test_routes_xhtml() {
        let url = Url::parse("http://example.com/").unwrap();
        let doc = set().extract(b"", "application/xhtml+xml", &url);
        assert_eq!(doc.title.as_deref(), Some("html"));
    }

    #[test]
    fn test_routes_pdf() {
        let url = Url::parse("http://example.com/doc.pdf").unwrap();
        let doc = set().extract(b"", "Application/PDF", &url);
        assert_eq!(doc.title.as_deref(), Some("pdf"));
    }

    #[test]
    fn test_missing_pdf_extractor_yields_unsupported() {
        let url = Url::parse("http://example.com/doc.pdf").unwrap();
        let set = ExtractorSet::new(Box::new(MarkerExtractor("html")));
        let doc = set.extract(b"", "application/pdf", &url);
        assert!(doc.title.is_none());
        assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_unknown_type_yields_unsupported() {
        let url = Url::parse("http://example.com/x").unwrap();
        let doc = set().extract(b"", "application/octet-stream", &url);
        assert!(doc.title.is_none());
        assert!(doc.links.is_empty());
    }
}
