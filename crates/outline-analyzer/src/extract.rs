//! Tokenization and URL extraction from node content (spec §4.7 steps 1-3).

use url::Url;

/// One candidate URL found in a content string: its byte offset, byte
/// length, and the exact text as it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSpan {
    /// Byte offset of the URL's first byte.
    pub start_bytes: usize,
    /// Byte length of the URL token.
    pub size_bytes: usize,
    /// The URL text, verbatim.
    pub text: String,
}

/// Tokenize `content` on whitespace and retain only tokens that parse as an
/// absolute `http`/`https` URL with a non-empty host, in first-appearance
/// order. Byte offsets are into `content` as given.
pub fn extract_urls(content: &str) -> Vec<UrlSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0usize;
    for token in content.split_whitespace() {
        // `split_whitespace` discards the separators; recover this token's
        // real offset by searching forward from where the last one ended.
        let start = match content[cursor..].find(token) {
            Some(rel) => cursor + rel,
            None => continue,
        };
        cursor = start + token.len();

        if is_http_url(token) {
            spans.push(UrlSpan { start_bytes: start, size_bytes: token.len(), text: token.to_string() });
        }
    }
    spans
}

fn is_http_url(token: &str) -> bool {
    match Url::parse(token) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_url_with_correct_offset() {
        let content = "see https://example.test/page for details";
        let spans = extract_urls(content);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "https://example.test/page");
        assert_eq!(spans[0].start_bytes, 4);
        assert_eq!(&content[spans[0].start_bytes..spans[0].start_bytes + spans[0].size_bytes], "https://example.test/page");
    }

    #[test]
    fn ignores_non_http_schemes_and_bare_words() {
        let content = "mailto:a@b.test ftp://x.test plain-text http://ok.test";
        let spans = extract_urls(content);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "http://ok.test");
    }

    #[test]
    fn preserves_first_appearance_order_for_multiple_urls() {
        let content = "http://a.test then http://b.test";
        let spans = extract_urls(content);
        assert_eq!(spans.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(), vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn rejects_url_without_host() {
        let content = "http:///no-host";
        assert!(extract_urls(content).is_empty());
    }
}
