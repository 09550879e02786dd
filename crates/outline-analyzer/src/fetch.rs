//! Best-effort HTTP metadata fetch for one URL (spec §4.7 step 4).
//!
//! The spec leaves metadata extraction unspecified beyond "title,
//! description, image"; this implements the simplest real version of that:
//! fetch the page, and if it looks like HTML, regex-scrape `<title>`, the
//! `description` meta tag, and `og:image`. A failed or non-HTML fetch
//! yields an empty metadata map rather than an error — spec §4.7 calls
//! these "logged best-effort failures", not job failures.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*name=["']description["'][^>]*content=["']([^"']*)["']"#).unwrap()
});
static OG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*property=["']og:image["'][^>]*content=["']([^"']*)["']"#).unwrap()
});

/// Fetch `url` and scrape whatever metadata the response yields, within
/// `timeout`. Never returns an error: network failures, non-2xx responses,
/// and non-HTML bodies all simply produce an empty map, with the failure
/// logged at `warn` (spec §4.7: "logged best-effort failures").
pub async fn fetch_metadata(client: &Client, url: &str, timeout: Duration) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();

    let response = match client.get(url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(%url, error = %err, "url metadata fetch failed");
            return metadata;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(%url, status = %response.status(), "url metadata fetch returned non-success status");
        return metadata;
    }

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html") || ct.contains("text/"))
        .unwrap_or(true);
    if !is_html {
        return metadata;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(%url, error = %err, "failed to read url metadata response body");
            return metadata;
        }
    };

    if let Some(caps) = TITLE_RE.captures(&body) {
        let title = caps[1].trim();
        if !title.is_empty() {
            metadata.insert("title".to_string(), Value::String(title.to_string()));
        }
    }
    if let Some(caps) = DESCRIPTION_RE.captures(&body) {
        metadata.insert("description".to_string(), Value::String(caps[1].trim().to_string()));
    }
    if let Some(caps) = OG_IMAGE_RE.captures(&body) {
        metadata.insert("image".to_string(), Value::String(caps[1].trim().to_string()));
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrapes_title_description_and_image() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(
                    r#"<html><head><title> Example Page </title>
                    <meta name="description" content="an example page">
                    <meta property="og:image" content="https://example.test/img.png">
                    </head></html>"#,
                )
                .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let client = Client::new();
        let metadata = fetch_metadata(&client, &server.uri(), Duration::from_secs(5)).await;
        assert_eq!(metadata.get("title").and_then(|v| v.as_str()), Some("Example Page"));
        assert_eq!(metadata.get("description").and_then(|v| v.as_str()), Some("an example page"));
        assert_eq!(metadata.get("image").and_then(|v| v.as_str()), Some("https://example.test/img.png"));
    }

    #[tokio::test]
    async fn non_success_status_yields_empty_metadata() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let metadata = fetch_metadata(&client, &server.uri(), Duration::from_secs(5)).await;
        assert!(metadata.is_empty());
    }

    #[tokio::test]
    async fn unreachable_host_yields_empty_metadata_without_panicking() {
        let client = Client::new();
        let metadata = fetch_metadata(&client, "http://127.0.0.1:1", Duration::from_millis(200)).await;
        assert!(metadata.is_empty());
    }
}
