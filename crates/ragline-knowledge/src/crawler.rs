// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP crawler backed by reqwest.
//!
//! Only http(s) URLs are fetched. Unless private addresses are explicitly
//! allowed, hostnames are resolved through [`SsrfSafeResolver`] and every
//! redirect target is re-validated. Bodies larger than the configured cap are
//! rejected. HTML is rendered to plain text.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use tracing::debug;

use ragline_core::{
    AdapterType, CrawledPage, CrawlerService, HealthStatus, PluginAdapter, RaglineError,
};
use ragline_security::{SsrfSafeResolver, validate_source_url};

const SERVICE: &str = "crawler";
const MAX_REDIRECTS: usize = 5;
const TEXT_WIDTH: usize = 120;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub allow_private_ips: bool,
    pub user_agent: String,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_bytes: 5 * 1024 * 1024,
            allow_private_ips: false,
            user_agent: format!("ragline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct HttpCrawler {
    client: reqwest::Client,
    options: CrawlerOptions,
}

impl HttpCrawler {
    pub fn new(options: CrawlerOptions) -> Result<Self, RaglineError> {
        let allow_private = options.allow_private_ips;
        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if validate_source_url(attempt.url().as_str(), allow_private).is_err() {
                attempt.error("redirect target is not an allowed address")
            } else {
                attempt.follow()
            }
        });

        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .redirect(redirects);
        if !allow_private {
            builder = builder.dns_resolver(Arc::new(SsrfSafeResolver));
        }
        let client = builder
            .build()
            .map_err(|e| RaglineError::Config(format!("failed to build crawler HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    async fn read_capped(&self, response: reqwest::Response, url: &str) -> Result<Vec<u8>, RaglineError> {
        let cap = self.options.max_body_bytes;
        if response.content_length().is_some_and(|len| len as usize > cap) {
            return Err(too_large(url, cap));
        }
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(piece) = stream.next().await {
            let piece = piece.map_err(|e| transport_error(url, e))?;
            if body.len() + piece.len() > cap {
                return Err(too_large(url, cap));
            }
            body.extend_from_slice(&piece);
        }
        Ok(body)
    }
}

fn too_large(url: &str, cap: usize) -> RaglineError {
    RaglineError::Validation(format!("response from {url} exceeds {cap} bytes"))
}

fn transport_error(url: &str, e: reqwest::Error) -> RaglineError {
    if e.is_timeout() {
        return RaglineError::ExternalService {
            service: SERVICE.into(),
            message: format!("GET {url} timed out"),
            status: Some(504),
            source: Some(Box::new(e)),
        };
    }
    RaglineError::ExternalService {
        service: SERVICE.into(),
        message: format!("GET {url} failed: {e}"),
        status: e.status().map(|s| s.as_u16()),
        source: Some(Box::new(e)),
    }
}

/// Extracts a title and readable text from a fetched body.
pub fn extract_text(body: &[u8], is_html: bool) -> Result<(Option<String>, String), RaglineError> {
    let raw = String::from_utf8_lossy(body);
    if !is_html {
        return Ok((None, raw.trim().to_string()));
    }
    let title = TITLE_RE
        .captures(&raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());
    let text = html2text::from_read(raw.as_bytes(), TEXT_WIDTH)
        .map_err(|e| RaglineError::Validation(format!("failed to render HTML: {e}")))?;
    Ok((title, text.trim().to_string()))
}

#[async_trait]
impl PluginAdapter for HttpCrawler {
    fn name(&self) -> &str {
        "http-crawler"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crawler
    }

    async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl CrawlerService for HttpCrawler {
    async fn fetch(&self, url: &str) -> Result<CrawledPage, RaglineError> {
        let parsed = validate_source_url(url, self.options.allow_private_ips)?;
        debug!(url = %parsed, "fetching source");

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RaglineError::ExternalService {
                service: SERVICE.into(),
                message: format!("GET {url} returned {status}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let final_url = response.url().to_string();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html"));
        let body = self.read_capped(response, url).await?;
        let (title, text) = extract_text(&body, is_html)?;
        debug!(url = %final_url, bytes = body.len(), chars = text.len(), "source fetched");

        Ok(CrawledPage {
            url: final_url,
            title,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_crawler(max_body_bytes: usize) -> HttpCrawler {
        HttpCrawler::new(CrawlerOptions {
            allow_private_ips: true,
            max_body_bytes,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn html_is_rendered_to_text_with_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/faq"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(
                        "<html><head><title>Shipping FAQ</title></head>\
                         <body><h1>Shipping</h1><p>We ship worldwide.</p></body></html>",
                    ),
            )
            .mount(&server)
            .await;

        let page = local_crawler(1024)
            .fetch(&format!("{}/faq", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.title.as_deref(), Some("Shipping FAQ"));
        assert!(page.text.contains("We ship worldwide."));
        assert!(!page.text.contains("<p>"));
    }

    #[tokio::test]
    async fn non_success_status_is_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = local_crawler(1024)
            .fetch(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RaglineError::ExternalService { status: Some(503), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("x".repeat(4096)),
            )
            .mount(&server)
            .await;

        let err = local_crawler(100)
            .fetch(&format!("{}/big", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RaglineError::Validation(_)));
    }

    #[tokio::test]
    async fn private_hosts_are_refused_by_default() {
        let crawler = HttpCrawler::new(CrawlerOptions::default()).unwrap();
        for url in ["http://127.0.0.1/", "http://localhost:8080/", "file:///etc/passwd"] {
            assert!(crawler.fetch(url).await.is_err(), "{url} should be refused");
        }
    }

    #[test]
    fn plain_text_passes_through() {
        let (title, text) = extract_text(b"  hello world \n", false).unwrap();
        assert_eq!(title, None);
        assert_eq!(text, "hello world");
    }
}
