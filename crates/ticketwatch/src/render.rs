use std::future::Future;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::Html;

const HIDDEN_ELEMENTS: [&str; 6] = ["head", "title", "script", "style", "noscript", "template"];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Empty response for {0}")]
    EmptyPage(String),
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause after a page has loaded, before its content is read.
    pub settle: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_millis(45_000),
            settle: Duration::from_millis(1_500),
        }
    }
}

/// Content of a page after it has been loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    url: String,
    html: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Whitespace-normalised visible text nodes that match `pattern`.
    pub fn text_fragments(&self, pattern: &Regex) -> Vec<String> {
        let document = Html::parse_document(&self.html);

        document
            .root_element()
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let hidden = node
                    .ancestors()
                    .filter_map(|ancestor| ancestor.value().as_element())
                    .any(|e| HIDDEN_ELEMENTS.contains(&e.name()));
                (!hidden).then(|| normalize_whitespace(text))
            })
            .filter(|text| !text.is_empty() && pattern.is_match(text))
            .collect()
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Obtains rendered content for a URL. One attempt per call.
pub trait Renderer {
    fn render(&self, url: &str) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send;
}

/// Loads pages over plain HTTP. Script-driven content is not executed.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
    config: RenderConfig,
}

impl HttpRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_html(&self, url: &str) -> Result<String, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        let html = response
            .error_for_status()?
            .text()
            .await
            .map_err(|e| self.classify(e))
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
        Ok(html)
    }

    fn classify(&self, error: reqwest::Error) -> RenderError {
        if error.is_timeout() {
            RenderError::Timeout(self.config.timeout)
        } else {
            RenderError::HttpError(error)
        }
    }
}

impl Renderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        log::info!("Loading {}", url);
        let html = self.get_html(url).await?;

        if html.trim().is_empty() {
            return Err(RenderError::EmptyPage(url.to_string()));
        }

        if !self.config.settle.is_zero() {
            tokio::time::sleep(self.config.settle).await;
        }

        Ok(RenderedPage::new(url, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RE_CURRENCY;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_text_fragments_skip_hidden_elements() {
        let page = RenderedPage::new(
            "https://example.com",
            r#"<html><head><script>var p = "¥45";</script><style>a::after{content:"$9"}</style></head>
            <body><p>Ticket   ¥ 475</p><p>No price here</p><noscript>¥12</noscript></body></html>"#,
        );

        let fragments = page.text_fragments(&RE_CURRENCY);
        assert_eq!(fragments, vec!["Ticket ¥ 475".to_string()]);
    }

    #[test]
    fn test_text_fragments_split_per_node() {
        let page = RenderedPage::new(
            "https://example.com",
            "<div><span>AU$ 120</span> and <b>$95</b></div>",
        );

        let fragments = page.text_fragments(&RE_CURRENCY);
        assert_eq!(fragments, vec!["AU$ 120".to_string(), "$95".to_string()]);
    }

    #[test]
    fn test_default_render_config() {
        let config = RenderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert!(config.user_agent.starts_with("ticketwatch/"));
    }

    #[test]
    fn test_text_fragments_skip_nested_hidden_text() {
        let page = RenderedPage::new(
            "https://example.com",
            r#"<html><head><title>Tickets from ¥99</title></head><body>
            <template><div><span>¥45</span></div></template><p>Adult ¥ 475</p></body></html>"#,
        );

        let fragments = page.text_fragments(&RE_CURRENCY);
        assert_eq!(fragments, vec!["Adult ¥ 475".to_string()]);
        assert_eq!(
            crate::extractor::PriceExtractor::default().extract_page(&page),
            Some(475.0)
        );
    }

    /// Serves `response` to the first connection and hands back the raw request.
    fn serve_once(response: &'static str, delay: Duration) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let url = format!("http://{}/tickets", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
            thread::sleep(delay);
            let _ = stream.write_all(response.as_bytes());
        });

        (url, rx)
    }

    fn test_renderer(timeout: Duration, settle: Duration) -> HttpRenderer {
        HttpRenderer::new(RenderConfig {
            user_agent: "ticketwatch-test/1.0".to_string(),
            timeout,
            settle,
        })
        .expect("Failed to build renderer")
    }

    #[tokio::test]
    async fn test_render_returns_page_and_sends_user_agent() {
        let (url, requests) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 26\r\nConnection: close\r\n\r\n<p>Adult ticket ¥ 475</p>",
            Duration::ZERO,
        );
        let settle = Duration::from_millis(150);
        let renderer = test_renderer(Duration::from_secs(5), settle);

        let started = Instant::now();
        let page = renderer.render(&url).await.expect("Should render");

        assert!(started.elapsed() >= settle, "Settle delay should run");
        assert_eq!(page.url(), url);
        assert!(page.html().contains("¥ 475"));

        let request = requests.recv().unwrap().to_ascii_lowercase();
        assert!(request.contains("user-agent: ticketwatch-test/1.0"));
    }

    #[tokio::test]
    async fn test_render_server_error_is_failure() {
        let (url, _requests) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Duration::ZERO,
        );
        let renderer = test_renderer(Duration::from_secs(5), Duration::ZERO);

        let result = renderer.render(&url).await;
        assert!(matches!(result, Err(RenderError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_render_blank_body_is_empty_page() {
        let (url, _requests) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 4\r\nConnection: close\r\n\r\n \n\t ",
            Duration::ZERO,
        );
        let renderer = test_renderer(Duration::from_secs(5), Duration::ZERO);

        let result = renderer.render(&url).await;
        assert!(matches!(result, Err(RenderError::EmptyPage(u)) if u == url));
    }

    #[tokio::test]
    async fn test_render_times_out() {
        let (url, _requests) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Duration::from_secs(2),
        );
        let timeout = Duration::from_millis(200);
        let renderer = test_renderer(timeout, Duration::ZERO);

        let result = renderer.render(&url).await;
        assert!(matches!(result, Err(RenderError::Timeout(t)) if t == timeout));
    }
}
