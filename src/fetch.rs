use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("render failed for {url}: {message}")]
    Render { url: String, message: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0} environment variable must be set")]
    MissingKey(&'static str),
}

/// One fetched resource. Non-2xx responses are still `Ok`; the caller
/// decides what a status means.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub latency_ms: i64,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_pdf(&self) -> bool {
        let by_type = self
            .content_type
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("pdf"));
        by_type || self.body.starts_with(b"%PDF")
    }

    /// Turn a non-2xx response into `FetchError::Status`.
    pub fn ensure_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(FetchError::Status {
            body: self.text(),
            url: self.url,
            status: self.status,
        })
    }
}

/// Loads one URL. Implementations apply their own timeout and never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Plain HTTP GET with a fixed user agent and a hard per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    auth: Option<(String, String)>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, auth: None })
    }

    /// Send `Authorization: Token <token>` on requests under `url_prefix`.
    pub fn with_token(mut self, url_prefix: &str, token: &str) -> Self {
        self.auth = Some((url_prefix.to_string(), token.to_string()));
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let mut request = self.client.get(url);
        if let Some((prefix, token)) = &self.auth {
            if url.starts_with(prefix.as_str()) {
                request = request.header(AUTHORIZATION, format!("Token {}", token));
            }
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(Fetched {
            url: url.to_string(),
            status,
            content_type,
            body,
            latency_ms: start.elapsed().as_millis() as i64,
        })
    }
}

/// Rendered HTML through spider.cloud, for listing pages built client-side.
pub struct RenderFetcher {
    spider: Spider,
}

impl RenderFetcher {
    pub fn from_env() -> Result<Self, FetchError> {
        let api_key =
            std::env::var("SPIDER_API_KEY").map_err(|_| FetchError::MissingKey("SPIDER_API_KEY"))?;
        let spider = Spider::new(Some(api_key)).map_err(|e| FetchError::Render {
            url: String::new(),
            message: format!("Failed to create Spider client: {}", e),
        })?;
        Ok(Self { spider })
    }
}

#[async_trait]
impl Fetcher for RenderFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Render {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let latency_ms = start.elapsed().as_millis() as i64;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());
        let content = first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| FetchError::Render {
                url: url.to_string(),
                message: "No content in spider response".to_string(),
            })?;
        let status = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_u64())
            .map(|s| s as u16)
            .unwrap_or(200);

        Ok(Fetched {
            url: url.to_string(),
            status,
            content_type: Some("text/html".to_string()),
            body: content.as_bytes().to_vec(),
            latency_ms,
        })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone)]
    enum Reply {
        Ok(Fetched),
        Fail(String),
    }

    /// Canned replies per URL. The last queued reply for a URL repeats.
    #[derive(Default)]
    pub struct StubFetcher {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, status: u16, body: &str) -> &Self {
            self.respond_bytes(url, status, None, body.as_bytes())
        }

        pub fn respond_bytes(
            &self,
            url: &str,
            status: u16,
            content_type: Option<&str>,
            body: &[u8],
        ) -> &Self {
            self.push(
                url,
                Reply::Ok(Fetched {
                    url: url.to_string(),
                    status,
                    content_type: content_type.map(str::to_string),
                    body: body.to_vec(),
                    latency_ms: 1,
                }),
            )
        }

        pub fn fail(&self, url: &str, message: &str) -> &Self {
            self.push(url, Reply::Fail(message.to_string()))
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, url: &str, reply: Reply) -> &Self {
            self.replies
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(reply);
            self
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                let queue = replies.get_mut(url);
                match queue {
                    Some(q) if q.len() > 1 => q.pop_front(),
                    Some(q) => q.front().cloned(),
                    None => None,
                }
            };
            match reply {
                Some(Reply::Ok(f)) => Ok(f),
                Some(Reply::Fail(message)) => Err(FetchError::Render {
                    url: url.to_string(),
                    message,
                }),
                None => Ok(Fetched {
                    url: url.to_string(),
                    status: 404,
                    content_type: None,
                    body: b"not stubbed".to_vec(),
                    latency_ms: 0,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubFetcher;
    use super::*;

    #[test]
    fn non_success_becomes_status_error() {
        let fetched = Fetched {
            url: "https://example.test/x".to_string(),
            status: 503,
            content_type: None,
            body: b"down".to_vec(),
            latency_ms: 3,
        };
        match fetched.ensure_success() {
            Err(FetchError::Status { status, body, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pdf_detection_by_type_or_magic() {
        let mut f = Fetched {
            url: String::new(),
            status: 200,
            content_type: Some("application/PDF".to_string()),
            body: Vec::new(),
            latency_ms: 0,
        };
        assert!(f.is_pdf());
        f.content_type = Some("text/html".to_string());
        assert!(!f.is_pdf());
        f.body = b"%PDF-1.7 ...".to_vec();
        assert!(f.is_pdf());
    }

    #[tokio::test]
    async fn stub_repeats_last_reply_and_logs_calls() {
        let stub = StubFetcher::new();
        stub.respond("u", 429, "").respond("u", 200, "ok");
        assert_eq!(stub.fetch("u").await.unwrap().status, 429);
        assert_eq!(stub.fetch("u").await.unwrap().status, 200);
        assert_eq!(stub.fetch("u").await.unwrap().status, 200);
        assert_eq!(stub.fetch("missing").await.unwrap().status, 404);
        assert_eq!(stub.calls(), ["u", "u", "u", "missing"]);
    }
}
