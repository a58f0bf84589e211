use crate::types::{ProbeResult, Redirects, BODY_LIMIT};
use reqwest::{redirect::Policy, Client, Response};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("no response headers within {0:?}")]
    HeaderTimeout(Duration),
}

/// The network seam of the HTTP batch prober.
pub trait Transport: Send + Sync + 'static {
    /// GET `url`, keeping at most [`BODY_LIMIT`] bytes of the body.
    fn fetch(
        &self,
        url: &str,
        redirects: Redirects,
    ) -> impl Future<Output = Result<ProbeResult, TransportError>> + Send;

    /// GET `url` following redirects and return the whole body as text.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

pub fn create_http_pool(workers: usize, redirects: Redirects) -> Result<Client, TransportError> {
    let policy = match redirects {
        Redirects::Follow => Policy::default(),
        Redirects::Stop => Policy::none(),
    };

    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(workers.max(1))
        .pool_idle_timeout(IDLE_TIMEOUT)
        .tcp_keepalive(Duration::from_secs(30))
        .tcp_nodelay(true)
        .redirect(policy)
        .use_rustls_tls()
        .build()
        .map_err(TransportError::Build)
}

/// reqwest-backed transport with one pooled client per redirect policy.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    follow: Client,
    stop: Client,
}

impl ReqwestTransport {
    pub fn new(workers: usize) -> Result<Self, TransportError> {
        Ok(Self {
            follow: create_http_pool(workers, Redirects::Follow)?,
            stop: create_http_pool(workers, Redirects::Stop)?,
        })
    }

    fn client(&self, redirects: Redirects) -> &Client {
        match redirects {
            Redirects::Follow => &self.follow,
            Redirects::Stop => &self.stop,
        }
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str, redirects: Redirects) -> Result<ProbeResult, TransportError> {
        let send = self.client(redirects).get(url).send();
        let mut response = tokio::time::timeout(RESPONSE_HEADER_TIMEOUT, send)
            .await
            .map_err(|_| TransportError::HeaderTimeout(RESPONSE_HEADER_TIMEOUT))??;

        let status = response.status().as_u16();
        let reason = reason_phrase(&response);
        let final_url = response.url().to_string();
        let body = read_prefix(&mut response, BODY_LIMIT).await;

        Ok(ProbeResult {
            url: final_url,
            original_url: url.to_string(),
            status,
            reason,
            body,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        Ok(self.follow.get(url).send().await?.text().await?)
    }
}

/// Servers such as Azure Storage put the interesting part of an error in a
/// custom reason phrase, so prefer the one on the wire over the canonical.
fn reason_phrase(response: &Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

/// A body shorter than `limit` is not an error, neither is one that fails
/// half way: whatever arrived is kept. The rest of the body is read and
/// discarded so the connection can go back to the pool.
async fn read_prefix(response: &mut Response, limit: usize) -> String {
    let mut buf = Vec::with_capacity(limit.min(1024));
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = limit.saturating_sub(buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("body read stopped early on {}: {}", response.url(), e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
