use log::{debug, error, info};
use reqwest::Client;
use std::{future::Future, time::Duration};
use url::Url;

use crate::error::Error;
use crate::model::{Job, Outcome};

pub const USER_AGENT: &str = concat!("downwatch/", env!("CARGO_PKG_VERSION"));

/// Performs one availability check. Never fails: a broken site is an outcome.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, job: &Job) -> impl Future<Output = Outcome> + Send;
}

/// Probes targets with a `HEAD` request over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Builds the shared client; `timeout` bounds every probe.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Returns whether `url` answers a `HEAD` request with `expected` status.
    pub async fn check(&self, url: Url, expected: u16) -> bool {
        match self.client.head(url.clone()).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if status == expected {
                    debug!("{url}: got expected status {status}");
                    true
                } else {
                    info!("{url}: invalid status, expected {expected} got {status}");
                    false
                }
            }
            // Network errors and real outages look the same from here
            Err(e) => {
                info!("{url}: request failed: {e}");
                false
            }
        }
    }
}

fn url_for(job: &Job) -> Result<Url, Error> {
    Ok(Url::parse(&format!("https://{}{}", job.domain, job.endpoint))?)
}

impl Probe for HttpProber {
    async fn probe(&self, job: &Job) -> Outcome {
        debug!(
            "expecting {} on {}{}",
            job.expected_status, job.domain, job.endpoint
        );

        let ok = match url_for(job) {
            Ok(url) => self.check(url, job.expected_status).await,
            Err(e) => {
                error!("could not prepare request for {}: {e}", job.domain);
                false
            }
        };

        Outcome::now(job.domain.clone(), ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn serve_local() -> SocketAddr {
        let app = Router::new()
            .route("/", get(|| async { StatusCode::OK }))
            .route("/maintenance", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route(
                "/agent",
                get(|headers: axum::http::HeaderMap| async move {
                    match headers.get("user-agent") {
                        Some(agent) if agent == USER_AGENT => StatusCode::NO_CONTENT,
                        _ => StatusCode::BAD_REQUEST,
                    }
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn prober() -> HttpProber {
        HttpProber::new(Duration::from_secs(5)).unwrap()
    }

    fn job(domain: &str, endpoint: &str, expected_status: u16) -> Job {
        Job {
            domain: domain.to_string(),
            endpoint: endpoint.to_string(),
            expected_status,
        }
    }

    #[test]
    fn test_url_joins_domain_and_endpoint() {
        let url = url_for(&job("example.com", "/health", 200)).unwrap();
        assert_eq!(url.as_str(), "https://example.com/health");
    }

    #[tokio::test]
    async fn test_expected_status_is_ok() {
        let addr = serve_local().await;
        let url = Url::parse(&format!("http://{addr}/")).unwrap();

        assert!(prober().check(url, 200).await);
    }

    #[tokio::test]
    async fn test_error_status_is_ok_when_expected() {
        let addr = serve_local().await;
        let url = Url::parse(&format!("http://{addr}/maintenance")).unwrap();

        assert!(prober().check(url.clone(), 503).await);
        assert!(!prober().check(url, 200).await);
    }

    #[tokio::test]
    async fn test_probe_sends_versioned_user_agent() {
        let addr = serve_local().await;
        let url = Url::parse(&format!("http://{addr}/agent")).unwrap();

        assert!(prober().check(url, 204).await);
    }

    #[tokio::test]
    async fn test_refused_connection_is_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/")).unwrap();

        assert!(!prober().check(url, 200).await);
    }

    #[tokio::test]
    async fn test_malformed_domain_is_down() {
        let outcome = prober().probe(&job("exa mple.com", "/", 200)).await;

        assert_eq!(outcome.domain, "exa mple.com");
        assert!(!outcome.ok);
    }

    #[ignore = "This test requires network access"]
    #[tokio::test]
    async fn test_rust_lang_is_up() {
        let outcome = prober().probe(&job("www.rust-lang.org", "/", 200)).await;
        assert!(outcome.ok, "Expected rust-lang.org to be up");
    }
}
