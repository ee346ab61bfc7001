//! Rate-limited HTTP fetcher
//!
//! This module handles all HTTP requests to the catalog, including:
//! - Building the HTTP client with the crawler's user agent
//! - Pacing requests so two never start closer than the fetch interval
//! - Bounded retries with increasing backoff for transient failures
//! - Error classification (not found / permanent / transient)
//! - Optional robots.txt checks

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::robots::RobotsPolicy;
use crate::{FetchError, FetchResult};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Outcome of a single request attempt
#[derive(Debug)]
enum Attempt {
    Done(FetchedPage),
    /// Worth retrying after a backoff
    Transient(String),
    /// Retrying cannot help
    Permanent(FetchError),
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_herald::config::UserAgentConfig;
/// use catalog_herald::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogHerald".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Delay before retry number `attempt` (1-based): `attempt * interval`
pub fn backoff_delay(interval: Duration, attempt: u32) -> Duration {
    interval.saturating_mul(attempt)
}

/// Tracks when the last request went out
#[derive(Debug)]
struct Pacer {
    last_fetch_at: Option<Instant>,
}

impl Pacer {
    /// The clock starts half an interval in the past so the first request
    /// goes out early.
    fn new(interval: Duration) -> Self {
        Self {
            last_fetch_at: Instant::now().checked_sub(interval / 2),
        }
    }

    async fn wait(&self, interval: Duration) {
        if let Some(last) = self.last_fetch_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
    }

    fn stamp(&mut self) {
        self.last_fetch_at = Some(Instant::now());
    }
}

/// Serialized, paced access to the catalog
///
/// One request is in flight at a time: the pacer lock is held for the whole
/// request, so concurrent callers queue behind each other.
pub struct Fetcher {
    client: Client,
    interval: Duration,
    max_retries: u32,
    pacer: Mutex<Pacer>,
    /// Present when robots.txt is respected; filled lazily
    robots: Option<Mutex<Option<RobotsPolicy>>>,
    agent: String,
}

impl Fetcher {
    pub fn new(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent)?;
        let interval = Duration::from_millis(crawler.fetch_interval);

        Ok(Self {
            client,
            interval,
            max_retries: crawler.max_retries,
            pacer: Mutex::new(Pacer::new(interval)),
            robots: crawler.respect_robots_txt.then(|| Mutex::new(None)),
            agent: user_agent.crawler_name.clone(),
        })
    }

    /// Configured minimum time between requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 404 | Immediate `NotFound` |
    /// | HTTP 429 / 5xx | Retry |
    /// | Timeout / connection error | Retry |
    /// | Other 4xx | Immediate `Status` |
    /// | Disallowed by robots.txt | Immediate `Disallowed` |
    ///
    /// At most `max_retries` retries follow the first attempt, retry `k`
    /// waiting `k * interval` first. Exhausting them yields `Exhausted`.
    pub async fn get(&self, url: &str) -> FetchResult<FetchedPage> {
        let interval = self.effective_interval(url).await?;
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(interval, attempt);
                tracing::debug!(
                    "Retrying {} in {:?} (retry {}/{})",
                    url,
                    delay,
                    attempt,
                    self.max_retries
                );
                sleep(delay).await;
            }

            match self.attempt(url, interval).await {
                Attempt::Done(page) => return Ok(page),
                Attempt::Permanent(err) => return Err(err),
                Attempt::Transient(message) => {
                    tracing::warn!("Transient failure fetching {}: {}", url, message);
                    last_error = message;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }

    /// Performs one paced request
    async fn attempt(&self, url: &str, interval: Duration) -> Attempt {
        let mut pacer = self.pacer.lock().await;
        pacer.wait(interval).await;

        let sent = self.client.get(url).send().await;
        pacer.stamp();

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Permanent(FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(e) if e.is_timeout() => return Attempt::Transient("request timeout".to_string()),
            Err(e) if e.is_connect() => {
                return Attempt::Transient(format!("connection failed: {}", e))
            }
            Err(e) => return Attempt::Transient(e.to_string()),
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::NOT_FOUND {
            return Attempt::Permanent(FetchError::NotFound {
                url: url.to_string(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }

        if !status.is_success() {
            return Attempt::Permanent(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match response.text().await {
            Ok(body) => Attempt::Done(FetchedPage {
                url: final_url,
                status: status.as_u16(),
                body,
            }),
            Err(e) => Attempt::Transient(format!("body read failed: {}", e)),
        }
    }

    /// Checks robots.txt (when enabled) and returns the interval to honor
    async fn effective_interval(&self, url: &str) -> FetchResult<Duration> {
        let Some(slot) = &self.robots else {
            return Ok(self.interval);
        };

        let mut slot = slot.lock().await;
        let now = Utc::now();
        let policy = match slot.take() {
            Some(policy) if !policy.is_stale(now) => policy,
            _ => match Url::parse(url) {
                Ok(parsed) => {
                    let mut pacer = self.pacer.lock().await;
                    pacer.wait(self.interval).await;
                    let policy = RobotsPolicy::fetch(&self.client, &parsed).await;
                    pacer.stamp();
                    policy
                }
                Err(_) => RobotsPolicy::allow_all(now),
            },
        };

        let allowed = policy.allows(url, &self.agent);
        let delay = policy.crawl_delay(&self.agent);
        *slot = Some(policy);

        if !allowed {
            return Err(FetchError::Disallowed {
                url: url.to_string(),
            });
        }

        Ok(delay.map_or(self.interval, |d| d.max(self.interval)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHerald".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        }
    }

    fn crawler(fetch_interval: u64, max_retries: u32) -> CrawlerConfig {
        CrawlerConfig {
            fetch_interval,
            max_retries,
            max_pages: 50,
            cycle_interval: 600,
            max_new_per_cycle: 1000,
            respect_robots_txt: false,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&user_agent()).is_ok());
    }

    #[test]
    fn test_backoff_strictly_increases() {
        let interval = Duration::from_millis(500);
        let delays: Vec<Duration> = (1..=3).map(|k| backoff_delay(interval, k)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500)
            ]
        );
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(10, 3), &user_agent()).unwrap();
        let page = fetcher.get(&format!("{}/page", server.uri())).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(10, 3), &user_agent()).unwrap();
        let err = fetcher.get(&format!("{}/missing", server.uri())).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(10, 3), &user_agent()).unwrap();
        let err = fetcher.get(&server.uri()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(10, 3), &user_agent()).unwrap();
        let page = fetcher.get(&server.uri()).await.unwrap();

        assert_eq!(page.body, "recovered");
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(10, 2), &user_agent()).unwrap();
        let err = fetcher.get(&server.uri()).await.unwrap_err();

        match err {
            FetchError::Exhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_requests_are_paced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&crawler(100, 0), &user_agent()).unwrap();
        fetcher.get(&server.uri()).await.unwrap();

        let started = std::time::Instant::now();
        fetcher.get(&server.uri()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_retry_backoff_scales_with_crawl_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 0.2\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let mut config = crawler(10, 2);
        config.respect_robots_txt = true;
        let fetcher = Fetcher::new(&config, &user_agent()).unwrap();

        // 200ms pacing, then retries after 200ms and 400ms
        let started = std::time::Instant::now();
        let page = fetcher.get(&format!("{}/page", server.uri())).await.unwrap();

        assert_eq!(page.body, "recovered");
        assert!(started.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_robots_disallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = crawler(10, 0);
        config.respect_robots_txt = true;
        let fetcher = Fetcher::new(&config, &user_agent()).unwrap();

        let err = fetcher
            .get(&format!("{}/private/1", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Disallowed { .. }));
    }
}
