//! Robots.txt politeness for the catalog host
//!
//! The fetcher consults a [`RobotsPolicy`] before every request when
//! `respect-robots-txt` is enabled. Matching is delegated to the robotstxt
//! crate; `Crawl-delay` is not part of that crate's API and is read here.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Age after which robots.txt is fetched again
const MAX_AGE_HOURS: i64 = 24;

/// Robots.txt rules of one origin
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content; empty means everything is allowed
    content: String,
    fetched_at: DateTime<Utc>,
}

impl RobotsPolicy {
    pub fn from_content(content: &str, fetched_at: DateTime<Utc>) -> Self {
        Self {
            content: content.to_string(),
            fetched_at,
        }
    }

    /// A policy that allows everything, used when robots.txt is missing
    pub fn allow_all(fetched_at: DateTime<Utc>) -> Self {
        Self::from_content("", fetched_at)
    }

    /// Loads robots.txt for the origin of `url`
    ///
    /// Any failure to obtain the file yields an allow-all policy.
    pub async fn fetch(client: &Client, url: &Url) -> Self {
        let now = Utc::now();
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => return Self::allow_all(now),
        };

        match client.get(robots_url.as_str()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    tracing::debug!("Loaded robots.txt from {}", robots_url);
                    Self::from_content(&body, now)
                }
                Err(e) => {
                    tracing::warn!("Unreadable robots.txt at {}: {}", robots_url, e);
                    Self::allow_all(now)
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "No robots.txt at {} (HTTP {}), allowing all",
                    robots_url,
                    response.status().as_u16()
                );
                Self::allow_all(now)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt at {}: {}", robots_url, e);
                Self::allow_all(now)
            }
        }
    }

    /// Returns true if the policy should be fetched again
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at >= ChronoDuration::hours(MAX_AGE_HOURS)
    }

    /// Checks if `url` may be fetched by `agent` (the crawler name)
    pub fn allows(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Crawl delay requested for `agent`, preferring its own group over `*`
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let agent = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if !seconds.is_finite() || seconds < 0.0 {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(seconds);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        specific.or(wildcard)
    }
}
