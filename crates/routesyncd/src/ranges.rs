//! Published IP-range feed retrieval and filtering
//!
//! The provider publishes its address space as a JSON document of the form
//! `{"prefixes": [{"ip_prefix": ..., "region": ..., "service": ...}, ...]}`.
//! Fields beyond those three are ignored.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::error::{Result, RouteSyncError};
use crate::types::IpRange;

/// Top-level shape of the published feed.
#[derive(Debug, Deserialize)]
struct RangeFeed {
    prefixes: Vec<IpRange>,
}

/// Fetches the published IP-range feed over HTTP.
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: reqwest::Client,
}

impl RangeFetcher {
    /// Create a fetcher with a default HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Retrieves and parses the feed at `url`.
    ///
    /// Network and HTTP-status failures surface as [`RouteSyncError::Fetch`];
    /// a reachable document that does not parse as a range feed surfaces as
    /// [`RouteSyncError::MalformedFeed`].
    pub async fn fetch(&self, url: &str) -> Result<Vec<IpRange>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| RouteSyncError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let body = response.text().await.map_err(|source| RouteSyncError::Fetch {
            url: url.to_string(),
            source,
        })?;

        let feed: RangeFeed = serde_json::from_str(&body)
            .map_err(|e| RouteSyncError::malformed_feed(url, e.to_string()))?;

        Ok(feed.prefixes)
    }
}

impl Default for RangeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps only ranges in one of the given regions.
///
/// An empty region set keeps everything.
pub fn filter_by_region(mut ranges: Vec<IpRange>, regions: &BTreeSet<String>) -> Vec<IpRange> {
    if regions.is_empty() {
        return ranges;
    }
    ranges.retain(|r| regions.contains(&r.region));
    ranges
}

/// Keeps only ranges belonging to one of the given services.
///
/// An empty service set keeps everything.
pub fn filter_by_service(mut ranges: Vec<IpRange>, services: &BTreeSet<String>) -> Vec<IpRange> {
    if services.is_empty() {
        return ranges;
    }
    ranges.retain(|r| services.contains(&r.service));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn range(prefix: &str, region: &str, service: &str) -> IpRange {
        IpRange {
            prefix: prefix.to_string(),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_parses_feed() {
        let server = MockServer::start().await;
        let body = r#"{
            "syncToken": "1234567890",
            "createDate": "2015-06-09-18-01-25",
            "prefixes": [
                {"ip_prefix": "54.239.98.0/24", "region": "us-east-1", "service": "AMAZON"},
                {"ip_prefix": "176.32.125.0/25", "region": "GLOBAL", "service": "AMAZON"}
            ]
        }"#;
        Mock::given(method("GET"))
            .and(path("/ip-ranges.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let fetcher = RangeFetcher::new();
        let url = format!("{}/ip-ranges.json", server.uri());
        let ranges = fetcher.fetch(&url).await.unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], range("54.239.98.0/24", "us-east-1", "AMAZON"));
        assert_eq!(ranges[1], range("176.32.125.0/25", "GLOBAL", "AMAZON"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_feed_without_prefixes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip-ranges.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"syncToken": "1"}"#))
            .mount(&server)
            .await;

        let fetcher = RangeFetcher::new();
        let url = format!("{}/ip-ranges.json", server.uri());
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, RouteSyncError::MalformedFeed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip-ranges.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let fetcher = RangeFetcher::new();
        let url = format!("{}/ip-ranges.json", server.uri());
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, RouteSyncError::MalformedFeed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip-ranges.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = RangeFetcher::new();
        let url = format!("{}/ip-ranges.json", server.uri());
        let err = fetcher.fetch(&url).await.unwrap_err();
        match err {
            RouteSyncError::Fetch { url: reported, .. } => assert_eq!(reported, url),
            other => panic!("Expected Fetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_surfaces_connection_failure() {
        let fetcher = RangeFetcher::new();
        let err = fetcher.fetch("http://127.0.0.1:1/ip-ranges.json").await.unwrap_err();
        assert!(matches!(err, RouteSyncError::Fetch { .. }));
    }

    #[test]
    fn test_filter_by_region() {
        let ranges = vec![
            range("10.0.0.0/8", "us-east-1", "AMAZON"),
            range("10.1.0.0/16", "eu-west-1", "AMAZON"),
            range("10.2.0.0/16", "GLOBAL", "AMAZON"),
        ];
        let kept = filter_by_region(ranges, &set(&["us-east-1", "GLOBAL"]));
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.region != "eu-west-1"));
    }

    #[test]
    fn test_filter_by_service() {
        let ranges = vec![
            range("10.0.0.0/8", "us-east-1", "AMAZON"),
            range("10.1.0.0/16", "us-east-1", "EC2"),
        ];
        let kept = filter_by_service(ranges, &set(&["AMAZON"]));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].service, "AMAZON");
    }

    #[test]
    fn test_empty_filter_sets_keep_everything() {
        let ranges = vec![
            range("10.0.0.0/8", "us-east-1", "AMAZON"),
            range("10.1.0.0/16", "eu-west-1", "EC2"),
        ];
        let kept = filter_by_region(ranges.clone(), &BTreeSet::new());
        assert_eq!(kept, ranges);
        let kept = filter_by_service(ranges.clone(), &BTreeSet::new());
        assert_eq!(kept, ranges);
    }

    #[test]
    fn test_filters_preserve_feed_order() {
        let ranges = vec![
            range("10.2.0.0/16", "us-east-1", "AMAZON"),
            range("10.0.0.0/16", "us-east-1", "AMAZON"),
            range("10.1.0.0/16", "eu-west-1", "AMAZON"),
        ];
        let kept = filter_by_region(ranges, &set(&["us-east-1"]));
        assert_eq!(kept[0].prefix, "10.2.0.0/16");
        assert_eq!(kept[1].prefix, "10.0.0.0/16");
    }
}
