pub mod http;

use crate::models::{ActivityItem, IssueDetails, IssueLink, IssueRecord};
use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub use http::HttpTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    // Network-level failure; the request may be retried
    #[error("connection error: {0}")]
    Connection(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("giving up on {path} after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        last_error: String,
    },
    #[error("unexpected response shape from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// Something that can GET a path relative to the API root and hand back JSON.
// HTTP error statuses that carry a JSON body are returned as Ok.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    // Courtesy pause before every request
    pub request_delay: Duration,
    // First backoff after a connection failure, doubled on every further failure
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            request_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            max_retry_delay: Duration::ZERO,
            max_retries,
        }
    }

    // Backoff to wait after the given (zero-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor).min(self.max_retry_delay)
    }
}

pub struct YouTrackClient<T: Transport> {
    transport: T,
    retry: RetryPolicy,
    activity_limit: usize,
}

impl<T: Transport> YouTrackClient<T> {
    pub fn new(transport: T, retry: RetryPolicy, activity_limit: usize) -> Self {
        Self {
            transport,
            retry,
            activity_limit,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // GET with the fixed pre-request delay; only connection errors are retried
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            sleep(self.retry.request_delay).await;
            debug!("GET {}", path);

            match self.transport.get(path).await {
                Ok(value) => return Ok(value),
                Err(TransportError::Connection(msg)) => {
                    if attempt >= self.retry.max_retries {
                        return Err(ApiError::RetriesExhausted {
                            path: path.to_string(),
                            attempts: attempt + 1,
                            last_error: msg,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Connection error for {} ({}), retrying in {:?} (attempt {}/{})",
                        path,
                        msg,
                        delay,
                        attempt + 1,
                        self.retry.max_retries
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ApiError::Transport {
                        path: path.to_string(),
                        source,
                    });
                }
            }
        }
    }

    async fn get_typed<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let value = self.get_json(path).await?;
        serde_json::from_value(value).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    pub async fn issue_vote_activities(&self, issue_id: &str) -> Result<Vec<ActivityItem>, ApiError> {
        let path = format!(
            "/issues/{}/activities?fields=timestamp,author(login),added,removed,category&categories=VotersCategory&$top={}",
            issue_id, self.activity_limit
        );
        self.get_typed(&path).await
    }

    pub async fn issue_links(&self, issue_id: &str) -> Result<Vec<IssueLink>, ApiError> {
        let path = format!(
            "/issues/{}/links?fields=linkType(name),issues(idReadable)",
            issue_id
        );
        self.get_typed(&path).await
    }

    pub async fn issue_details(&self, issue_id: &str) -> Result<IssueDetails, ApiError> {
        let path = format!("/issues/{}?fields=reporter(login),created", issue_id);
        self.get_typed(&path).await
    }

    // `encoded_query` must already be URL-encoded
    pub async fn search_issues(
        &self,
        encoded_query: &str,
        max_results: usize,
    ) -> Result<Vec<IssueRecord>, ApiError> {
        let path = format!(
            "/issues?fields=idReadable,summary,votes,customFields(name,value(name))&query={}&$top={}",
            encoded_query, max_results
        );
        self.get_typed(&path).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;
    use serde_json::json;

    fn client(transport: MockTransport, retries: u32) -> YouTrackClient<MockTransport> {
        YouTrackClient::new(transport, RetryPolicy::immediate(retries), 100)
    }

    #[tokio::test]
    async fn connection_errors_are_retried_until_success() {
        let transport = MockTransport::new()
            .script("/issues/ABC-1", Err(TransportError::Connection("reset".into())))
            .script("/issues/ABC-1", Err(TransportError::Connection("reset".into())))
            .respond("/issues/ABC-1", json!({"reporter": {"login": "u"}, "created": 0}));
        let client = client(transport, 5);

        let details = client.issue_details("ABC-1").await.unwrap();
        assert_eq!(details.reporter.login, "u");
        assert_eq!(client.transport().calls_to("/issues/ABC-1"), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let transport = MockTransport::new()
            .script("/issues/ABC-1", Err(TransportError::Connection("down".into())))
            .script("/issues/ABC-1", Err(TransportError::Connection("down".into())))
            .script("/issues/ABC-1", Err(TransportError::Connection("down".into())));
        let client = client(transport, 2);

        let err = client.get_json("/issues/ABC-1").await.unwrap_err();
        assert!(matches!(err, ApiError::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn other_transport_errors_fail_fast() {
        let transport = MockTransport::new()
            .script("/issues/ABC-1", Err(TransportError::Other("bad json".into())))
            .respond("/issues/ABC-1", json!({}));
        let client = client(transport, 5);

        let err = client.get_json("/issues/ABC-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert_eq!(client.transport().calls_to("/issues/ABC-1"), 1);
    }

    #[tokio::test]
    async fn error_payloads_pass_through_but_fail_decoding() {
        // YouTrack answers 404 with {"error": ..., "error_description": ...}
        let transport = MockTransport::new().respond(
            "/issues/NOPE-1/links",
            json!({"error": "Not Found", "error_description": "Entity with id NOPE-1 not found"}),
        );
        let client = client(transport, 5);

        let raw = client.get_json("/issues/NOPE-1/links").await.unwrap();
        assert_eq!(raw["error"], "Not Found");
        let err = client.issue_links("NOPE-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            request_delay: Duration::from_millis(10),
            retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(60),
            max_retries: 10,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn activity_request_carries_explicit_limit() {
        let transport = MockTransport::new().respond("/issues/ABC-1/activities", json!([]));
        let client = client(transport, 0);

        client.issue_vote_activities("ABC-1").await.unwrap();
        let calls = client.transport().calls();
        assert!(calls[0].contains("categories=VotersCategory"));
        assert!(calls[0].ends_with("$top=100"));
    }
}
