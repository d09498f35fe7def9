use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use load_tunnel_instruments::{OperationRecord, Reporter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

/// The operation id recorded for every POST request. Operations starting with `http_` feed the
/// built-in HTTP metrics.
pub const HTTP_POST_OPERATION: &str = "http_post";

/// The request timeout used by [HttpClientInstrumented::new].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What happened to a single request.
///
/// A failed request is an outcome rather than an error, so that scenarios can check it without
/// stopping the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOutcome {
    /// The response status, or `None` if no response was received.
    pub status: Option<u16>,
    /// Time from sending the request until the response body was received or the request failed.
    pub elapsed: Duration,
    /// The transport error, if the request did not complete.
    pub error: Option<String>,
}

impl HttpOutcome {
    pub fn is_status(&self, status: u16) -> bool {
        self.status == Some(status)
    }

    /// A request fails when it gets no response or the status is not 2xx or 3xx.
    pub fn is_failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}

/// A [reqwest::Client] that reports every request to the run's [Reporter].
#[derive(Debug, Clone)]
pub struct HttpClientInstrumented {
    inner: reqwest::Client,
    reporter: Arc<Reporter>,
}

impl HttpClientInstrumented {
    pub fn new(reporter: Arc<Reporter>) -> anyhow::Result<Self> {
        Self::with_timeout(reporter, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(reporter: Arc<Reporter>, timeout: Duration) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner, reporter })
    }

    /// Send `body` as JSON in a POST request to `url`, with `Content-Type: application/json` and
    /// any extra `headers`.
    ///
    /// Only a body that cannot be serialized or an invalid header is an error. Transport
    /// failures and error statuses are recorded and returned in the [HttpOutcome].
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, String)],
    ) -> anyhow::Result<HttpOutcome> {
        let body = serde_json::to_vec(body).context("Failed to serialize request body")?;

        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            header_map.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("Invalid header name: {name}"))?,
                HeaderValue::from_str(value)
                    .with_context(|| format!("Invalid value for header {name}"))?,
            );
        }

        let record = OperationRecord::new(HTTP_POST_OPERATION)
            .with_attr("method", "POST")
            .with_attr("url", url);

        let response = self
            .inner
            .post(url)
            .headers(header_map)
            .body(body)
            .send()
            .await;

        let (status, error) = match response {
            Ok(response) => {
                let status = response.status().as_u16();
                // Receiving the body is part of the request duration.
                match response.bytes().await {
                    Ok(_) => (Some(status), None),
                    Err(e) => (Some(status), Some(e.to_string())),
                }
            }
            Err(e) => (None, Some(e.to_string())),
        };

        let record = match status {
            Some(status) => record.with_attr("status", status),
            None => record,
        };

        let mut outcome = HttpOutcome {
            status,
            elapsed: Duration::ZERO,
            error,
        };
        let is_error = outcome.is_failed() || outcome.error.is_some();
        if let Some(error) = &outcome.error {
            log::debug!("POST {} failed: {}", url, error);
        }

        let record = record.finish(is_error);
        outcome.elapsed = record.duration().unwrap_or_default();
        self.reporter.add_operation(&record);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap as AxumHeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use load_tunnel_instruments::{Aggregation, ReportConfig, HTTP_REQS, HTTP_REQ_FAILED};
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorded {
        requests: Arc<Mutex<Vec<(Option<String>, Option<String>, String)>>>,
    }

    async fn serve(status: StatusCode) -> (SocketAddr, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route(
                "/echo",
                post(
                    move |State(recorded): State<Recorded>, headers: AxumHeaderMap, body: String| async move {
                        let header = |name: &str| {
                            headers
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        recorded.requests.lock().unwrap().push((
                            header("content-type"),
                            header("idempotency-key"),
                            body,
                        ));
                        status
                    },
                ),
            )
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, recorded)
    }

    #[derive(Serialize)]
    struct Payload {
        amount: u64,
    }

    fn failed_rate(reporter: &Reporter) -> Option<f64> {
        reporter.with_metrics(|m| m.aggregate(HTTP_REQ_FAILED, &Aggregation::Rate))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_json_sends_content_type_and_records_success() {
        let (addr, recorded) = serve(StatusCode::OK).await;
        let reporter = Arc::new(ReportConfig::default().init());
        let client = HttpClientInstrumented::new(reporter.clone()).unwrap();

        let outcome = client
            .post_json(
                &format!("http://{addr}/echo"),
                &Payload { amount: 5 },
                &[("Idempotency-Key", "abc".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(Some(200), outcome.status);
        assert!(outcome.is_status(200));
        assert!(!outcome.is_failed());
        assert_eq!(None, outcome.error);

        let requests = recorded.requests.lock().unwrap().clone();
        assert_eq!(
            vec![(
                Some("application/json".to_string()),
                Some("abc".to_string()),
                r#"{"amount":5}"#.to_string()
            )],
            requests
        );

        assert_eq!(
            Some(1.0),
            reporter.with_metrics(|m| m.aggregate(HTTP_REQS, &Aggregation::Count))
        );
        assert_eq!(Some(0.0), failed_rate(&reporter));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_is_a_failed_request() {
        let (addr, _) = serve(StatusCode::INTERNAL_SERVER_ERROR).await;
        let reporter = Arc::new(ReportConfig::default().init());
        let client = HttpClientInstrumented::new(reporter.clone()).unwrap();

        let outcome = client
            .post_json(&format!("http://{addr}/echo"), &Payload { amount: 5 }, &[])
            .await
            .unwrap();

        assert_eq!(Some(500), outcome.status);
        assert!(outcome.is_failed());
        assert_eq!(Some(1.0), failed_rate(&reporter));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connection_failure_is_an_outcome_not_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = Arc::new(ReportConfig::default().init());
        let client =
            HttpClientInstrumented::with_timeout(reporter.clone(), Duration::from_secs(5)).unwrap();

        let outcome = client
            .post_json(&format!("http://{addr}/echo"), &Payload { amount: 5 }, &[])
            .await
            .unwrap();

        assert_eq!(None, outcome.status);
        assert!(outcome.error.is_some());
        assert!(outcome.is_failed());
        assert_eq!(Some(1.0), failed_rate(&reporter));
    }

    #[tokio::test]
    async fn invalid_header_is_an_error() {
        let reporter = Arc::new(ReportConfig::default().init());
        let client = HttpClientInstrumented::new(reporter.clone()).unwrap();

        let result = client
            .post_json(
                "http://127.0.0.1:1/echo",
                &Payload { amount: 5 },
                &[("bad header", "x".to_string())],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(
            Some(0.0),
            reporter.with_metrics(|m| m.aggregate(HTTP_REQS, &Aggregation::Count))
        );
    }
}
