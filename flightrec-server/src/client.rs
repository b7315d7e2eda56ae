//! Async HTTP client for a remote flight recorder.

use std::io;
use std::path::Path;
use std::time::Duration;

use flightrec_core::{ErrorResponse, StatusResponse, UpdateRequest};
use reqwest::{Response, StatusCode};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Base URL of a server started with default options.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8083/recorder";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("failed to save snapshot: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// A concurrent snapshot was running on the server; try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { status, .. } if *status == StatusCode::SERVICE_UNAVAILABLE.as_u16())
    }
}

#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// `base_url` includes the prefix, e.g. `http://localhost:8083/recorder`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let response = self.http.get(self.url("/status")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn start(&self) -> Result<(), ClientError> {
        let response = self.http.post(self.url("/start")).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ClientError> {
        let response = self.http.post(self.url("/stop")).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn update(&self, request: &UpdateRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/update"))
            .json(request)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Download the current trace.
    pub async fn snapshot(&self) -> Result<Vec<u8>, ClientError> {
        let response = self.http.get(self.url("/snapshot")).send().await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    /// Download the current trace into `path`, returning its length.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, ClientError> {
        let trace = self.snapshot().await?;
        tokio::fs::write(path, &trace).await?;
        Ok(trace.len())
    }
}

/// Pass successful responses through; decode the body of anything else.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) => error.error,
        Err(_) => body.trim().to_string(),
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingRecorder;
    use crate::web::router;
    use flightrec_core::ControlService;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    /// Serve a fresh recorder on an ephemeral port and return a client for it.
    async fn spawn_server(prefix: &str) -> Client {
        let service = Arc::new(ControlService::new(RingRecorder::new()));
        let app = router(service, prefix);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Client::new(&format!("http://{}{}", addr, prefix)).unwrap()
    }

    #[tokio::test]
    async fn test_client_lifecycle() {
        let client = spawn_server("/recorder").await;

        let status = client.status().await.unwrap();
        assert!(!status.enabled);
        assert_eq!(status.period, Duration::from_secs(1));
        assert_eq!(status.size, 64 * 1024 * 1024);

        client.start().await.unwrap();
        assert!(client.status().await.unwrap().enabled);

        let request = UpdateRequest::parse(Some("250ms"), Some("1048577")).unwrap();
        client.update(&request).await.unwrap();
        let status = client.status().await.unwrap();
        assert_eq!(status.period, Duration::from_millis(250));
        // Status is reported in whole units
        assert_eq!(status.size, 1024 * 1024);

        let trace = client.snapshot().await.unwrap();
        assert!(!trace.is_empty());

        client.stop().await.unwrap();
        assert!(!client.status().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_client_decodes_server_errors() {
        let client = spawn_server("/recorder").await;

        match client.stop().await {
            Err(ClientError::Server { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, "flight recorder is not running");
            }
            other => panic!("unexpected result {:?}", other),
        }

        client.start().await.unwrap();
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 409, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_unknown_prefix() {
        let client = spawn_server("/api/v1/debug/flight").await;
        client.status().await.unwrap();

        let wrong = Client::new(&client.base_url().replace("/api/v1/debug/flight", "/recorder")).unwrap();
        let err = wrong.status().await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_save_snapshot() {
        let client = spawn_server("/recorder").await;
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.trace");

        let err = client.save_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 409, .. }));
        assert!(!path.exists());

        client.start().await.unwrap();
        let len = client.save_snapshot(&path).await.unwrap();
        let saved = std::fs::read(&path).unwrap();
        assert_eq!(saved.len(), len);

        let header: serde_json::Value =
            serde_json::from_slice(saved.split(|b| *b == b'\n').next().unwrap()).unwrap();
        assert_eq!(header["format"], crate::ring::SNAPSHOT_FORMAT);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = Client::new("http://localhost:8083/recorder/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8083/recorder");
        assert_eq!(client.url("/status"), "http://localhost:8083/recorder/status");
    }

    #[test]
    fn test_retryable_only_for_busy() {
        let busy = ClientError::Server {
            status: 503,
            message: "flight recorder snapshot already in progress".into(),
        };
        let conflict = ClientError::Server {
            status: 409,
            message: "flight recorder is not running".into(),
        };
        assert!(busy.is_retryable());
        assert!(!conflict.is_retryable());
        assert_eq!(
            conflict.to_string(),
            "server error (409): flight recorder is not running"
        );
    }
}
