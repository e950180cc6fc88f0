//! Self-hosted HTTP storage backend.
//!
//! Speaks a small protocol that any web server can serve with a few
//! lines of glue:
//!
//! - `POST {endpoint}/upload` with the raw file as the body, its mime type as
//!   `Content-Type` and the percent-encoded file name in `X-File-Name`. The
//!   server answers with `{ "url": "…" }`.
//! - `HEAD {url}` confirms an upload (2xx present, 404 missing).
//! - `GET {url}` downloads it again.
//!
//! Every request to the endpoint's origin carries the API key as a bearer
//! token. URLs on other origins are fetched without it.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{Upload, Verification};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const FILE_NAME_HEADER: &str = "X-File-Name";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct UploadResponse {
    url: Url,
}

/// Storage backend for a self-hosted HTTP endpoint.
///
/// # Examples
///
/// ```no_run
/// use refile_storage::backend::SelfHostedBackend;
/// use url::Url;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let endpoint = Url::parse("https://files.example.com/api")?;
/// let backend = SelfHostedBackend::new("home", endpoint, "api-key")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SelfHostedBackend {
    name: String,
    client: Client,
    endpoint: Url,
    api_key: String,
}
impl SelfHostedBackend {
    pub fn new(name: impl Into<String>, endpoint: Url, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("refile/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::BackendError("could not build HTTP client".to_string()))?;
        Ok(Self {
            name: name.into(),
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    fn upload_url(&self) -> Result<Url> {
        let raw = format!("{}/upload", self.endpoint.as_str().trim_end_matches('/'));
        Url::parse(&raw).or_raise(|| ErrorKind::InvalidConfig(format!("cannot build upload URL from `{raw}`")))
    }

    /// Attach the bearer token, but only for requests to the endpoint's own
    /// origin.
    fn authorize(&self, request: RequestBuilder, url: &Url) -> RequestBuilder {
        match url.origin() == self.endpoint.origin() {
            true => request.bearer_auth(&self.api_key),
            false => request,
        }
    }

    fn status_error(status: StatusCode, url: &Url) -> ErrorKind {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::PermissionDenied(url.to_string()),
            StatusCode::NOT_FOUND => ErrorKind::NotFound(url.to_string()),
            other => ErrorKind::BackendError(format!("{url} responded with {other}")),
        }
    }
}

#[async_trait]
impl StorageBackend for SelfHostedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(backend = %self.name, bytes = data.len()))]
    async fn upload(&self, data: Vec<u8>, file_name: &str, mime: &str) -> Result<Upload> {
        let url = self.upload_url()?;
        let request = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, mime)
            .header(FILE_NAME_HEADER, urlencoding::encode(file_name).into_owned())
            .body(data);
        let response =
            self.authorize(request, &url).send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(Self::status_error(response.status(), &url));
        }
        let body: UploadResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::BackendError(format!("{url} returned an invalid upload response")))?;
        tracing::debug!(backend = %self.name, url = %body.url, "Upload accepted");
        Ok(Upload { url: body.url })
    }

    async fn verify(&self, url: &Url) -> Result<Verification> {
        let request = self.client.head(url.clone());
        let response =
            self.authorize(request, url).send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(Verification::Confirmed),
            StatusCode::NOT_FOUND => Ok(Verification::Missing),
            status => exn::bail!(Self::status_error(status, url)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(backend = %self.name, url = %url))]
    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let request = self.client.get(url.clone());
        let response =
            self.authorize(request, url).send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(Self::status_error(response.status(), url));
        }
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Clone, Debug)]
    struct Captured {
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }
    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
        }
    }

    type Log = Arc<Mutex<Vec<Captured>>>;

    /// A tiny one-request-per-connection HTTP server that records requests
    /// and answers each with whatever `respond` returns.
    async fn serve(respond: fn(&Captured) -> (u16, String)) -> (Url, Log) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let log: Log = Arc::default();
        let recorded = log.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let header_end = loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break Some(pos + 4);
                    }
                };
                let Some(header_end) = header_end else { continue };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let mut lines = head.lines();
                let mut request_line = lines.next().unwrap().split(' ');
                let method = request_line.next().unwrap().to_string();
                let path = request_line.next().unwrap().to_string();
                let headers: Vec<(String, String)> = lines
                    .filter_map(|l| l.split_once(':'))
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .collect();
                let length: usize = headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .map(|(_, v)| v.parse().unwrap())
                    .unwrap_or(0);
                while buf.len() < header_end + length {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let captured = Captured {
                    method,
                    path,
                    headers,
                    body: buf[header_end..(header_end + length).min(buf.len())].to_vec(),
                };
                let (status, mut body) = respond(&captured);
                if captured.method == "HEAD" {
                    body.clear();
                }
                recorded.lock().unwrap().push(captured);
                let response = format!(
                    "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                _ = stream.shutdown().await;
            }
        });
        (base, log)
    }

    fn backend(base: &Url) -> SelfHostedBackend {
        SelfHostedBackend::new("home", base.join("/api/").unwrap(), "s3cret").unwrap()
    }

    #[tokio::test]
    async fn test_upload_protocol() {
        let (base, log) = serve(|_| (200, r#"{"url": "https://cdn.example.com/f/abc"}"#.to_string())).await;
        let upload = backend(&base).upload(b"pdf bytes".to_vec(), "my report.pdf", "application/pdf").await.unwrap();
        assert_eq!(upload.url.as_str(), "https://cdn.example.com/f/abc");

        let requests = log.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/upload");
        assert_eq!(request.header("authorization"), Some("Bearer s3cret"));
        assert_eq!(request.header("content-type"), Some("application/pdf"));
        assert_eq!(request.header("x-file-name"), Some("my%20report.pdf"));
        assert_eq!(request.body, b"pdf bytes");
    }

    #[tokio::test]
    async fn test_upload_unauthorized() {
        let (unauthorized, _log) = serve(|_| (401, String::new())).await;
        let (forbidden, _log) = serve(|_| (403, String::new())).await;
        for base in [unauthorized, forbidden] {
            let err = backend(&base).upload(b"x".to_vec(), "x.bin", "application/octet-stream").await.unwrap_err();
            assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
        }
    }

    #[tokio::test]
    async fn test_upload_invalid_response() {
        let (base, _log) = serve(|_| (200, r#"{"location": "nope"}"#.to_string())).await;
        let err = backend(&base).upload(b"x".to_vec(), "x.bin", "application/octet-stream").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let (base, _log) = serve(|_| (500, String::new())).await;
        let err = backend(&base).upload(b"x".to_vec(), "x.bin", "application/octet-stream").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_verify() {
        let (base, log) = serve(|req| match req.path.as_str() {
            "/f/present" => (200, String::new()),
            _ => (404, String::new()),
        })
        .await;
        let backend = backend(&base);
        let present = base.join("/f/present").unwrap();
        let missing = base.join("/f/missing").unwrap();
        assert_eq!(backend.verify(&present).await.unwrap(), Verification::Confirmed);
        assert_eq!(backend.verify(&missing).await.unwrap(), Verification::Missing);
        assert!(log.lock().unwrap().iter().all(|r| r.method == "HEAD"));
    }

    #[tokio::test]
    async fn test_download() {
        let (base, log) = serve(|req| match req.path.as_str() {
            "/f/abc" => (200, "file contents".to_string()),
            _ => (404, String::new()),
        })
        .await;
        let backend = backend(&base);
        let data = backend.download(&base.join("/f/abc").unwrap()).await.unwrap();
        assert_eq!(data, b"file contents");
        assert_eq!(log.lock().unwrap()[0].header("authorization"), Some("Bearer s3cret"));

        let err = backend.download(&base.join("/f/gone").unwrap()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_token_not_sent_to_other_origins() {
        let (base, log) = serve(|_| (200, "data".to_string())).await;
        let other_origin = SelfHostedBackend::new("home", Url::parse("https://files.example.com").unwrap(), "s3cret")
            .unwrap();
        other_origin.download(&base.join("/f/abc").unwrap()).await.unwrap();
        assert_eq!(log.lock().unwrap()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        drop(listener);
        let err = backend(&base).download(&base.join("/f/abc").unwrap()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
    }
}
