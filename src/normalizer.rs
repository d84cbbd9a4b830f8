use crate::constants::PPTX_CONTENT_TYPE;
use crate::merger_config::MergerConfig;
use crate::{Error, Result};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP client for the external service that rewrites a finished presentation.
///
/// The file is posted as a multipart form (field `file`) and the response body is taken
/// as the normalized package. Each attempt is bounded by a timeout; transport errors,
/// timeouts and 5xx answers are retried with a doubling backoff up to the configured
/// number of attempts.
#[derive(Debug, Clone)]
pub struct NormalizerClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl NormalizerClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        attempts: u32,
        backoff: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            attempts: attempts.max(1),
            backoff,
        })
    }

    /// Client for the configured endpoint, `None` when no normalizer is configured.
    pub fn from_config(config: &MergerConfig) -> Result<Option<Self>> {
        config
            .normalizer_url
            .as_deref()
            .map(|url| {
                Self::new(
                    url,
                    config.normalizer_timeout,
                    config.normalizer_attempts,
                    config.normalizer_backoff,
                )
            })
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `bytes` to the normalizer and returns the rewritten package.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] as soon as `cancel` fires, during a request or while waiting
    /// to retry. Otherwise the error of the last attempt.
    pub async fn normalize(
        &self,
        file_name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.send_once(file_name, bytes) => result,
            };

            match result {
                Ok(body) => {
                    tracing::info!(attempt, size = body.len(), "normalizer returned package");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    tracing::warn!(attempt, error = %e, retry_in = ?delay, "normalizer attempt failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "normalizer failed");
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(PPTX_CONTENT_TYPE)?;
        let form = Form::new().part("file", part);

        let exchange = async {
            let response = self.client.post(&self.url).multipart(form).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Normalizer { status: status.as_u16(), body });
            }
            Ok(response.bytes().await?.to_vec())
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::NormalizerTimeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct Reply {
        status: u16,
        body: &'static [u8],
        delay: Duration,
    }

    fn reply(status: u16, body: &'static [u8]) -> Reply {
        Reply { status, body, delay: Duration::ZERO }
    }

    /// Serves the given replies in order, one per connection, and counts requests.
    async fn stub_server(replies: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/normalize", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(reply.delay).await;
                let head = format!(
                    "HTTP/1.1 {} STUB\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    reply.status,
                    reply.body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(reply.body).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, hits)
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(end) = find(&data, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
                let body = data.len() - (end + 4);
                let complete = match head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                {
                    Some(len) => body >= len.trim().parse::<usize>().unwrap(),
                    None => find(&data[end..], b"0\r\n\r\n").is_some(),
                };
                if complete {
                    return;
                }
            }
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn client(url: &str, timeout: Duration, attempts: u32) -> NormalizerClient {
        NormalizerClient::new(url, timeout, attempts, Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn test_returns_normalized_bytes() {
        let (url, hits) = stub_server(vec![reply(200, b"normalized")]).await;
        let body = client(&url, Duration::from_secs(5), 3)
            .normalize("deck.pptx", b"original", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, b"normalized");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (url, hits) =
            stub_server(vec![reply(500, b"busy"), reply(503, b"busy"), reply(200, b"ok")]).await;
        let body = client(&url, Duration::from_secs(5), 3)
            .normalize("deck.pptx", b"original", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, b"ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, hits) = stub_server(vec![reply(400, b"bad file"), reply(200, b"ok")]).await;
        let err = client(&url, Duration::from_secs(5), 3)
            .normalize("deck.pptx", b"original", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::Normalizer { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad file");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_answer_times_out() {
        let slow = Reply { status: 200, body: b"late", delay: Duration::from_secs(2) };
        let (url, _) = stub_server(vec![slow]).await;
        let err = client(&url, Duration::from_millis(100), 1)
            .normalize("deck.pptx", b"original", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NormalizerTimeout(_)));
        assert_eq!(err.kind(), crate::ErrorKind::ExternalDependency);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_request() {
        let slow = Reply { status: 200, body: b"late", delay: Duration::from_secs(5) };
        let (url, _) = stub_server(vec![slow]).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client(&url, Duration::from_secs(30), 3)
            .normalize("deck.pptx", b"original", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
