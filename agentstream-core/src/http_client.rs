use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::HttpCfg;
use crate::error::{AgentStreamError, CoreResult};

/// Represents a single Server-Sent-Event line (already split on `\n`).
#[derive(Debug, Clone)]
pub struct SseLine {
    pub line: String,
}

/// A boxed stream of `SseLine` results.
pub type SseStream = futures::stream::BoxStream<'static, CoreResult<SseLine>>;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(cap) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(cap);
        }
        let inner = builder.build().map_err(|e| {
            AgentStreamError::Other(anyhow::anyhow!("http client build failed: {e}"))
        })?;
        Ok(Self {
            inner,
            user_agent: "agentstream/0.1".to_string(),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        })
    }

    /// POST JSON and decode a JSON reply, bounded by the request timeout.
    pub async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &T,
    ) -> CoreResult<R> {
        let resp = self
            .inner
            .post(url)
            .query(query)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AgentStreamError::transport(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text));
        }

        resp.json::<R>().await.map_err(|e| AgentStreamError::Upstream {
            code: status.as_u16().to_string(),
            message: format!("json decode error: {e}"),
        })
    }

    /// GET an SSE endpoint and return its body as a line stream.
    /// Each yielded item is one raw line (trim not applied) from the SSE channel.
    pub async fn get_sse_lines(&self, url: &str, query: &[(&str, &str)]) -> CoreResult<SseStream> {
        let resp = self
            .inner
            .get(url)
            .query(query)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| AgentStreamError::transport(format!("stream open failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let line_stream = LineStream::new(Box::pin(resp.bytes_stream()));
        Ok(Box::pin(line_stream))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> AgentStreamError {
    AgentStreamError::Upstream {
        code: status.as_u16().to_string(),
        message: truncate(body, 300),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut t = s[..end].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}

type ByteStream = std::pin::Pin<
    Box<dyn futures_util::stream::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
>;

/// Internal line splitter over a bytes stream; yields `SseLine`s separated by '\n'.
struct LineStream {
    inner: ByteStream,
    buf: Vec<u8>,
    flushed_tail: bool,
}

impl LineStream {
    fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            flushed_tail: false,
        }
    }
}

impl futures_util::stream::Stream for LineStream {
    type Item = CoreResult<SseLine>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        loop {
            // Bytes are split on '\n' before decoding so multi-byte characters
            // straddling network chunks stay intact.
            if let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=idx).collect();
                let mut line = String::from_utf8_lossy(&raw).into_owned();
                line.truncate(line.len() - 1);
                if line.ends_with('\r') {
                    line.truncate(line.len() - 1);
                }
                return Poll::Ready(Some(Ok(SseLine { line })));
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buf.extend_from_slice(&chunk);
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(AgentStreamError::transport(format!(
                        "stream read failed: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    if !self.flushed_tail && !self.buf.is_empty() {
                        self.flushed_tail = true;
                        let raw = std::mem::take(&mut self.buf);
                        let line = String::from_utf8_lossy(&raw).into_owned();
                        return Poll::Ready(Some(Ok(SseLine { line })));
                    } else {
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
