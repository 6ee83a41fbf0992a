use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;
use tracing::{debug, info_span};
use tracing_futures::Instrument;

use crate::config::Config;
use crate::error::CoreResult;
use crate::host::{LogSink, ResultSink, SessionHost, TaskListProvider, Transport};
use crate::http_client::{HttpClient, SseLine, SseStream};
use crate::model::FinalResult;
use crate::response::{process_response, RunResponse};
use crate::session::{SessionState, StreamSession};
use crate::sse::SseDecoder;
use crate::stream::{TransportEvent, DONE_SENTINEL};

/// Agent server surface: one streaming and one blocking entry point.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn open_stream(&self, goal: &str) -> CoreResult<SseStream>;
    async fn run(&self, goal: &str) -> CoreResult<RunResponse>;
}

/// Shared close flag handed to a session as its transport.
#[derive(Debug, Clone, Default)]
pub struct TransportHandle {
    closed: Arc<AtomicBool>,
}

impl TransportHandle {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for TransportHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct HttpAgentBackend {
    http: HttpClient,
    cfg: Config,
}

impl HttpAgentBackend {
    pub fn new(cfg: Config) -> CoreResult<Self> {
        let http = HttpClient::new(&cfg.http)?;
        Ok(Self { http, cfg })
    }

    fn identity(&self) -> Vec<(&str, &str)> {
        let mut q = Vec::new();
        if let Some(id) = self.cfg.server.session_id.as_deref() {
            q.push(("session_id", id));
        }
        if let Some(id) = self.cfg.server.user_id.as_deref() {
            q.push(("user_id", id));
        }
        q
    }
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_stream(&self, goal: &str) -> CoreResult<SseStream> {
        let mut query = vec![
            ("goal", goal),
            ("stream_mode", self.cfg.server.stream_mode.as_str()),
        ];
        query.extend(self.identity());
        self.http.get_sse_lines(&self.cfg.stream_url(), &query).await
    }

    async fn run(&self, goal: &str) -> CoreResult<RunResponse> {
        let body = json!({ "goal": goal, "mode": "non-streaming" });
        self.http.post_json(&self.cfg.run_url(), &self.identity(), &body).await
    }
}

/// Run one streaming session against `backend` until it ends or errors.
///
/// Connection failures are delivered to the session as transport errors; only
/// lifecycle misuse is returned as `Err`.
pub async fn drive_session<B, H>(
    backend: &B,
    session: &mut StreamSession<H>,
    goal: &str,
) -> CoreResult<()>
where
    B: AgentBackend + ?Sized,
    H: SessionHost,
{
    drive_session_until(backend, session, goal, std::future::pending()).await
}

/// Like [`drive_session`], but stops the session when `cancel` resolves first.
/// A stopped session discards its buffered output and publishes nothing.
pub async fn drive_session_until<B, H, C>(
    backend: &B,
    session: &mut StreamSession<H>,
    goal: &str,
    cancel: C,
) -> CoreResult<()>
where
    B: AgentBackend + ?Sized,
    H: SessionHost,
    C: Future<Output = ()>,
{
    let span = info_span!("drive_session", backend = backend.name());
    async move {
        let mut cancel = std::pin::pin!(cancel);
        let handle = TransportHandle::default();
        session.start(goal, Box::new(handle.clone()))?;

        let opened = tokio::select! {
            biased;
            _ = &mut cancel => None,
            opened = backend.open_stream(goal) => Some(opened),
        };
        let mut lines = match opened {
            Some(Ok(lines)) => lines,
            Some(Err(e)) => return session.dispatch(TransportEvent::Error(e.to_string())),
            None => {
                debug!("cancelled before the stream opened");
                session.stop();
                return Ok(());
            }
        };

        let mut decoder = SseDecoder::new();
        while session.state() == SessionState::Streaming && !handle.is_closed() {
            let next = tokio::select! {
                biased;
                _ = &mut cancel => None,
                next = lines.next() => Some(next),
            };
            let Some(next) = next else {
                debug!("cancelled mid-stream");
                session.stop();
                continue;
            };
            match next {
                Some(Ok(SseLine { line })) => {
                    if let Some(data) = decoder.push_line(&line) {
                        session.dispatch(TransportEvent::Data(data))?;
                    }
                }
                Some(Err(e)) => session.dispatch(TransportEvent::Error(e.to_string()))?,
                None => {
                    if let Some(data) = decoder.finish() {
                        session.dispatch(TransportEvent::Data(data))?;
                    }
                    if session.state() == SessionState::Streaming {
                        debug!("stream ended without sentinel");
                        session.dispatch(TransportEvent::Data(DONE_SENTINEL.into()))?;
                    }
                    break;
                }
            }
        }
        Ok(())
    }
    .instrument(span)
    .await
}

/// Blocking run: post the goal and reduce the reply to a final result.
pub async fn run_once<B, H>(backend: &B, host: &mut H, goal: &str) -> CoreResult<FinalResult>
where
    B: AgentBackend + ?Sized,
    H: LogSink + TaskListProvider + ResultSink,
{
    let resp = backend
        .run(goal)
        .instrument(info_span!("run_once", backend = backend.name()))
        .await?;
    Ok(process_response(resp, host))
}
