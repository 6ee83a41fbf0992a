//! One streaming run, from `start` to done, error or stop.
//!
//! ```text
//! Idle --start--> Streaming --[DONE]--> Done
//!                     |
//!                     +------error----> Errored
//! ```
//!
//! Events are dispatched one at a time; a session is never shared between
//! threads. `start` may be called again from `Done`, `Errored` or after `stop`
//! to begin a new run with fresh state.

use tracing::{debug, info, info_span, warn, Span};

use crate::attribution::ChunkAttributionCache;
use crate::boundary::BoundaryParser;
use crate::error::{AgentStreamError, CoreResult};
use crate::extract::extract_from_transcript;
use crate::host::{LogLevel, SessionHost, Transport};
use crate::keywords::KeywordExtractor;
use crate::model::{FinalResult, StreamChunk};
use crate::normalizer::{normalize_result, normalize_token};
use crate::stream::{parse_payload, StreamPayload, TransportEvent, DONE_SENTINEL};
use crate::telemetry::{self, SessionOutcome, SessionTrace};
use crate::todos;

pub const COMPLETED_FALLBACK: &str = "Execution completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Done,
    Errored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    increments: u64,
    chunks: u64,
    dropped: u64,
}

pub struct StreamSession<H: SessionHost> {
    host: H,
    state: SessionState,
    parser: BoundaryParser,
    cache: ChunkAttributionCache,
    transport: Option<Box<dyn Transport>>,
    goal: String,
    transcript: String,
    origin: (String, String),
    counters: Counters,
    span: Span,
}

impl<H: SessionHost> StreamSession<H> {
    pub fn new(host: H) -> Self {
        Self::with_extractor(host, KeywordExtractor::default())
    }

    pub fn with_extractor(host: H, extractor: KeywordExtractor) -> Self {
        Self {
            host,
            state: SessionState::Idle,
            parser: BoundaryParser::new(),
            cache: ChunkAttributionCache::new(extractor),
            transport: None,
            goal: String::new(),
            transcript: String::new(),
            origin: (String::new(), String::new()),
            counters: Counters::default(),
            span: Span::none(),
        }
    }

    /// Begin a run over `transport`, which the session now owns.
    pub fn start(&mut self, goal: &str, transport: Box<dyn Transport>) -> CoreResult<()> {
        if self.state == SessionState::Streaming && self.transport.is_some() {
            return Err(AgentStreamError::Validation(
                "session is already streaming".into(),
            ));
        }
        self.span = info_span!(
            "stream_session",
            session.goal = %goal,
            session.outcome = tracing::field::Empty,
            stream.increments = tracing::field::Empty,
            stream.chunks = tracing::field::Empty,
            stream.dropped = tracing::field::Empty,
            tasks.count = tracing::field::Empty,
            tasks.flushes = tracing::field::Empty,
            error.message = tracing::field::Empty,
        );
        let _g = self.span.clone().entered();

        self.goal = goal.to_string();
        self.transport = Some(transport);
        self.parser.reset();
        self.transcript.clear();
        self.origin = (String::new(), String::new());
        self.counters = Counters::default();
        self.cache.initialize(self.host.current_tasks());
        self.state = SessionState::Streaming;

        self.host.log(LogLevel::Info, "Starting autonomous agent (streaming mode)");
        self.host.log(LogLevel::Info, &format!("Goal: {goal}"));
        info!("session started");
        Ok(())
    }

    /// Feed one transport event. Only valid while streaming.
    pub fn dispatch(&mut self, event: TransportEvent) -> CoreResult<()> {
        if self.state != SessionState::Streaming {
            return Err(AgentStreamError::Validation(format!(
                "event received in state {:?}",
                self.state
            )));
        }
        let span = self.span.clone();
        let _g = span.enter();
        match event {
            TransportEvent::Data(data) if data == DONE_SENTINEL => self.on_done(),
            TransportEvent::Data(data) => {
                self.counters.increments += 1;
                self.on_data(&data);
            }
            TransportEvent::Error(message) => self.on_error(&message),
        }
        Ok(())
    }

    /// Close the transport and discard anything buffered. The state is left
    /// as it is; calling this repeatedly is harmless.
    pub fn stop(&mut self) {
        if let Some(mut t) = self.transport.take() {
            t.close();
            debug!("transport closed by stop");
            if self.state == SessionState::Streaming {
                self.record(SessionOutcome::Cancelled, None);
            }
        }
        self.parser.reset();
        self.cache.reset();
    }

    fn on_data(&mut self, data: &str) {
        let payload = match parse_payload(data) {
            Ok(p) => p,
            Err(e) => {
                self.counters.dropped += 1;
                warn!(error = %e, "dropping malformed stream increment");
                return;
            }
        };

        match payload {
            StreamPayload::Token {
                source,
                namespace,
                content,
                ..
            } => {
                let Some(content) = normalize_token(&content) else {
                    return;
                };
                if todos::announces_update(&content) {
                    self.host.observe_update(&content);
                    self.cache.initialize(self.host.current_tasks());
                    info!("todo list updated; keyword index rebuilt");
                }
                self.origin = (source, namespace.render());
                self.transcript.push_str(&content);
                for chunk in self.parser.consume(&content) {
                    self.emit_chunk(chunk);
                }
            }
            StreamPayload::Error { content } => {
                warn!(message = %content, "agent reported an error");
                self.host.log(LogLevel::Error, &content);
            }
            other => debug!(payload = ?other, "ignoring non-token payload"),
        }
    }

    fn emit_chunk(&mut self, chunk: String) {
        self.counters.chunks += 1;
        self.cache.attribute(&chunk, &mut self.host);
        self.host.log(LogLevel::Streaming, &chunk);
        self.host.show_chunk(&StreamChunk {
            source: self.origin.0.clone(),
            namespace: self.origin.1.clone(),
            content: chunk,
        });
    }

    fn on_done(&mut self) {
        self.state = SessionState::Done;
        self.close_transport();

        if let Some(rest) = self.parser.flush_remainder() {
            self.emit_chunk(rest);
        }
        self.cache.flush_current(&mut self.host);

        self.host.finalize_on_completion();
        let result = self.final_result();
        info!(bytes = result.result.len(), "publishing final result");
        self.host.publish(result);
        self.host.save_history();

        self.record(SessionOutcome::Completed, None);
        self.cache.reset();
    }

    fn on_error(&mut self, message: &str) {
        self.state = SessionState::Errored;
        self.close_transport();
        warn!(error = %message, "stream failed");
        self.host.log(LogLevel::Error, "Streaming connection failed, please retry");

        self.record(SessionOutcome::Errored, Some(message));
        self.parser.reset();
        self.cache.reset();
    }

    fn close_transport(&mut self) {
        if let Some(mut t) = self.transport.take() {
            t.close();
        }
    }

    fn final_result(&self) -> FinalResult {
        let mut result = normalize_result(&extract_from_transcript(&self.transcript));
        if result.is_empty() {
            result = COMPLETED_FALLBACK.to_string();
        }
        FinalResult {
            phase: "reflect".into(),
            result,
            is_completed: true,
            tasks: self.host.current_tasks(),
        }
    }

    fn record(&self, outcome: SessionOutcome, error: Option<&str>) {
        let flushes = self.cache.flush_count();
        self.span.record(telemetry::KEY_OUTCOME, format!("{outcome:?}").as_str());
        self.span.record(telemetry::KEY_INCREMENTS, self.counters.increments);
        self.span.record(telemetry::KEY_CHUNKS, self.counters.chunks);
        self.span.record(telemetry::KEY_DROPPED, self.counters.dropped);
        self.span.record(telemetry::KEY_FLUSHES, flushes as u64);
        let task_count = self.cache.state().last_known_tasks.len();
        self.span.record(telemetry::KEY_TASK_COUNT, task_count as u64);
        if let Some(message) = error {
            self.span.record(telemetry::KEY_ERROR_MESSAGE, message);
        }
        telemetry::emit(
            SessionTrace::new(self.goal.clone(), outcome)
                .counts(
                    self.counters.increments,
                    self.counters.chunks,
                    self.counters.dropped,
                )
                .tasks(task_count, flushes)
                .error_message_opt(error),
        );
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// All normalized token content of the current or last run.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn cache(&self) -> &ChunkAttributionCache {
        &self.cache
    }

    pub fn parser(&self) -> &BoundaryParser {
        &self.parser
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}
