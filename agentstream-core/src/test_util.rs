use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::host::Transport;
use crate::model::Task;
use crate::stream::TransportEvent;

/// Transport double counting `close` calls through a shared counter.
#[derive(Debug, Clone, Default)]
pub struct CountingTransport {
    pub closes: Arc<AtomicUsize>,
}

impl CountingTransport {
    pub fn closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for CountingTransport {
    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn tasks(descs: &[&str]) -> Vec<Task> {
    descs
        .iter()
        .enumerate()
        .map(|(i, d)| Task::new(i, *d))
        .collect()
}

/// Data event carrying a main-agent token.
pub fn token(content: &str) -> TransportEvent {
    TransportEvent::Data(
        serde_json::json!({
            "type": "token",
            "source": "main",
            "namespace": [],
            "content": content,
            "metadata": {}
        })
        .to_string(),
    )
}

pub fn done() -> TransportEvent {
    TransportEvent::Data(crate::stream::DONE_SENTINEL.into())
}
