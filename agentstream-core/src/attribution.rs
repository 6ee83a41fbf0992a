//! Per-stream chunk attribution and per-task buffering.

use tracing::debug;

use crate::host::{LogLevel, LogSink};
use crate::keywords::{best_match, KeywordExtractor, TaskKeywordEntry};
use crate::model::Task;

/// Mutable attribution state for one stream. `current_task` is `None` until a
/// chunk is attributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributionState {
    pub current_task: Option<usize>,
    pub pending_chunks: Vec<String>,
    pub keyword_index: Vec<TaskKeywordEntry>,
    pub last_known_tasks: Vec<Task>,
}

/// Buffers output under the task it is attributed to and flushes it to the log
/// sink when the task changes.
#[derive(Debug, Default)]
pub struct ChunkAttributionCache {
    extractor: KeywordExtractor,
    state: AttributionState,
    flushes: usize,
}

impl ChunkAttributionCache {
    pub fn new(extractor: KeywordExtractor) -> Self {
        Self {
            extractor,
            state: AttributionState::default(),
            flushes: 0,
        }
    }

    /// Start over with a new task list; the keyword index is rebuilt.
    pub fn initialize(&mut self, tasks: Vec<Task>) {
        self.state = AttributionState {
            current_task: None,
            pending_chunks: Vec::new(),
            keyword_index: self.extractor.index(&tasks),
            last_known_tasks: tasks,
        };
        debug!(tasks = self.state.keyword_index.len(), "attribution cache initialized");
    }

    /// Attribute one chunk. A switch to a different task flushes what was
    /// buffered under the old one before the chunk is buffered under the new.
    pub fn attribute(&mut self, chunk: &str, sink: &mut dyn LogSink) {
        if let Some(winner) = best_match(&self.state.keyword_index, chunk)
            && self.state.current_task != Some(winner)
        {
            self.flush(self.state.current_task, sink);
            debug!(from = ?self.state.current_task, to = winner, "task switch");
            self.state.current_task = Some(winner);
        }
        self.state.pending_chunks.push(chunk.to_string());
    }

    /// Emit buffered chunks as one text under `task`, then clear them.
    /// Does nothing when nothing is buffered.
    pub fn flush(&mut self, task: Option<usize>, sink: &mut dyn LogSink) {
        if self.state.pending_chunks.is_empty() {
            return;
        }
        let joined = self.state.pending_chunks.concat();
        if let Some(idx) = task
            && let Some(t) = self.task(idx)
        {
            sink.log(
                LogLevel::Info,
                &format!("--- Task {}: {} ---", idx + 1, t.description),
            );
        }
        sink.log(LogLevel::Info, &joined);
        self.state.pending_chunks.clear();
        sink.reset_stream();
        self.flushes += 1;
        debug!(task = ?task, bytes = joined.len(), "flushed task output");
    }

    /// Flush whatever is pending under the current task.
    pub fn flush_current(&mut self, sink: &mut dyn LogSink) {
        self.flush(self.state.current_task, sink);
    }

    pub fn reset(&mut self) {
        self.state = AttributionState::default();
    }

    pub fn current_task(&self) -> Option<usize> {
        self.state.current_task
    }

    pub fn pending_chunks(&self) -> &[String] {
        &self.state.pending_chunks
    }

    pub fn state(&self) -> &AttributionState {
        &self.state
    }

    /// Flushes emitted since construction.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    fn task(&self, index: usize) -> Option<&Task> {
        self.state
            .last_known_tasks
            .iter()
            .find(|t| t.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn cache_with(descs: &[&str]) -> ChunkAttributionCache {
        let mut cache = ChunkAttributionCache::default();
        let tasks = descs
            .iter()
            .enumerate()
            .map(|(i, d)| Task::new(i, *d))
            .collect();
        cache.initialize(tasks);
        cache
    }

    #[test]
    fn sole_keyword_selects_task_in_one_call() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["book a flight", "reserve hotel"]);
        cache.attribute("now: reserve hotel near the venue", &mut sink);
        assert_eq!(cache.current_task(), Some(1));
        assert_eq!(cache.pending_chunks(), ["now: reserve hotel near the venue"]);
    }

    #[test]
    fn repeated_chunk_under_current_task_grows_buffer() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["reserve hotel"]);
        cache.attribute("reserve hotel", &mut sink);
        cache.attribute("reserve hotel", &mut sink);
        cache.attribute("reserve hotel", &mut sink);
        assert_eq!(cache.current_task(), Some(0));
        assert_eq!(cache.pending_chunks().len(), 3);
        assert!(sink.logs.is_empty());
    }

    #[test]
    fn unattributed_chunks_accumulate_without_task() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["reserve hotel"]);
        cache.attribute("thinking", &mut sink);
        cache.attribute("...", &mut sink);
        assert_eq!(cache.current_task(), None);
        assert_eq!(cache.pending_chunks(), ["thinking", "..."]);
    }

    #[test]
    fn task_switch_flushes_old_output_in_arrival_order() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["book a flight", "reserve hotel"]);
        cache.attribute("book a flight", &mut sink);
        cache.attribute(" b", &mut sink);
        cache.attribute(" a", &mut sink);
        cache.attribute(" b", &mut sink);
        cache.attribute("reserve hotel", &mut sink);

        assert_eq!(
            sink.logged(&LogLevel::Info),
            vec!["--- Task 1: book a flight ---", "book a flight b a b"]
        );
        assert_eq!(sink.stream_resets, 1);
        assert_eq!(cache.current_task(), Some(1));
        assert_eq!(cache.pending_chunks(), ["reserve hotel"]);
        assert_eq!(cache.flush_count(), 1);
    }

    #[test]
    fn task_with_empty_description_does_not_capture_output() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["", "搜索天气"]);
        assert_eq!(cache.state().keyword_index.len(), 1);

        cache.attribute("搜索天气", &mut sink);
        assert_eq!(cache.current_task(), Some(1));
        cache.attribute("北京今天晴", &mut sink);
        assert_eq!(cache.current_task(), Some(1));
        assert_eq!(cache.pending_chunks(), ["搜索天气", "北京今天晴"]);
    }

    #[test]
    fn flush_without_task_has_no_marker() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["reserve hotel"]);
        cache.attribute("warming up", &mut sink);
        cache.attribute("reserve hotel", &mut sink);
        assert_eq!(sink.logged(&LogLevel::Info), vec!["warming up"]);
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["a"]);
        cache.flush(Some(0), &mut sink);
        assert!(sink.logs.is_empty());
        assert_eq!(sink.stream_resets, 0);
        assert_eq!(cache.flush_count(), 0);
    }

    #[test]
    fn initialize_rebuilds_index_and_clears_pointer() {
        let mut sink = MemoryHost::default();
        let mut cache = cache_with(&["reserve hotel"]);
        cache.attribute("reserve hotel", &mut sink);
        cache.initialize(vec![Task::new(0, "搜索天气")]);
        assert_eq!(cache.current_task(), None);
        assert!(cache.pending_chunks().is_empty());
        assert_eq!(cache.state().keyword_index[0].keywords, vec!["天气"]);

        cache.reset();
        assert_eq!(cache.state(), &AttributionState::default());
    }
}
