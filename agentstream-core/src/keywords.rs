//! Keyword derivation for task attribution.
//!
//! Each task description is probed with an ordered list of cue-word patterns
//! ("搜索 X", "X 数据", ...). Every probe that matches contributes its first
//! capture group as one keyword. A description no probe matches is used
//! verbatim, so every indexed task has at least one keyword; blank
//! descriptions are left out of the index.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::AttributionCfg;
use crate::error::{AgentStreamError, CoreResult};
use crate::model::Task;

/// Built-in probes: cue word then token, or token then cue word.
pub const DEFAULT_KEYWORD_PATTERNS: &[&str] = &[
    r"搜索\s*([^\s，。！？]+)",
    r"分析\s*([^\s，。！？]+)",
    r"评估\s*([^\s，。！？]+)",
    r"完成\s*([^\s，。！？]+)",
    r"总结\s*([^\s，。！？]+)",
    r"([^\s，。！？]+)\s*数据",
    r"([^\s，。！？]+)\s*分析",
    r"([^\s，。！？]+)\s*报告",
];

static DEFAULT_PROBES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_KEYWORD_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("built-in keyword pattern compiles"))
        .collect()
});

/// Keywords derived for one task. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskKeywordEntry {
    pub task_index: usize,
    pub keywords: Vec<String>,
}

impl TaskKeywordEntry {
    /// Number of keywords occurring verbatim in `chunk` (case-sensitive).
    pub fn score(&self, chunk: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| chunk.contains(k.as_str()))
            .count()
    }
}

/// Compiled, ordered keyword probes.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    probes: Vec<Regex>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self {
            probes: DEFAULT_PROBES.clone(),
        }
    }
}

impl KeywordExtractor {
    /// Compile probes from config. Every pattern must compile and expose a
    /// capture group.
    pub fn new(cfg: &AttributionCfg) -> CoreResult<Self> {
        let mut probes = Vec::with_capacity(cfg.keyword_patterns.len());
        for pattern in &cfg.keyword_patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                AgentStreamError::Validation(format!("invalid keyword pattern '{pattern}': {e}"))
            })?;
            if regex.captures_len() < 2 {
                return Err(AgentStreamError::Validation(format!(
                    "keyword pattern '{pattern}' has no capture group"
                )));
            }
            probes.push(regex);
        }
        Ok(Self { probes })
    }

    /// Keywords for one description. Empty only when the description is blank.
    pub fn extract(&self, description: &str) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .probes
            .iter()
            .filter_map(|re| re.captures(description))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|k| !k.trim().is_empty())
            .collect();
        if keywords.is_empty() && !description.trim().is_empty() {
            keywords.push(description.to_string());
        }
        keywords
    }

    /// Build the index for a task list, in list order. Tasks with a blank
    /// description get no entry and are never attributed.
    pub fn index(&self, tasks: &[Task]) -> Vec<TaskKeywordEntry> {
        tasks
            .iter()
            .filter_map(|t| {
                let keywords = self.extract(&t.description);
                if keywords.is_empty() {
                    debug!(task = t.index, "task has no usable keyword");
                    return None;
                }
                Some(TaskKeywordEntry {
                    task_index: t.index,
                    keywords,
                })
            })
            .collect()
    }
}

/// Pick the entry with the strictly highest positive score; ties keep the
/// earlier entry.
pub fn best_match(entries: &[TaskKeywordEntry], chunk: &str) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for entry in entries {
        let score = entry.score(chunk);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((entry.task_index, score));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(task_index: usize, kws: &[&str]) -> TaskKeywordEntry {
        TaskKeywordEntry {
            task_index,
            keywords: kws.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn cue_word_probes_capture_tokens() {
        let ex = KeywordExtractor::default();
        assert_eq!(ex.extract("分析销售数据"), vec!["销售数据", "分析销售"]);
        assert_eq!(ex.extract("搜索 日本首相，然后总结"), vec!["日本首相"]);
        assert_eq!(ex.extract("撰写市场报告"), vec!["撰写市场"]);
    }

    #[test]
    fn unmatched_description_is_its_own_keyword() {
        let ex = KeywordExtractor::default();
        assert_eq!(ex.extract("book a flight"), vec!["book a flight"]);
    }

    #[test]
    fn index_follows_task_indices() {
        let ex = KeywordExtractor::default();
        let tasks = vec![Task::new(0, "搜索天气"), Task::new(1, "写邮件")];
        let idx = ex.index(&tasks);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx[0], entry(0, &["天气"]));
        assert_eq!(idx[1], entry(1, &["写邮件"]));
    }

    #[test]
    fn best_match_requires_positive_score_and_first_wins_ties() {
        let entries = vec![
            entry(0, &["alpha"]),
            entry(1, &["alpha"]),
            entry(2, &["beta", "gamma"]),
        ];
        assert_eq!(best_match(&entries, "nothing here"), None);
        assert_eq!(best_match(&entries, "alpha"), Some(0));
        assert_eq!(best_match(&entries, "alpha beta gamma"), Some(2));
        // matching is case-sensitive substring
        assert_eq!(best_match(&entries, "ALPHA"), None);
    }

    #[test]
    fn blank_descriptions_never_win_attribution() {
        let ex = KeywordExtractor::default();
        assert!(ex.extract("").is_empty());
        assert!(ex.extract("  \t").is_empty());

        let tasks = vec![Task::new(0, ""), Task::new(1, "搜索天气"), Task::new(2, "   ")];
        let idx = ex.index(&tasks);
        assert_eq!(idx, vec![entry(1, &["天气"])]);
        assert_eq!(best_match(&idx, "搜索天气"), Some(1));
        assert_eq!(best_match(&idx, "just prose"), None);
    }

    #[test]
    fn invalid_pattern_yields_validation_error() {
        let cfg = AttributionCfg {
            keyword_patterns: vec!["(".into()],
        };
        match KeywordExtractor::new(&cfg).unwrap_err() {
            AgentStreamError::Validation(msg) => assert!(msg.contains("invalid keyword pattern")),
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let cfg = AttributionCfg {
            keyword_patterns: vec!["搜索".into()],
        };
        match KeywordExtractor::new(&cfg).unwrap_err() {
            AgentStreamError::Validation(msg) => assert!(msg.contains("no capture group")),
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn configured_patterns_replace_defaults() {
        let cfg = AttributionCfg {
            keyword_patterns: vec![r"fetch (\w+)".into()],
        };
        let ex = KeywordExtractor::new(&cfg).unwrap();
        assert_eq!(ex.extract("fetch prices daily"), vec!["prices"]);
        assert_eq!(ex.extract("分析销售数据"), vec!["分析销售数据"]);
    }
}
