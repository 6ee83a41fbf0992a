use std::io::{self, Read, Write};
use std::path::PathBuf;

use agentstream_core::{
    backend::{drive_session_until, run_once, AgentBackend, HttpAgentBackend},
    config::Config,
    error::{AgentStreamError, CoreResult},
    extract::extract_from_transcript,
    host::{HistoryHook, LogLevel, LogSink, MemoryTaskList, ResultSink, TaskListProvider},
    http_client::{SseLine, SseStream},
    keywords::KeywordExtractor,
    model::{FinalResult, Task},
    normalizer::normalize_result,
    response::RunResponse,
    session::StreamSession,
};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "agent stream client", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a goal in streaming mode and render the output live
    Stream {
        #[arg(short, long)]
        goal: String,
        /// Seed task descriptions, in order
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Run a goal in blocking mode and print the final result as JSON
    Run {
        #[arg(short, long)]
        goal: String,
    },
    /// Feed a captured SSE transcript through a session offline
    Replay {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, default_value = "replay")]
        goal: String,
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Read text on stdin and print its structured result
    Extract,
}

/// Prints the session log to stdout.
#[derive(Default)]
struct ConsoleHost {
    tasks: MemoryTaskList,
    result: Option<FinalResult>,
}

impl ConsoleHost {
    fn with_tasks(descs: Vec<String>) -> Self {
        let tasks = descs
            .into_iter()
            .enumerate()
            .map(|(i, d)| Task::new(i, d))
            .collect();
        Self {
            tasks: MemoryTaskList::new(tasks),
            result: None,
        }
    }
}

impl LogSink for ConsoleHost {
    fn log(&mut self, level: LogLevel, text: &str) {
        let mut out = io::stdout().lock();
        let _ = match level {
            LogLevel::Info => writeln!(out, "{text}"),
            LogLevel::Success => writeln!(out, "[ok] {text}"),
            LogLevel::Error => writeln!(out, "[error] {text}"),
            LogLevel::Streaming => writeln!(out, "> {text}"),
            LogLevel::Status(s) => writeln!(out, "[{}] {text}", s.label()),
        };
    }
}

impl TaskListProvider for ConsoleHost {
    fn current_tasks(&self) -> Vec<Task> {
        self.tasks.current_tasks()
    }

    fn observe_update(&mut self, content: &str) {
        self.tasks.observe_update(content);
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks.replace_tasks(tasks);
    }

    fn finalize_on_completion(&mut self) {
        self.tasks.finalize_on_completion();
    }
}

impl ResultSink for ConsoleHost {
    fn publish(&mut self, result: FinalResult) {
        self.result = Some(result);
    }
}

impl HistoryHook for ConsoleHost {}

/// Serves a captured SSE file in place of the agent server.
struct ReplayBackend {
    body: String,
}

#[async_trait]
impl AgentBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    async fn open_stream(&self, _goal: &str) -> CoreResult<SseStream> {
        let lines: Vec<CoreResult<SseLine>> = self
            .body
            .lines()
            .map(|l| Ok(SseLine { line: l.to_string() }))
            .collect();
        Ok(futures_util::stream::iter(lines).boxed())
    }

    async fn run(&self, _goal: &str) -> CoreResult<RunResponse> {
        Err(AgentStreamError::Validation("replay supports streaming only".into()))
    }
}

async fn stream_goal<B: AgentBackend>(
    backend: &B,
    cfg: &Config,
    goal: &str,
    tasks: Vec<String>,
) -> anyhow::Result<()> {
    let extractor = KeywordExtractor::new(&cfg.attribution)?;
    let mut session = StreamSession::with_extractor(ConsoleHost::with_tasks(tasks), extractor);
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, stopping session");
        } else {
            std::future::pending::<()>().await;
        }
    };
    drive_session_until(backend, &mut session, goal, interrupted).await?;

    if let Some(result) = session.into_host().result {
        println!();
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Stream { goal, tasks } => {
            let backend = HttpAgentBackend::new(cfg.clone())?;
            stream_goal(&backend, &cfg, &goal, tasks).await?;
        }
        Commands::Run { goal } => {
            let backend = HttpAgentBackend::new(cfg)?;
            let mut host = ConsoleHost::default();
            let result = run_once(&backend, &mut host, &goal).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Replay { file, goal, tasks } => {
            let body = std::fs::read_to_string(&file)?;
            tracing::info!(file = %file.display(), bytes = body.len(), "replaying capture");
            stream_goal(&ReplayBackend { body }, &cfg, &goal, tasks).await?;
        }
        Commands::Extract => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            println!("{}", normalize_result(&extract_from_transcript(&text)));
        }
    }

    Ok(())
}
