use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use heddle_core::impls::TokioExecutor;
use heddle_core::ports::Executor;
use heddle_core::{
    AsyncOperation, Operation, OperationQueue, Outcome, QueueConfig, QueueCounts, Silence,
    UnobservedOperation,
};

/// Heddle - replay the two-operation dependency scenario
#[derive(Parser, Debug)]
#[command(name = "heddle")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    HEDDLE_LOG=debug    Log every flag transition")]
struct Cli {
    /// Which operation design to run
    #[arg(long, value_enum, default_value_t = Variant::Good)]
    variant: Variant,

    /// Simulated duration of each operation
    #[arg(long)]
    duration_ms: Option<u64>,

    /// How long to wait for the queue before calling it stalled
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Ceiling on operations running at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// JSON file with defaults (flags win)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Variant {
    /// Announces every transition
    Good,
    /// Announces nothing
    Quiet,
    /// Announces on "executing" / "finished"
    Misnamed,
    /// Announces on "invalidExecuting" / "invalidFinished"
    Invalid,
}

impl Variant {
    fn silence(self) -> Option<Silence> {
        match self {
            Variant::Good => None,
            Variant::Quiet => Some(Silence::Quiet),
            Variant::Misnamed => Some(Silence::MisnamedKeys),
            Variant::Invalid => Some(Silence::InvalidKeys),
        }
    }
}

/// Contents of `--config`.
///
/// ```json
/// { "queue": { "name": "demo", "max_concurrent_operations": 1 }, "duration_ms": 2000, "timeout_ms": 5000 }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoFile {
    queue: QueueConfig,
    duration_ms: u64,
    timeout_ms: u64,
}

impl Default for DemoFile {
    fn default() -> Self {
        Self {
            queue: QueueConfig {
                name: "demo".to_string(),
                ..QueueConfig::default()
            },
            duration_ms: 2_000,
            timeout_ms: 5_000,
        }
    }
}

impl DemoFile {
    fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("read {}: {e}", path.display()))?;
        serde_json::from_str(&raw).map_err(|e| format!("parse {}: {e}", path.display()))
    }

    fn apply(mut self, cli: &Cli) -> Self {
        if let Some(ms) = cli.duration_ms {
            self.duration_ms = ms;
        }
        if let Some(ms) = cli.timeout_ms {
            self.timeout_ms = ms;
        }
        if let Some(max) = cli.max_concurrent {
            self.queue.max_concurrent_operations = Some(max);
        }
        self
    }
}

#[derive(Debug, Serialize)]
struct Report {
    variant: Variant,
    stalled: bool,
    /// Completion callbacks in the order they fired, with ms since start.
    callbacks: Vec<(String, u128)>,
    counts: QueueCounts,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HEDDLE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

type Callbacks = Arc<Mutex<Vec<(String, u128)>>>;

fn build(
    name: &str,
    variant: Variant,
    duration: Duration,
    executor: &Arc<dyn Executor>,
    callbacks: &Callbacks,
    origin: Instant,
) -> Arc<dyn Operation> {
    let callbacks = Arc::clone(callbacks);
    let label = name.to_string();
    let on_complete = move |outcome: Outcome| {
        let elapsed = origin.elapsed().as_millis();
        match outcome {
            Ok(()) => println!("{label} completed after {elapsed} ms"),
            Err(e) => println!("{label} ended after {elapsed} ms: {e}"),
        }
        callbacks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((label, elapsed));
    };
    let operation: Arc<dyn Operation> = match variant.silence() {
        None => AsyncOperation::delayed(name, duration, Arc::clone(executor), on_complete),
        Some(silence) => {
            UnobservedOperation::delayed(name, duration, Arc::clone(executor), silence, on_complete)
        }
    };
    operation
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let demo = match &cli.config {
        Some(path) => match DemoFile::load(path) {
            Ok(demo) => demo,
            Err(e) => {
                eprintln!("heddle: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => DemoFile::default(),
    }
    .apply(&cli);

    let Some(executor) = TokioExecutor::current() else {
        eprintln!("heddle: no tokio runtime");
        return ExitCode::FAILURE;
    };
    let executor: Arc<dyn Executor> = Arc::new(executor);
    let duration = Duration::from_millis(demo.duration_ms);
    let callbacks: Callbacks = Arc::default();
    let origin = Instant::now();

    // (A) B は A の完了を待つ
    let a = build("A", cli.variant, duration, &executor, &callbacks, origin);
    let b = build("B", cli.variant, duration, &executor, &callbacks, origin);

    let queue = OperationQueue::new(demo.queue);
    let wired = queue
        .add_dependency(Arc::clone(&b), Arc::clone(&a))
        .and_then(|()| queue.add_operation(a))
        .and_then(|()| queue.add_operation(b));
    if let Err(e) = wired {
        eprintln!("heddle: {e}");
        return ExitCode::FAILURE;
    }

    // (B) 通知が来なければここで止まる
    let timeout = Duration::from_millis(demo.timeout_ms);
    let stalled = tokio::time::timeout(timeout, queue.wait_until_all_finished())
        .await
        .is_err();
    if stalled {
        tracing::warn!(counts = ?queue.counts(), "queue stalled after {} ms; cancelling", demo.timeout_ms);
        queue.cancel_all_operations();
    }

    let report = Report {
        variant: cli.variant,
        stalled,
        callbacks: callbacks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone(),
        counts: queue.counts(),
    };
    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("heddle: {e}"),
        }
    } else {
        println!(
            "{}: {} callback(s), counts {:?}",
            if report.stalled { "stalled" } else { "drained" },
            report.callbacks.len(),
            report.counts
        );
    }

    if stalled {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let cli = Cli::parse_from(["heddle", "--variant", "quiet", "--timeout-ms", "100", "--max-concurrent", "1"]);
        let demo = DemoFile::default().apply(&cli);

        assert_eq!(cli.variant, Variant::Quiet);
        assert_eq!(demo.timeout_ms, 100);
        assert_eq!(demo.duration_ms, 2_000);
        assert_eq!(demo.queue.limit(), 1);
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let demo: DemoFile = serde_json::from_str(r#"{ "duration_ms": 10 }"#).unwrap();
        assert_eq!(demo.duration_ms, 10);
        assert_eq!(demo.timeout_ms, 5_000);
        assert_eq!(demo.queue.name, "demo");
    }

    #[test]
    fn variants_map_to_silence() {
        assert_eq!(Variant::Good.silence(), None);
        assert_eq!(Variant::Misnamed.silence(), Some(Silence::MisnamedKeys));
        assert_eq!(Variant::Invalid.silence(), Some(Silence::InvalidKeys));
        let cli = Cli::parse_from(["heddle", "--variant", "invalid"]);
        assert_eq!(cli.variant, Variant::Invalid);
    }
}
