//! End-to-end review runs against scripted collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use critique_core::{
    ChangeSet, Completion, DiffError, DiffSource, EventKind, EventLog, MemoryEventLog, ModelClient,
    ModelError, ReviewConfig, ReviewError, ReviewOrchestrator, RunKey, ToolBroker, ToolError,
    SUMMARY_FILE,
};

/// Serves a fixed change set for one (repo, PR) pair.
struct StaticDiffs {
    change_set: ChangeSet,
}

#[async_trait]
impl DiffSource for StaticDiffs {
    async fn pr_diff(&self, _repo_url: &str, _pr_number: u64) -> Result<ChangeSet, DiffError> {
        Ok(self.change_set.clone())
    }
}

struct LintOnlyTools;

#[async_trait]
impl ToolBroker for LintOnlyTools {
    async fn list_tools(&self) -> Result<String, ToolError> {
        Ok("lint: run the linter".to_string())
    }

    async fn call_tool(&self, name: &str, _args: Value) -> Result<Value, ToolError> {
        match name {
            "lint" => Ok(json!({ "issues": 0 })),
            other => Err(ToolError::Invocation {
                tool: other.to_string(),
                message: "unknown tool".to_string(),
            }),
        }
    }
}

/// Routes on prompt markers: planning prompts are answered from a per-file
/// script, the repair path gets more garbage, everything else gets a passing
/// verdict or the summary text.
struct ScriptedModel {
    /// file path -> raw planner output for that file.
    plans: HashMap<String, String>,
}

impl ScriptedModel {
    fn single(file_path: &str, plan: Value) -> Self {
        let mut plans = HashMap::new();
        plans.insert(file_path.to_string(), plan.to_string());
        ScriptedModel { plans }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, prompt: &str, _model: &str) -> Result<Completion, ModelError> {
        let text = if prompt.contains("come up with a plan") {
            self.plans
                .iter()
                .find(|(file, _)| prompt.contains(&format!("file diff for {file}")))
                .map(|(_, plan)| plan.clone())
                .unwrap_or_else(|| "no plan scripted".to_string())
        } else if prompt.contains("failed to parse") {
            "still not json".to_string()
        } else if prompt.contains("Executive Summary") {
            "Looks solid. Recommendation: Merge.".to_string()
        } else {
            json!({ "findings": [], "verdict": "pass" }).to_string()
        };
        Ok(Completion {
            text,
            tokens_in: 20,
            tokens_out: 20,
        })
    }
}

fn diff_for(path: &str) -> String {
    format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1,2 @@\n+changed\n")
}

fn simple_plan() -> Value {
    json!({
        "steps": [
            {
                "name": "check-style",
                "description": "look for style problems",
                "tools": [{ "tool": "lint", "args": {} }]
            }
        ]
    })
}

fn orchestrator(
    model: Arc<dyn ModelClient>,
    change_set: ChangeSet,
    log: Arc<MemoryEventLog>,
) -> ReviewOrchestrator {
    ReviewOrchestrator::new(
        model,
        Arc::new(LintOnlyTools),
        Arc::new(StaticDiffs { change_set }),
        log,
        ReviewConfig::default(),
    )
}

#[tokio::test]
async fn single_file_run_delivers_comment_then_summary() {
    let log = Arc::new(MemoryEventLog::new());
    let mut change_set = ChangeSet::new();
    change_set.insert("src/lib.rs".to_string(), diff_for("src/lib.rs"));
    let engine = orchestrator(
        Arc::new(ScriptedModel::single("src/lib.rs", simple_plan())),
        change_set,
        log.clone(),
    );

    let mut receiver = engine
        .review("https://github.com/acme/widgets", 42, None)
        .await
        .expect("run starts");

    let mut comments = Vec::new();
    while let Some(comment) = receiver.recv().await {
        comments.push(comment);
    }

    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].file_path, "src/lib.rs");
    assert!(comments[0].comment.contains("check-style"));
    assert_eq!(comments[1].file_path, SUMMARY_FILE);
    assert!(comments[1].comment.contains("# Consolidated PR Summary"));
    assert!(comments[1].comment.contains("Merge"));

    // The log tells the same story, in order.
    let runs = log.list_runs("widgets", 42).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = RunKey::new("widgets", 42, runs[0].clone());
    let records = log
        .read_after(&run, None, Duration::from_millis(50))
        .await
        .unwrap();
    let kinds: Vec<EventKind> = records.iter().map(|r| r.event.kind).collect();
    assert_eq!(kinds, vec![EventKind::Plan, EventKind::Step, EventKind::Summary]);
    assert!(records.windows(2).all(|w| w[0].sequence < w[1].sequence));
    assert!(records.last().unwrap().event.is_terminal());
    assert_eq!(records[1].event.step_name.as_deref(), Some("check-style"));
}

#[tokio::test]
async fn one_broken_file_does_not_stop_the_others() {
    let log = Arc::new(MemoryEventLog::new());
    let mut change_set = ChangeSet::new();
    change_set.insert("good.rs".to_string(), diff_for("good.rs"));
    change_set.insert("bad.rs".to_string(), diff_for("bad.rs"));

    let mut plans = HashMap::new();
    plans.insert("good.rs".to_string(), simple_plan().to_string());
    plans.insert("bad.rs".to_string(), "certainly not a plan".to_string());
    let engine = orchestrator(Arc::new(ScriptedModel { plans }), change_set, log.clone());

    let mut receiver = engine
        .review("https://github.com/acme/widgets", 7, None)
        .await
        .expect("run starts");

    let mut comments = Vec::new();
    while let Some(comment) = receiver.recv().await {
        comments.push(comment);
    }

    // One comment per file plus the summary, with the broken file reported
    // as a failed plan rather than dropped.
    assert_eq!(comments.len(), 3);
    let bad = comments.iter().find(|c| c.file_path == "bad.rs").unwrap();
    assert!(bad.comment.contains("[Error]"));
    let good = comments.iter().find(|c| c.file_path == "good.rs").unwrap();
    assert!(good.comment.contains("check-style"));
    assert_eq!(comments.last().unwrap().file_path, SUMMARY_FILE);
}

#[tokio::test]
async fn every_file_of_a_wide_change_set_is_reviewed_exactly_once() {
    let log = Arc::new(MemoryEventLog::new());
    let mut change_set = ChangeSet::new();
    let mut plans = HashMap::new();
    for index in 0..6 {
        let path = format!("src/mod_{index}.rs");
        change_set.insert(path.clone(), diff_for(&path));
        plans.insert(path, simple_plan().to_string());
    }
    let engine = orchestrator(Arc::new(ScriptedModel { plans }), change_set, log.clone());

    let mut receiver = engine
        .review("https://github.com/acme/widgets", 9, None)
        .await
        .expect("run starts");

    let mut files = Vec::new();
    while let Some(comment) = receiver.recv().await {
        files.push(comment.file_path);
    }

    assert_eq!(files.len(), 7);
    assert_eq!(files.last().unwrap(), SUMMARY_FILE);
    let mut reviewed: Vec<&String> = files.iter().filter(|f| *f != SUMMARY_FILE).collect();
    reviewed.sort();
    reviewed.dedup();
    assert_eq!(reviewed.len(), 6);
}

#[tokio::test]
async fn empty_change_set_is_a_terminal_error() {
    let log = Arc::new(MemoryEventLog::new());
    let engine = orchestrator(
        Arc::new(ScriptedModel::single("unused", simple_plan())),
        ChangeSet::new(),
        log,
    );

    let result = engine.review("https://github.com/acme/widgets", 3, None).await;
    match result {
        Err(ReviewError::Diff(DiffError::EmptyChangeSet { pr_number, .. })) => {
            assert_eq!(pr_number, 3);
        }
        other => panic!("expected empty change set error, got {other:?}"),
    }
}

#[tokio::test]
async fn submit_registers_the_run_and_streams_to_completion() {
    let log = Arc::new(MemoryEventLog::new());
    let mut change_set = ChangeSet::new();
    change_set.insert("src/lib.rs".to_string(), diff_for("src/lib.rs"));
    let engine = orchestrator(
        Arc::new(ScriptedModel::single("src/lib.rs", simple_plan())),
        change_set,
        log.clone(),
    );

    let run_id = engine
        .submit("https://github.com/acme/widgets", 42)
        .await
        .expect("submission accepted");

    // The run is discoverable immediately, without touching the receiver.
    let runs = log.list_runs("widgets", 42).await.unwrap();
    assert_eq!(runs, vec![run_id.clone()]);

    // Tail the log until the terminal event arrives.
    let run = RunKey::new("widgets", 42, run_id);
    let mut last_seen = None;
    let mut terminal = false;
    for _ in 0..50 {
        let records = log
            .read_after(&run, last_seen, Duration::from_millis(100))
            .await
            .unwrap();
        if let Some(record) = records.last() {
            last_seen = Some(record.sequence);
            terminal = records.iter().any(|r| r.event.is_terminal());
        }
        if terminal {
            break;
        }
    }
    assert!(terminal, "run never reached a terminal event");
}

#[tokio::test]
async fn receiver_drop_does_not_stop_the_run() {
    let log = Arc::new(MemoryEventLog::new());
    let mut change_set = ChangeSet::new();
    change_set.insert("src/lib.rs".to_string(), diff_for("src/lib.rs"));
    let engine = orchestrator(
        Arc::new(ScriptedModel::single("src/lib.rs", simple_plan())),
        change_set,
        log.clone(),
    );

    let receiver = engine
        .review("https://github.com/acme/widgets", 42, None)
        .await
        .expect("run starts");
    drop(receiver);

    let runs = log.list_runs("widgets", 42).await.unwrap();
    let run = RunKey::new("widgets", 42, runs[0].clone());
    let mut last_seen = None;
    let mut terminal = false;
    for _ in 0..50 {
        let records = log
            .read_after(&run, last_seen, Duration::from_millis(100))
            .await
            .unwrap();
        if let Some(record) = records.last() {
            last_seen = Some(record.sequence);
            terminal = records.iter().any(|r| r.event.is_terminal());
        }
        if terminal {
            break;
        }
    }
    assert!(terminal, "run should complete without a consumer");
}
