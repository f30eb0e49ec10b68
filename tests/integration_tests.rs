//! Integration tests for building, validating and executing workflows
//!
//! These tests drive the public API end to end with mock node runners.

use async_trait::async_trait;
use flowkit::workflow::execution::{
    ExecutionStatus, LogAction, NodeOutcome, NodeRunner, SimulatedRunner, WorkflowExecutor,
};
use flowkit::workflow::graph::{self, ValidationIssue};
use flowkit::workflow::loader::WorkflowLoader;
use flowkit::workflow::registry::{ConnectOutcome, SettingsPatch, WorkflowRegistry};
use flowkit::workflow::types::{
    ActionConfig, Branch, ErrorHandling, Node, NodeConfig, NodeKind, TriggerConfig, Workflow,
};
use flowkit::NodeError;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

static CONTACT: Lazy<Value> = Lazy::new(|| {
    json!({
        "id": "contact-1",
        "email": "ada@example.com",
        "tags": ["newsletter"]
    })
});

fn demo_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}

fn trigger() -> Node {
    Node::with_config(NodeConfig::Trigger(TriggerConfig {
        trigger_type: "contact_created".to_string(),
        active: true,
        ..TriggerConfig::default()
    }))
}

fn action(action_type: &str) -> Node {
    Node::with_config(NodeConfig::Action(ActionConfig {
        action_type: action_type.to_string(),
        ..ActionConfig::default()
    }))
}

async fn connect(registry: &WorkflowRegistry, id: &str, from: &Node, to: &Node) {
    let outcome = registry
        .add_connection(id, &from.id, &to.id, None)
        .await
        .unwrap();
    assert!(outcome.is_added(), "{:?}", outcome);
}

/// Runner that fails every node of one action type
struct FailingRunner {
    action_type: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl NodeRunner for FailingRunner {
    async fn run(&self, node: &Node, contact: &Value) -> Result<NodeOutcome, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &node.config {
            NodeConfig::Action(a) if a.action_type == self.action_type => {
                Err(NodeError::failed(format!("{} is unavailable", a.action_type)))
            }
            _ => SimulatedRunner.run(node, contact).await,
        }
    }
}

// ============================================================================
// Registry + executor
// ============================================================================

#[tokio::test]
async fn test_contact_created_add_tag_end_scenario() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Tag new contacts").await;

    let t = registry.add_node(&wf.id, trigger()).await.unwrap();
    let tag = registry.add_node(&wf.id, action("add-tag")).await.unwrap();
    let end = registry
        .add_node(&wf.id, Node::new(NodeKind::End))
        .await
        .unwrap();
    connect(&registry, &wf.id, &t, &tag).await;
    connect(&registry, &wf.id, &tag, &end).await;

    let validation = registry.validate(&wf.id).await.unwrap();
    assert!(validation.ok, "{:?}", validation.errors);
    registry.activate(&wf.id).await.unwrap();

    let workflow = registry.get(&wf.id).await.unwrap();
    let record = WorkflowExecutor::new().execute(&workflow, &CONTACT).await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.contact_id, "contact-1");
    assert_eq!(record.executed_nodes(), vec![t.id.as_str(), tag.id.as_str(), end.id.as_str()]);
    assert_eq!(record.log.first().unwrap().action, LogAction::Start);
    assert_eq!(record.log.last().unwrap().action, LogAction::Complete);
    assert!(record.completed_at.is_some());

    // Stats are shared with the stored workflow
    let stored = registry.get(&wf.id).await.unwrap();
    assert_eq!(stored.stats.triggered(), 1);
    assert_eq!(stored.stats.completed(), 1);
    assert_eq!(stored.stats.active(), 0);
}

#[tokio::test]
async fn test_stop_on_failure_leaves_downstream_unexecuted() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Email").await;
    let t = registry.add_node(&wf.id, trigger()).await.unwrap();
    let email = registry.add_node(&wf.id, action("send-email")).await.unwrap();
    let tag = registry.add_node(&wf.id, action("add-tag")).await.unwrap();
    connect(&registry, &wf.id, &t, &email).await;
    connect(&registry, &wf.id, &email, &tag).await;

    let runner = Arc::new(FailingRunner {
        action_type: "send-email",
        calls: AtomicUsize::new(0),
    });
    let executor = WorkflowExecutor::new().with_runner(runner.clone());
    let workflow = registry.get(&wf.id).await.unwrap();
    let record = executor.execute(&workflow, &CONTACT).await;

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(!record.executed_nodes().contains(&tag.id.as_str()));
    let fail = record.entries(LogAction::Fail).next().unwrap();
    assert_eq!(fail.node_id, email.id);
    assert!(fail.message.contains("send-email is unavailable"));
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(workflow.stats.failed(), 1);
}

#[tokio::test]
async fn test_retry_policy_through_registry_settings() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Retry").await;
    let t = registry.add_node(&wf.id, trigger()).await.unwrap();
    let email = registry.add_node(&wf.id, action("send-email")).await.unwrap();
    connect(&registry, &wf.id, &t, &email).await;
    registry
        .update_settings(
            &wf.id,
            SettingsPatch {
                error_handling: Some(ErrorHandling::Retry),
                ..SettingsPatch::default()
            },
        )
        .await
        .unwrap();

    let runner = Arc::new(FailingRunner {
        action_type: "send-email",
        calls: AtomicUsize::new(0),
    });
    let executor = WorkflowExecutor::new().with_runner(runner.clone());
    let record = executor
        .execute(&registry.get(&wf.id).await.unwrap(), &CONTACT)
        .await;

    assert_eq!(record.status, ExecutionStatus::Failed);
    // One attempt and three retries
    assert_eq!(runner.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_history_keeps_most_recent() {
    let mut wf = Workflow::new("History");
    let t = trigger();
    let a = action("add-tag");
    wf.connections
        .push(flowkit::Connection::new(&t.id, &a.id, None));
    wf.nodes = vec![t, a];
    wf.settings.allow_reentry = true;

    let executor = WorkflowExecutor::new().with_history_capacity(3);
    let mut ids = Vec::new();
    for n in 0..5 {
        let record = executor.execute(&wf, &json!({ "id": n })).await;
        ids.push(record.id);
    }

    let recent = executor.recent_executions(10).await;
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].id, ids[4]);
    assert!(executor.find_execution(&ids[0]).await.is_none());
    assert_eq!(wf.stats.triggered(), 5);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validation_reports_orphan_and_missing_outgoing() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Incomplete").await;
    let t = registry.add_node(&wf.id, trigger()).await.unwrap();
    let a = registry.add_node(&wf.id, action("add-tag")).await.unwrap();
    registry.add_node(&wf.id, action("send-sms")).await.unwrap();
    connect(&registry, &wf.id, &t, &a).await;

    let result = registry.validate(&wf.id).await.unwrap();
    assert!(!result.ok);
    assert!(result
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::OrphanedNode { .. })));
    assert!(result
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::NoOutgoingConnection { .. })));
}

#[tokio::test]
async fn test_condition_missing_no_branch() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Branches").await;
    let t = registry.add_node(&wf.id, trigger()).await.unwrap();
    let cond = registry
        .add_node(&wf.id, Node::new(NodeKind::Condition).with_label("Is VIP?"))
        .await
        .unwrap();
    let yes = registry.add_node(&wf.id, action("add-tag")).await.unwrap();
    connect(&registry, &wf.id, &t, &cond).await;
    let outcome = registry
        .add_connection(&wf.id, &cond.id, &yes.id, Some(Branch::True))
        .await
        .unwrap();
    assert!(outcome.is_added());

    let workflow = registry.get(&wf.id).await.unwrap();
    let result = graph::validate_node(&workflow, &cond.id);
    let branch_errors: Vec<&String> = result
        .errors
        .iter()
        .filter(|e| e.contains("branch"))
        .collect();
    assert_eq!(
        branch_errors,
        vec!["Condition 'Is VIP?' is missing No branch"]
    );
}

#[tokio::test]
async fn test_branch_handle_rejected_on_action() {
    let registry = WorkflowRegistry::new();
    let wf = registry.create_workflow("Handles").await;
    let a = registry.add_node(&wf.id, action("add-tag")).await.unwrap();
    let b = registry.add_node(&wf.id, action("send-email")).await.unwrap();

    let outcome = registry
        .add_connection(&wf.id, &a.id, &b.id, Some(Branch::False))
        .await
        .unwrap();
    assert!(matches!(outcome, ConnectOutcome::Rejected(_)));
}

// ============================================================================
// Demo files
// ============================================================================

#[tokio::test]
async fn test_demo_workflow_follows_selected_branch() {
    let loader = WorkflowLoader::new();
    let workflow = loader.load_workflow(demo_path("welcome.yaml")).unwrap();
    assert!(graph::validate(&workflow).ok);

    let contact: Value =
        serde_json::from_str(&std::fs::read_to_string(demo_path("contact.json")).unwrap())
            .unwrap();
    let record = WorkflowExecutor::new().execute(&workflow, &contact).await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(
        record.executed_nodes(),
        vec!["trigger", "is-vip", "vip-email", "wait", "end"]
    );

    // Reentry is disabled in the demo
    let again = WorkflowExecutor::new();
    again.execute(&workflow, &contact).await;
    let second = again.execute(&workflow, &contact).await;
    assert_eq!(second.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_cyclic_file_is_reported_and_refused() {
    let mut workflow = Workflow::new("Loop");
    let t = trigger();
    let a = action("add-tag");
    let b = action("send-email");
    workflow.connections = vec![
        flowkit::Connection::new(&t.id, &a.id, None),
        flowkit::Connection::new(&a.id, &b.id, None),
        flowkit::Connection::new(&b.id, &a.id, None),
    ];
    workflow.nodes = vec![t, a, b];
    workflow.settings.max_execution_time = 0;

    let path = std::env::temp_dir().join(format!("flowkit-loop-{}.yaml", workflow.id));
    let loader = WorkflowLoader::new();
    loader.save_workflow(&workflow, &path).unwrap();
    let loaded = loader.load_workflow(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let validation = graph::validate(&loaded);
    assert!(validation
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::Cycle)));

    let record = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        WorkflowExecutor::new().execute(&loaded, &CONTACT),
    )
    .await
    .expect("cyclic workflow must not run");
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.log[0].message, "Workflow contains a cycle");
    assert_eq!(loaded.stats.active(), 0);
}

#[test]
fn test_invalid_file_extension() {
    let err = WorkflowLoader::new()
        .load_workflow("workflow.toml")
        .unwrap_err();
    assert!(matches!(err, flowkit::FlowError::UnsupportedFormat(_)));
}
