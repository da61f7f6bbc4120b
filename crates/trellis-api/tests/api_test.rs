//! End-to-end tests for the status endpoints against a live run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use trellis_config::{Flow, OutputKind, OutputSpec, ResolvedStep, RunnerOptions};
use trellis_connector::{Connector, ConnectorError, ConnectorRegistry, ConnectorResult};
use trellis_runner::Runner;

#[derive(Debug)]
struct SlowConnector {
  sleep_ms: u64,
  reply: Value,
}

#[async_trait]
impl Connector for SlowConnector {
  async fn call(&self, _input: Option<Value>) -> Result<ConnectorResult, ConnectorError> {
    tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
    Ok(ConnectorResult::ok(self.reply.clone()))
  }
}

fn registry() -> ConnectorRegistry {
  let mut registry = ConnectorRegistry::new();
  registry.register("slow", |config| {
    Ok(Box::new(SlowConnector {
      sleep_ms: config.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0),
      reply: config.get("reply").cloned().unwrap_or(Value::Null),
    }) as Box<dyn Connector>)
  });
  registry
}

fn step(name: &str, sleep_ms: u64, reply: Value) -> ResolvedStep {
  ResolvedStep {
    name: name.to_string(),
    connector_type: "slow".to_string(),
    configuration: json!({"sleep_ms": sleep_ms, "reply": reply}),
    source_name: None,
    input: None,
    outputs: vec![OutputSpec {
      name: "data".to_string(),
      kind: OutputKind::Raw,
      value: None,
    }],
    depends_on: Vec::new(),
    on_error: None,
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_status_and_outputs_during_and_after_a_run() {
  let flow = Flow {
    sources: BTreeMap::new(),
    steps: vec![
      step("fast", 0, json!({"n": 1})),
      step("slow", 300, json!({"n": 2})),
    ],
    runner: RunnerOptions::default(),
  };

  let runner = Arc::new(Runner::new(flow, registry()).unwrap());
  let handle = runner.handle();

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(trellis_api::serve(listener, handle));

  let run_runner = runner.clone();
  let run_task = tokio::spawn(async move { run_runner.run().await });

  tokio::time::sleep(Duration::from_millis(100)).await;
  let base = format!("http://{addr}");
  let client = reqwest::Client::new();

  let mid: Value = client
    .get(format!("{base}/status"))
    .send()
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
  assert_eq!(mid["total_steps"], json!(2));
  assert_eq!(mid["ended_at"], Value::Null);
  assert_eq!(mid["running_steps"], json!(["slow"]));
  assert_eq!(mid["running_count"], json!(1));
  assert_eq!(mid["current_step"], json!("slow"));
  assert_eq!(mid["steps"]["slow"]["state"], json!("running"));
  assert_eq!(mid["steps"]["fast"]["state"], json!("succeeded"));

  run_task.await.unwrap().unwrap();

  let done: Value = client
    .get(format!("{base}/status"))
    .send()
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
  assert_eq!(done["completed_steps"], json!(2));
  assert_eq!(done["running_count"], json!(0));
  assert_eq!(done["current_step"], Value::Null);
  assert!(done["ended_at"].is_string());
  assert_eq!(done["steps"]["slow"]["outputs"], json!(["data"]));

  let outputs: Value = client
    .get(format!("{base}/outputs"))
    .send()
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
  assert_eq!(outputs["fast"]["data"], json!({"n": 1}));
  assert_eq!(outputs["slow"]["data"], json!({"n": 2}));
}

#[tokio::test]
async fn test_empty_run_views_are_well_formed() {
  let flow = Flow {
    sources: BTreeMap::new(),
    steps: Vec::new(),
    runner: RunnerOptions::default(),
  };
  let runner = Runner::new(flow, registry()).unwrap();
  let handle = runner.handle();
  runner.run().await.unwrap();

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(trellis_api::serve(listener, handle));

  let status: Value = reqwest::get(format!("http://{addr}/status"))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
  assert_eq!(status["total_steps"], json!(0));
  assert_eq!(status["steps"], json!({}));

  let outputs: Value = reqwest::get(format!("http://{addr}/outputs"))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
  assert_eq!(outputs, json!({}));
}
