//! The scheduler and its shared run state.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use trellis_config::{Flow, OnErrorPolicy, ResolvedStep};
use trellis_connector::ConnectorRegistry;
use trellis_graph::{FlowGraph, ValidationError};
use trellis_template::{extract_outputs, Renderer, TemplateContext};

use crate::error::{RunnerError, StepError};
use crate::state::{RunState, StatusView, StepPhase, StepState};

const DEFAULT_MAX_WORKERS: usize = 4;

/// Bound on the wait-for-any-completion call, so the coordinator can notice
/// the error flag even when nothing has completed yet.
const COMPLETION_WAIT: Duration = Duration::from_millis(100);
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Sentinel in-degree for steps that were skipped and must never re-enter
/// the ready queue.
const SKIPPED: i64 = -1;

/// Everything guarded by the run lock.
struct RunInner {
  run: RunState,
  flows: BTreeMap<String, BTreeMap<String, Value>>,
  sources: BTreeMap<String, Value>,
  in_degree: HashMap<String, i64>,
  ready: VecDeque<String>,
  error_occurred: bool,
}

struct RunShared {
  inner: Mutex<RunInner>,
}

/// What the coordinator needs to know about a settled step task.
struct StepOutcome {
  name: String,
  failed: bool,
}

/// Executes a validated flow over a bounded worker pool.
///
/// Construction validates the dependency graph; [`Runner::run`] blocks until
/// every reachable step has reached a terminal state. Afterwards the run
/// state and extracted outputs can be inspected, or observed live through a
/// [`RunHandle`] while the run is in flight.
pub struct Runner {
  steps: BTreeMap<String, Arc<ResolvedStep>>,
  graph: FlowGraph,
  registry: Arc<ConnectorRegistry>,
  renderer: Arc<Renderer>,
  default_policy: OnErrorPolicy,
  max_workers: usize,
  shared: Arc<RunShared>,
}

impl std::fmt::Debug for Runner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Runner")
      .field("steps", &self.steps.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl Runner {
  pub fn new(flow: Flow, registry: ConnectorRegistry) -> Result<Self, ValidationError> {
    let graph = FlowGraph::build(&flow.steps)?;

    let mut steps = BTreeMap::new();
    let mut run = RunState::new(uuid::Uuid::new_v4().to_string());
    for step in flow.steps {
      run.steps.insert(step.name.clone(), StepState::default());
      steps.insert(step.name.clone(), Arc::new(step));
    }

    let sources = flow
      .sources
      .iter()
      .map(|(name, decl)| {
        (
          name.clone(),
          json!({"type": decl.connector_type, "configuration": decl.configuration}),
        )
      })
      .collect();

    Ok(Self {
      steps,
      graph,
      registry: Arc::new(registry),
      renderer: Arc::new(Renderer::new()),
      default_policy: flow.runner.on_error.unwrap_or_default(),
      max_workers: flow.runner.max_workers.unwrap_or(DEFAULT_MAX_WORKERS).max(1),
      shared: Arc::new(RunShared {
        inner: Mutex::new(RunInner {
          run,
          flows: BTreeMap::new(),
          sources,
          in_degree: HashMap::new(),
          ready: VecDeque::new(),
          error_occurred: false,
        }),
      }),
    })
  }

  /// A cloneable, read-only view of the live run.
  pub fn handle(&self) -> RunHandle {
    RunHandle {
      shared: self.shared.clone(),
    }
  }

  /// Snapshot of the run state.
  pub fn run_state(&self) -> RunState {
    self.shared.inner.lock().run.clone()
  }

  /// Extracted outputs of every succeeded step.
  pub fn flows(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
    self.shared.inner.lock().flows.clone()
  }

  /// Execute the flow to completion.
  #[instrument(name = "flow_run", skip(self))]
  pub async fn run(&self) -> Result<(), RunnerError> {
    {
      let mut inner = self.shared.inner.lock();
      inner.run.started_at = Some(Utc::now());
      inner.in_degree = self.graph.initial_in_degree();
      let mut ready: Vec<String> = inner
        .in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
      ready.sort();
      inner.ready = ready.into();
    }

    info!(steps = self.steps.len(), workers = self.max_workers, "run starting");

    let mut in_flight: JoinSet<StepOutcome> = JoinSet::new();
    loop {
      // Drain the ready queue up to pool capacity; leftovers stay queued.
      while in_flight.len() < self.max_workers {
        let next = {
          let mut inner = self.shared.inner.lock();
          if inner.error_occurred {
            None
          } else {
            inner.ready.pop_front()
          }
        };
        let Some(name) = next else { break };
        let Some(step) = self.steps.get(&name) else { continue };
        in_flight.spawn(execute_step(
          step.clone(),
          self.shared.clone(),
          self.registry.clone(),
          self.renderer.clone(),
        ));
      }

      if in_flight.is_empty() {
        break;
      }

      match tokio::time::timeout(COMPLETION_WAIT, in_flight.join_next()).await {
        Ok(Some(Ok(outcome))) => self.on_step_settled(outcome),
        Ok(Some(Err(join_error))) => {
          self.shared.inner.lock().run.ended_at = Some(Utc::now());
          return Err(RunnerError::TaskAborted {
            message: join_error.to_string(),
          });
        }
        Ok(None) => {}
        Err(_) => tokio::time::sleep(IDLE_SLEEP).await,
      }
    }

    let mut inner = self.shared.inner.lock();
    inner.run.ended_at = Some(Utc::now());
    info!(
      failed = inner.run.has_failures(),
      completed = inner.run.steps.values().filter(|s| s.state.is_terminal()).count(),
      "run finished"
    );
    Ok(())
  }

  /// Apply readiness or the failure cascade after a task settles.
  fn on_step_settled(&self, outcome: StepOutcome) {
    let mut inner = self.shared.inner.lock();
    // After a fail-policy failure the run is winding down; results of
    // still-in-flight tasks are recorded but no longer propagated.
    if inner.error_occurred {
      return;
    }

    if !outcome.failed {
      self.mark_dependents_ready(&mut inner, &outcome.name);
      return;
    }

    match self.policy_for(&outcome.name) {
      OnErrorPolicy::Continue => {
        warn!(step = %outcome.name, "step failed, continuing dependents");
        self.mark_dependents_ready(&mut inner, &outcome.name);
      }
      OnErrorPolicy::Skip => {
        warn!(step = %outcome.name, "step failed, skipping descendants");
        self.skip_descendants(&mut inner, &outcome.name);
      }
      OnErrorPolicy::Fail => {
        error!(step = %outcome.name, "step failed, stopping run");
        inner.error_occurred = true;
        inner.ready.clear();
        self.skip_descendants(&mut inner, &outcome.name);
      }
    }
  }

  fn mark_dependents_ready(&self, inner: &mut RunInner, name: &str) {
    for child in self.graph.dependents(name) {
      if let Some(degree) = inner.in_degree.get_mut(child) {
        if *degree > 0 {
          *degree -= 1;
          if *degree == 0 {
            inner.ready.push_back(child.to_string());
          }
        }
      }
    }
  }

  /// Mark every transitive descendant skipped. Nodes are marked before
  /// their children are walked, keeping the pass linear in reachable edges.
  fn skip_descendants(&self, inner: &mut RunInner, name: &str) {
    let mut stack: Vec<String> = self.graph.dependents(name).map(str::to_string).collect();
    while let Some(child) = stack.pop() {
      match inner.in_degree.get_mut(&child) {
        Some(degree) if *degree != SKIPPED => *degree = SKIPPED,
        _ => continue,
      }
      if let Some(state) = inner.run.steps.get_mut(&child) {
        if state.state == StepPhase::Pending {
          state.state = StepPhase::Skipped;
          state.ended_at = Some(Utc::now());
        }
      }
      stack.extend(self.graph.dependents(&child).map(str::to_string));
    }
  }

  fn policy_for(&self, name: &str) -> OnErrorPolicy {
    self
      .steps
      .get(name)
      .and_then(|step| step.on_error)
      .unwrap_or(self.default_policy)
  }
}

/// One submitted step: snapshot, render, call, record.
async fn execute_step(
  step: Arc<ResolvedStep>,
  shared: Arc<RunShared>,
  registry: Arc<ConnectorRegistry>,
  renderer: Arc<Renderer>,
) -> StepOutcome {
  info!(step = %step.name, "step starting");

  // Point-in-time snapshot under the lock; rendering happens outside it so
  // sibling completions cannot drift into this step's view.
  let ctx = {
    let mut inner = shared.inner.lock();
    if let Some(state) = inner.run.steps.get_mut(&step.name) {
      state.state = StepPhase::Running;
      state.started_at = Some(Utc::now());
    }
    TemplateContext {
      flows: inner.flows.clone(),
      sources: inner.sources.clone(),
    }
  };

  match run_step(&step, &ctx, &registry, &renderer).await {
    Ok(outputs) => {
      let output_names: Vec<String> = outputs.keys().cloned().collect();
      let mut inner = shared.inner.lock();
      if let Some(source_name) = &step.source_name {
        // The source's materialized values become visible to later
        // templates under `sources.<name>.<key>` (shallow overwrite).
        if let Some(Value::Object(view)) = inner.sources.get_mut(source_name) {
          for (key, value) in &outputs {
            view.insert(key.clone(), value.clone());
          }
        }
      }
      inner.flows.insert(step.name.clone(), outputs);
      if let Some(state) = inner.run.steps.get_mut(&step.name) {
        state.state = StepPhase::Succeeded;
        state.ended_at = Some(Utc::now());
        state.output_names = output_names;
      }
      info!(step = %step.name, "step succeeded");
      StepOutcome {
        name: step.name.clone(),
        failed: false,
      }
    }
    Err(step_error) => {
      let message = step_error.to_string();
      let mut inner = shared.inner.lock();
      if let Some(state) = inner.run.steps.get_mut(&step.name) {
        state.state = StepPhase::Failed;
        state.error = Some(message.clone());
        state.notes = vec![message.clone()];
        state.ended_at = Some(Utc::now());
      }
      error!(step = %step.name, error = %message, "step failed");
      StepOutcome {
        name: step.name.clone(),
        failed: true,
      }
    }
  }
}

async fn run_step(
  step: &ResolvedStep,
  ctx: &TemplateContext,
  registry: &ConnectorRegistry,
  renderer: &Renderer,
) -> Result<BTreeMap<String, Value>, StepError> {
  let configuration = renderer.render_value(&step.configuration, ctx)?;
  let input = match &step.input {
    Some(input) => Some(renderer.render_value(input, ctx)?),
    None => None,
  };

  let connector = registry.create(&step.connector_type, &configuration)?;
  let result = connector.call(input).await?;

  if !result.status.success {
    let message = if result.status.notes.is_empty() {
      match result.status.code {
        Some(code) => format!("connector reported failure (code={code})"),
        None => "connector reported failure".to_string(),
      }
    } else {
      result.status.notes.join("; ")
    };
    return Err(StepError::Failed(message));
  }

  Ok(extract_outputs(&step.name, &result.data, &step.outputs)?)
}

/// Cloneable read-only view used by the status surface.
#[derive(Clone)]
pub struct RunHandle {
  shared: Arc<RunShared>,
}

impl RunHandle {
  /// Assemble the `/status` payload from a snapshot taken under the run
  /// lock; serialization happens on the caller's side of the lock.
  pub fn status(&self) -> StatusView {
    let run = self.shared.inner.lock().run.clone();
    StatusView::from_run_state(&run)
  }

  /// Outputs of succeeded steps, for `/outputs`.
  pub fn outputs(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
    self.shared.inner.lock().flows.clone()
  }

  pub fn run_state(&self) -> RunState {
    self.shared.inner.lock().run.clone()
  }
}
