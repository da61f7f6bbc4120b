//! Run-level and per-step runtime state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one step.
///
/// `pending → running → succeeded | failed`, with `skipped` reachable
/// directly from `pending`. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
  #[default]
  Pending,
  Running,
  Succeeded,
  Failed,
  Skipped,
}

impl StepPhase {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
  }
}

/// Runtime record of one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepState {
  pub state: StepPhase,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  /// Set iff `state == failed`.
  pub error: Option<String>,
  pub notes: Vec<String>,
  /// Output names, populated when the step succeeds.
  pub output_names: Vec<String>,
}

/// Runtime record of the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
  pub run_id: String,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  pub steps: BTreeMap<String, StepState>,
}

impl RunState {
  pub fn new(run_id: String) -> Self {
    Self {
      run_id,
      started_at: None,
      ended_at: None,
      steps: BTreeMap::new(),
    }
  }

  /// True when at least one step failed.
  pub fn has_failures(&self) -> bool {
    self.steps.values().any(|s| s.state == StepPhase::Failed)
  }
}

/// The `/status` payload: a snapshot assembled outside the run lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
  pub run_id: String,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  pub total_steps: usize,
  pub completed_steps: usize,
  /// First running step, kept for older clients.
  pub current_step: Option<String>,
  pub running_steps: Vec<String>,
  pub running_count: usize,
  pub steps: BTreeMap<String, StepView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
  pub state: StepPhase,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  pub notes: Vec<String>,
  pub outputs: Vec<String>,
}

impl StatusView {
  /// Build the view from a state snapshot.
  pub fn from_run_state(run: &RunState) -> Self {
    let mut steps = BTreeMap::new();
    let mut running_steps = Vec::new();
    let mut completed_steps = 0;

    for (name, state) in &run.steps {
      if state.state == StepPhase::Running {
        running_steps.push(name.clone());
      }
      if state.state.is_terminal() {
        completed_steps += 1;
      }
      steps.insert(
        name.clone(),
        StepView {
          state: state.state,
          started_at: state.started_at,
          ended_at: state.ended_at,
          notes: state.notes.clone(),
          outputs: state.output_names.clone(),
        },
      );
    }

    Self {
      run_id: run.run_id.clone(),
      started_at: run.started_at,
      ended_at: run.ended_at,
      total_steps: steps.len(),
      completed_steps,
      current_step: running_steps.first().cloned(),
      running_count: running_steps.len(),
      running_steps,
      steps,
    }
  }
}
