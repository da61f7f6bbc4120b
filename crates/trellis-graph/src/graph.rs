//! Graph derivation and traversal indexes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use trellis_config::ResolvedStep;

use crate::validate::{ValidationError, ValidationIssue};

static FLOW_REF: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"flows\.([A-Za-z0-9_]+)").expect("flow reference pattern"));

/// Dependency indexes over a validated flow.
///
/// `deps` maps a step to its parents, `dependents` to its children. Name
/// matching is case-sensitive throughout.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
  deps: BTreeMap<String, BTreeSet<String>>,
  dependents: BTreeMap<String, BTreeSet<String>>,
}

impl FlowGraph {
  /// Derive and validate the dependency graph for a flow.
  ///
  /// The dependency set of a step is the union of its `depends_on` entries
  /// and the `flows.<step>` references found in its source configuration and
  /// input. All issues are collected before returning.
  pub fn build(steps: &[ResolvedStep]) -> Result<Self, ValidationError> {
    let mut issues = Vec::new();

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for step in steps {
      if !names.insert(&step.name) {
        issues.push(ValidationIssue::DuplicateStep {
          name: step.name.clone(),
        });
      }
    }

    let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for name in &names {
      deps.insert(name.to_string(), BTreeSet::new());
      dependents.insert(name.to_string(), BTreeSet::new());
    }

    for step in steps {
      let parents = deps.entry(step.name.clone()).or_default();

      for dependency in &step.depends_on {
        if names.contains(dependency.as_str()) {
          parents.insert(dependency.clone());
        } else {
          issues.push(ValidationIssue::UnknownDependency {
            step: step.name.clone(),
            dependency: dependency.clone(),
          });
        }
      }

      let mut referenced = BTreeSet::new();
      collect_flow_refs(&step.configuration, &mut referenced);
      if let Some(input) = &step.input {
        collect_flow_refs(input, &mut referenced);
      }
      for reference in referenced {
        if names.contains(reference.as_str()) {
          parents.insert(reference);
        } else {
          issues.push(ValidationIssue::UnknownFlowReference {
            step: step.name.clone(),
            reference,
          });
        }
      }
    }

    for (child, parents) in &deps {
      for parent in parents {
        dependents
          .entry(parent.clone())
          .or_default()
          .insert(child.clone());
      }
    }

    let graph = Self { deps, dependents };
    issues.extend(graph.find_cycles());

    if issues.is_empty() {
      Ok(graph)
    } else {
      Err(ValidationError { issues })
    }
  }

  /// Parents of a step.
  pub fn deps(&self, step: &str) -> impl Iterator<Item = &str> {
    self.deps.get(step).into_iter().flatten().map(String::as_str)
  }

  /// Children of a step.
  pub fn dependents(&self, step: &str) -> impl Iterator<Item = &str> {
    self
      .dependents
      .get(step)
      .into_iter()
      .flatten()
      .map(String::as_str)
  }

  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.deps.keys().map(String::as_str)
  }

  /// Parent counts used to seed the scheduler's ready tracking.
  pub fn initial_in_degree(&self) -> HashMap<String, i64> {
    self
      .deps
      .iter()
      .map(|(name, parents)| (name.clone(), parents.len() as i64))
      .collect()
  }

  /// Strongly connected components of size > 1, plus self-loops.
  fn find_cycles(&self) -> Vec<ValidationIssue> {
    let mut tarjan = Tarjan::new(&self.deps);
    for name in self.deps.keys() {
      if !tarjan.index.contains_key(name.as_str()) {
        tarjan.visit(name);
      }
    }

    let mut issues = Vec::new();
    for component in tarjan.components {
      let is_self_loop = component.len() == 1
        && self
          .deps
          .get(&component[0])
          .is_some_and(|parents| parents.contains(&component[0]));
      if component.len() > 1 || is_self_loop {
        let mut members = component;
        members.sort();
        issues.push(ValidationIssue::Cycle { members });
      }
    }
    issues
  }
}

/// Walk a nested value collecting `flows.<step>` references from strings.
fn collect_flow_refs(value: &Value, refs: &mut BTreeSet<String>) {
  match value {
    Value::String(s) => {
      for capture in FLOW_REF.captures_iter(s) {
        refs.insert(capture[1].to_string());
      }
    }
    Value::Array(items) => {
      for item in items {
        collect_flow_refs(item, refs);
      }
    }
    Value::Object(map) => {
      for item in map.values() {
        collect_flow_refs(item, refs);
      }
    }
    _ => {}
  }
}

struct Tarjan<'a> {
  deps: &'a BTreeMap<String, BTreeSet<String>>,
  index: HashMap<&'a str, usize>,
  lowlink: HashMap<&'a str, usize>,
  on_stack: BTreeSet<&'a str>,
  stack: Vec<&'a str>,
  next_index: usize,
  components: Vec<Vec<String>>,
}

impl<'a> Tarjan<'a> {
  fn new(deps: &'a BTreeMap<String, BTreeSet<String>>) -> Self {
    Self {
      deps,
      index: HashMap::new(),
      lowlink: HashMap::new(),
      on_stack: BTreeSet::new(),
      stack: Vec::new(),
      next_index: 0,
      components: Vec::new(),
    }
  }

  fn visit(&mut self, node: &'a str) {
    self.index.insert(node, self.next_index);
    self.lowlink.insert(node, self.next_index);
    self.next_index += 1;
    self.stack.push(node);
    self.on_stack.insert(node);

    if let Some(parents) = self.deps.get(node) {
      for parent in parents {
        if !self.index.contains_key(parent.as_str()) {
          self.visit(parent.as_str());
          let low = self.lowlink[parent.as_str()].min(self.lowlink[node]);
          self.lowlink.insert(node, low);
        } else if self.on_stack.contains(parent.as_str()) {
          let low = self.index[parent.as_str()].min(self.lowlink[node]);
          self.lowlink.insert(node, low);
        }
      }
    }

    if self.lowlink[node] == self.index[node] {
      let mut component = Vec::new();
      while let Some(member) = self.stack.pop() {
        self.on_stack.remove(member);
        component.push(member.to_string());
        if member == node {
          break;
        }
      }
      self.components.push(component);
    }
  }
}
