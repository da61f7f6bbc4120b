//! Subprocess connector.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::result::ConnectorResult;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandSpec {
  Argv(Vec<String>),
  Line(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PassTo {
  #[default]
  Arg,
  Stdin,
  None,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcessConfig {
  command: CommandSpec,
  #[serde(default)]
  pass_to: PassTo,
  timeout_ms: Option<u64>,
}

/// Runs a command, optionally handing the step input to it as a trailing
/// argument or on stdin. Stdout is parsed as JSON when possible.
#[derive(Debug)]
pub struct ProcessConnector {
  argv: Vec<String>,
  pass_to: PassTo,
  timeout: Option<Duration>,
}

impl ProcessConnector {
  pub fn new(configuration: &Value) -> Result<Self, ConnectorError> {
    let config: ProcessConfig = serde_json::from_value(configuration.clone())
      .map_err(|e| ConnectorError::config(e.to_string()))?;
    let argv = match config.command {
      CommandSpec::Argv(argv) => argv,
      CommandSpec::Line(line) => line.split_whitespace().map(str::to_string).collect(),
    };
    if argv.is_empty() {
      return Err(ConnectorError::config("process connector requires a non-empty 'command'"));
    }
    Ok(Self {
      argv,
      pass_to: config.pass_to,
      timeout: config.timeout_ms.map(Duration::from_millis),
    })
  }
}

#[async_trait]
impl Connector for ProcessConnector {
  async fn call(&self, input: Option<Value>) -> Result<ConnectorResult, ConnectorError> {
    let payload = input.map(|value| match value {
      Value::String(s) => s,
      other => other.to_string(),
    });

    let mut argv = self.argv.clone();
    if self.pass_to == PassTo::Arg {
      if let Some(payload) = &payload {
        argv.push(payload.clone());
      }
    }

    debug!(command = %argv[0], args = argv.len() - 1, "spawning process");

    let mut command = Command::new(&argv[0]);
    command
      .args(&argv[1..])
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    let feed_stdin = self.pass_to == PassTo::Stdin && payload.is_some();
    command.stdin(if feed_stdin { Stdio::piped() } else { Stdio::null() });

    let mut child = match command.spawn() {
      Ok(child) => child,
      Err(e) => return Ok(ConnectorResult::failure(vec![format!("spawn failed: {e}")])),
    };

    if feed_stdin {
      if let (Some(mut stdin), Some(payload)) = (child.stdin.take(), payload) {
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
          return Ok(ConnectorResult::failure(vec![format!(
            "failed to write stdin: {e}"
          )]));
        }
      }
    }

    let waited = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(waited) => waited,
        Err(_) => {
          return Ok(
            ConnectorResult::failure(vec!["timeout".to_string()])
              .with_meta("timeout", Value::Bool(true)),
          );
        }
      },
      None => child.wait_with_output().await,
    };

    let output = match waited {
      Ok(output) => output,
      Err(e) => return Ok(ConnectorResult::failure(vec![format!("wait failed: {e}")])),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().map(i64::from);
    let data = serde_json::from_str(&stdout).unwrap_or(Value::String(stdout));

    let mut notes = Vec::new();
    if !output.status.success() {
      notes.push(match code {
        Some(code) => format!("process exited with code {code}"),
        None => "process terminated by signal".to_string(),
      });
    }

    Ok(ConnectorResult {
      status: crate::result::ResultStatus {
        success: output.status.success(),
        code,
        notes,
      },
      data,
      meta: [
        ("stderr".to_string(), Value::String(stderr)),
        (
          "returncode".to_string(),
          code.map(Value::from).unwrap_or(Value::Null),
        ),
      ]
      .into_iter()
      .collect(),
    })
  }
}
