//! Amazon States Language definition types.
//!
//! State machine JSON is deserialized straight into this tree via serde's
//! internally-tagged enum support, so a malformed `Type` or a state
//! missing a required field fails at parse time rather than mid-execution.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct StateMachineDefinition {
    #[serde(rename = "StartAt")]
    pub start_at: String,
    #[serde(rename = "States")]
    pub states: HashMap<String, State>,
    #[serde(rename = "TimeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "Type")]
pub enum State {
    Pass(PassState),
    Task(TaskState),
    Choice(ChoiceState),
    Wait(WaitState),
    Succeed(SucceedState),
    Fail(FailState),
    Parallel(ParallelState),
    Map(MapState),
}

impl State {
    pub fn type_name(&self) -> &'static str {
        match self {
            State::Pass(_) => "Pass",
            State::Task(_) => "Task",
            State::Choice(_) => "Choice",
            State::Wait(_) => "Wait",
            State::Succeed(_) => "Succeed",
            State::Fail(_) => "Fail",
            State::Parallel(_) => "Parallel",
            State::Map(_) => "Map",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub result_path: Option<Value>,
    pub parameters: Option<Value>,
    pub result: Option<Value>,
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub resource: String,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub result_path: Option<Value>,
    pub parameters: Option<Value>,
    pub result_selector: Option<Value>,
    pub timeout_seconds: Option<f64>,
    pub retry: Option<Vec<RetryConfig>>,
    pub catch: Option<Vec<CatchConfig>>,
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryConfig {
    pub error_equals: Vec<String>,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    pub max_delay_seconds: Option<f64>,
}

fn default_interval_seconds() -> f64 {
    1.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_rate() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatchConfig {
    pub error_equals: Vec<String>,
    pub result_path: Option<Value>,
    pub next: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub choices: Vec<Value>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub seconds: Option<f64>,
    pub seconds_path: Option<String>,
    pub timestamp: Option<String>,
    pub timestamp_path: Option<String>,
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SucceedState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailState {
    pub error: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub result_path: Option<Value>,
    pub result_selector: Option<Value>,
    pub branches: Vec<StateMachineDefinition>,
    pub retry: Option<Vec<RetryConfig>>,
    pub catch: Option<Vec<CatchConfig>>,
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapState {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub items_path: Option<String>,
    pub result_path: Option<Value>,
    pub result_selector: Option<Value>,
    pub parameters: Option<Value>,
    #[serde(default)]
    pub max_concurrency: usize,
    pub iterator: StateMachineDefinition,
    pub retry: Option<Vec<RetryConfig>>,
    pub catch: Option<Vec<CatchConfig>>,
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}
