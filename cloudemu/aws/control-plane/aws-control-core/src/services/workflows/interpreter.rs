//! The ASL execution engine (component I): walks a parsed state machine
//! from `StartAt` to a terminal state, handling `Retry`/`Catch`,
//! `Parallel`/`Map` concurrency, and JSONPath-flavored I/O along the way.
//!
//! Grounded on the synchronous single-branch walker this service used to
//! ship, generalized to cooperatively-concurrent `Parallel`/`Map`
//! branches and a real Retry/Catch ladder. The compute side is a trait
//! object (`aws_data_core::fabric::Invoker`) so this module never links
//! against the function-compute runtime directly.

use super::asl::{CatchConfig, MapState, ParallelState, RetryConfig, State, StateMachineDefinition, TaskState, WaitState};
use super::choice;
use super::template::{apply_input_path, apply_output_path, apply_result_path, apply_template};
use aws_data_core::fabric::Invoker;
use futures::future::{join_all, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MAX_TRANSITIONS: usize = 1000;

#[derive(Debug, Clone)]
pub struct StatesError {
    pub error: String,
    pub cause: Option<String>,
    pub is_timeout: bool,
}

impl StatesError {
    fn new(error: impl Into<String>, cause: Option<String>) -> Self {
        Self { error: error.into(), cause, is_timeout: false }
    }

    fn runtime(msg: impl Into<String>) -> Self {
        Self::new("States.Runtime", Some(msg.into()))
    }

    fn timeout(msg: impl Into<String>) -> Self {
        Self { error: "States.Timeout".into(), cause: Some(msg.into()), is_timeout: true }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: &'static str,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub cause: Option<String>,
    pub history: Vec<Value>,
}

enum RetryOutcome {
    Success(Value),
    Exhausted(StatesError),
}

#[derive(Clone)]
pub struct Engine {
    invoker: Arc<dyn Invoker>,
    max_wait_seconds: f64,
}

impl Engine {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker, max_wait_seconds: 5.0 }
    }

    pub async fn run(&self, definition: &StateMachineDefinition, input: Value) -> ExecutionResult {
        match self.run_state_machine(definition, input).await {
            Ok((output, history)) => ExecutionResult { status: "SUCCEEDED", output: Some(output), error: None, cause: None, history },
            Err(e) => ExecutionResult {
                status: if e.is_timeout { "TIMED_OUT" } else { "FAILED" },
                output: None,
                error: Some(e.error),
                cause: e.cause,
                history: Vec::new(),
            },
        }
    }

    fn run_state_machine<'a>(
        &'a self,
        definition: &'a StateMachineDefinition,
        input: Value,
    ) -> BoxFuture<'a, Result<(Value, Vec<Value>), StatesError>> {
        async move {
            let mut history = Vec::new();
            let mut current_name = definition.start_at.clone();
            let mut current = input;

            for _ in 0..MAX_TRANSITIONS {
                let state = definition
                    .states
                    .get(&current_name)
                    .ok_or_else(|| StatesError::runtime(format!("state not found: {current_name}")))?;
                let entry = current.clone();
                let (output, next, sub_histories) = self.execute_state(state, current).await?;
                let mut record = json!({"state": current_name, "type": state.type_name(), "input": entry, "output": output});
                if !sub_histories.is_empty() {
                    record["branches"] = json!(sub_histories);
                }
                history.push(record);
                current = output;
                match next {
                    Some(n) => current_name = n,
                    None => return Ok((current, history)),
                }
            }
            Err(StatesError::runtime(format!("exceeded {MAX_TRANSITIONS} state transitions")))
        }
        .boxed()
    }

    fn execute_state<'a>(
        &'a self,
        state: &'a State,
        input: Value,
    ) -> BoxFuture<'a, Result<(Value, Option<String>, Vec<Vec<Value>>), StatesError>> {
        async move {
            match state {
                State::Pass(s) => {
                    let effective = apply_input_path(&input, s.input_path.as_deref());
                    let effective = s.parameters.as_ref().map(|p| apply_template(p, &effective, &Value::Null)).unwrap_or(effective);
                    let result = s.result.clone().unwrap_or_else(|| effective.clone());
                    let merged = apply_result_path(&effective, result, s.result_path.as_ref());
                    let output = apply_output_path(&merged, s.output_path.as_deref());
                    Ok((output, next_of(&s.next, s.end), vec![]))
                }
                State::Task(s) => self.execute_task(s, input).await,
                State::Choice(s) => {
                    let effective = apply_input_path(&input, s.input_path.as_deref());
                    let next = choice::evaluate(&s.choices, &effective).or_else(|| s.default.clone());
                    let Some(next) = next else {
                        return Err(StatesError::new("States.NoChoiceMatched", Some("no Choice rule matched and no Default".into())));
                    };
                    let output = apply_output_path(&effective, s.output_path.as_deref());
                    Ok((output, Some(next), vec![]))
                }
                State::Wait(s) => {
                    let effective = apply_input_path(&input, s.input_path.as_deref());
                    let seconds = resolve_wait_seconds(s, &effective).min(self.max_wait_seconds).max(0.0);
                    if seconds > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                    }
                    let output = apply_output_path(&effective, s.output_path.as_deref());
                    Ok((output, next_of(&s.next, s.end), vec![]))
                }
                State::Succeed(s) => {
                    let effective = apply_input_path(&input, s.input_path.as_deref());
                    let output = apply_output_path(&effective, s.output_path.as_deref());
                    Ok((output, None, vec![]))
                }
                State::Fail(s) => Err(StatesError::new(
                    s.error.clone().unwrap_or_else(|| "States.Fail".to_string()),
                    s.cause.clone(),
                )),
                State::Parallel(s) => self.execute_parallel(s, input).await,
                State::Map(s) => self.execute_map(s, input).await,
            }
        }
        .boxed()
    }

    // -- Task -------------------------------------------------------

    async fn execute_task(&self, state: &TaskState, input: Value) -> Result<(Value, Option<String>, Vec<Vec<Value>>), StatesError> {
        let effective = apply_input_path(&input, state.input_path.as_deref());
        let effective = state.parameters.as_ref().map(|p| apply_template(p, &effective, &Value::Null)).unwrap_or(effective);

        match self.invoke_with_retry(state, &effective).await {
            Ok(result) => {
                let result = state.result_selector.as_ref().map(|p| apply_template(p, &result, &Value::Null)).unwrap_or(result);
                let merged = apply_result_path(&input, result, state.result_path.as_ref());
                let output = apply_output_path(&merged, state.output_path.as_deref());
                Ok((output, next_of(&state.next, state.end), vec![]))
            }
            Err(e) => match apply_catch(state.catch.as_deref(), &input, &e) {
                Some((output, next)) => Ok((output, Some(next), vec![])),
                None => Err(e),
            },
        }
    }

    async fn invoke_with_retry(&self, state: &TaskState, input: &Value) -> Result<Value, StatesError> {
        let Some(retries) = state.retry.as_ref().filter(|r| !r.is_empty()) else {
            return self.invoke_task(state, input).await;
        };

        let mut last_error = None;
        for retry in retries {
            match self.attempt_retry_block(state, input, retry).await? {
                RetryOutcome::Success(v) => return Ok(v),
                RetryOutcome::Exhausted(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| StatesError::runtime("unexpected retry state")))
    }

    async fn attempt_retry_block(&self, state: &TaskState, input: &Value, retry: &RetryConfig) -> Result<RetryOutcome, StatesError> {
        let mut last_error = None;
        for attempt in 0..=retry.max_attempts {
            match self.invoke_task(state, input).await {
                Ok(v) => return Ok(RetryOutcome::Success(v)),
                Err(e) => {
                    if !error_matches(&e.error, &retry.error_equals) {
                        return Err(e);
                    }
                    if attempt < retry.max_attempts {
                        let delay = retry_delay(retry, attempt);
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                    last_error = Some(e);
                }
            }
        }
        Ok(RetryOutcome::Exhausted(last_error.unwrap_or_else(|| StatesError::runtime("unexpected retry state"))))
    }

    async fn invoke_task(&self, state: &TaskState, payload: &Value) -> Result<Value, StatesError> {
        let call = self.invoker.invoke(&state.resource, payload.clone());
        let result = match state.timeout_seconds {
            Some(secs) => tokio::time::timeout(Duration::from_secs_f64(secs), call)
                .await
                .map_err(|_| StatesError::timeout(format!("task timed out after {secs}s")))?,
            None => call.await,
        };
        result.map_err(|e| StatesError::new("States.TaskFailed", Some(e.message())))
    }

    // -- Parallel -----------------------------------------------------

    async fn execute_parallel(&self, state: &ParallelState, input: Value) -> Result<(Value, Option<String>, Vec<Vec<Value>>), StatesError> {
        let effective = apply_input_path(&input, state.input_path.as_deref());

        let branch_results = join_all(state.branches.iter().map(|branch| self.run_state_machine(branch, effective.clone()))).await;

        let mut outputs = Vec::with_capacity(branch_results.len());
        let mut histories = Vec::with_capacity(branch_results.len());
        for result in branch_results {
            match result {
                Ok((output, history)) => {
                    outputs.push(output);
                    histories.push(history);
                }
                Err(e) => {
                    return match apply_catch(state.catch.as_deref(), &input, &e) {
                        Some((output, next)) => Ok((output, Some(next), vec![])),
                        None => Err(e),
                    };
                }
            }
        }

        let result = state.result_selector.as_ref().map(|p| apply_template(p, &json!(outputs), &Value::Null)).unwrap_or(json!(outputs));
        let merged = apply_result_path(&input, result, state.result_path.as_ref());
        let output = apply_output_path(&merged, state.output_path.as_deref());
        Ok((output, next_of(&state.next, state.end), histories))
    }

    // -- Map ------------------------------------------------------------

    async fn execute_map(&self, state: &MapState, input: Value) -> Result<(Value, Option<String>, Vec<Vec<Value>>), StatesError> {
        let effective = apply_input_path(&input, state.input_path.as_deref());
        let items = resolve_map_items(state, &effective)?;

        let concurrency = if state.max_concurrency == 0 { items.len().max(1) } else { state.max_concurrency };

        let iterations = stream::iter(items.into_iter().enumerate().map(|(index, item)| {
            let item_input = build_map_item_input(state, &effective, &item, index);
            self.run_state_machine(&state.iterator, item_input)
        }))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

        let mut outputs = Vec::with_capacity(iterations.len());
        let mut histories = Vec::with_capacity(iterations.len());
        for result in iterations {
            match result {
                Ok((output, history)) => {
                    outputs.push(output);
                    histories.push(history);
                }
                Err(e) => {
                    return match apply_catch(state.catch.as_deref(), &input, &e) {
                        Some((output, next)) => Ok((output, Some(next), vec![])),
                        None => Err(e),
                    };
                }
            }
        }

        let result = state.result_selector.as_ref().map(|p| apply_template(p, &json!(outputs), &Value::Null)).unwrap_or(json!(outputs));
        let merged = apply_result_path(&effective, result, state.result_path.as_ref());
        let output = apply_output_path(&merged, state.output_path.as_deref());
        Ok((output, next_of(&state.next, state.end), histories))
    }
}

fn next_of(next: &Option<String>, end: bool) -> Option<String> {
    if end { None } else { next.clone() }
}

fn error_matches(error: &str, error_equals: &[String]) -> bool {
    error_equals.iter().any(|e| e == "States.ALL" || e == error)
}

fn retry_delay(retry: &RetryConfig, attempt: u32) -> f64 {
    let delay = retry.interval_seconds * retry.backoff_rate.powi(attempt as i32);
    retry.max_delay_seconds.map(|max| delay.min(max)).unwrap_or(delay)
}

fn apply_catch(catches: Option<&[CatchConfig]>, input: &Value, err: &StatesError) -> Option<(Value, String)> {
    let catch = catches?.iter().find(|c| error_matches(&err.error, &c.error_equals))?;
    let error_info = json!({"Error": err.error, "Cause": err.cause.clone().unwrap_or_default()});
    let output = apply_result_path(input, error_info, catch.result_path.as_ref());
    Some((output, catch.next.clone()))
}

fn resolve_wait_seconds(state: &WaitState, input: &Value) -> f64 {
    if let Some(s) = state.seconds {
        return s;
    }
    if let Some(p) = &state.seconds_path {
        return aws_data_core::path::extract(p, input).ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    }
    if let Some(ts) = &state.timestamp {
        return seconds_until(ts);
    }
    if let Some(p) = &state.timestamp_path {
        if let Some(ts) = aws_data_core::path::extract(p, input).ok().and_then(|v| v.as_str().map(str::to_string)) {
            return seconds_until(&ts);
        }
    }
    0.0
}

fn seconds_until(timestamp: &str) -> f64 {
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(target) => (target.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_milliseconds() as f64 / 1000.0,
        Err(e) => {
            warn!(timestamp, error = %e, "unparseable Wait timestamp, treating as elapsed");
            0.0
        }
    }
    .max(0.0)
}

fn resolve_map_items(state: &MapState, effective: &Value) -> Result<Vec<Value>, StatesError> {
    let items = match state.items_path.as_deref() {
        None | Some("$") => effective.clone(),
        Some(p) => aws_data_core::path::extract(p, effective).unwrap_or(Value::Null),
    };
    match items {
        Value::Array(items) => Ok(items),
        _ => Err(StatesError::runtime("Map state items must resolve to an array")),
    }
}

fn build_map_item_input(state: &MapState, effective: &Value, item: &Value, index: usize) -> Value {
    match &state.parameters {
        Some(template) => {
            let context = json!({"Map": {"Item": {"Value": item, "Index": index}}});
            apply_template(template, effective, &context)
        }
        None => item.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoInvoker {
        calls: Mutex<u32>,
        fail_first_n: u32,
    }

    #[async_trait]
    impl Invoker for EchoInvoker {
        async fn invoke(&self, _function_name: &str, payload: Value) -> aws_data_core::error::Result<Value> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.fail_first_n {
                return Err(aws_data_core::error::EmulatorError::Internal("boom".into()));
            }
            Ok(payload)
        }
    }

    fn def(json_str: &str) -> StateMachineDefinition {
        serde_json::from_str(json_str).unwrap()
    }

    #[tokio::test]
    async fn pass_and_choice_states() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 0 }));
        let definition = def(
            r#"{
                "StartAt": "Check",
                "States": {
                    "Check": {"Type": "Choice", "Choices": [{"Variable": "$.n", "NumericGreaterThan": 10, "Next": "Big"}], "Default": "Small"},
                    "Big": {"Type": "Pass", "Result": "big", "End": true},
                    "Small": {"Type": "Pass", "Result": "small", "End": true}
                }
            }"#,
        );
        let result = engine.run(&definition, json!({"n": 20})).await;
        assert_eq!(result.status, "SUCCEEDED");
        assert_eq!(result.output.unwrap(), json!("big"));
    }

    #[tokio::test]
    async fn task_retries_then_succeeds() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 2 }));
        let definition = def(
            r#"{
                "StartAt": "Do",
                "States": {
                    "Do": {
                        "Type": "Task",
                        "Resource": "fn",
                        "Retry": [{"ErrorEquals": ["States.ALL"], "IntervalSeconds": 0, "MaxAttempts": 3, "BackoffRate": 1.0}],
                        "End": true
                    }
                }
            }"#,
        );
        let result = engine.run(&definition, json!({"x": 1})).await;
        assert_eq!(result.status, "SUCCEEDED");
        assert_eq!(result.output.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn task_catch_routes_to_recovery_state() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 99 }));
        let definition = def(
            r#"{
                "StartAt": "Do",
                "States": {
                    "Do": {
                        "Type": "Task",
                        "Resource": "fn",
                        "Catch": [{"ErrorEquals": ["States.ALL"], "ResultPath": "$.error", "Next": "Recover"}],
                        "End": true
                    },
                    "Recover": {"Type": "Pass", "End": true}
                }
            }"#,
        );
        let result = engine.run(&definition, json!({"x": 1})).await;
        assert_eq!(result.status, "SUCCEEDED");
        assert_eq!(result.output.unwrap(), json!({"x": 1, "error": {"Error": "States.TaskFailed", "Cause": "boom"}}));
    }

    #[tokio::test]
    async fn parallel_runs_branches_concurrently() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 0 }));
        let definition = def(
            r#"{
                "StartAt": "Both",
                "States": {
                    "Both": {
                        "Type": "Parallel",
                        "Branches": [
                            {"StartAt": "A", "States": {"A": {"Type": "Pass", "Result": 1, "End": true}}},
                            {"StartAt": "B", "States": {"B": {"Type": "Pass", "Result": 2, "End": true}}}
                        ],
                        "End": true
                    }
                }
            }"#,
        );
        let result = engine.run(&definition, Value::Null).await;
        assert_eq!(result.status, "SUCCEEDED");
        assert_eq!(result.output.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn map_iterates_items_with_bounded_concurrency() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 0 }));
        let definition = def(
            r#"{
                "StartAt": "ForEach",
                "States": {
                    "ForEach": {
                        "Type": "Map",
                        "MaxConcurrency": 2,
                        "Iterator": {"StartAt": "Double", "States": {"Double": {"Type": "Pass", "End": true}}},
                        "End": true
                    }
                }
            }"#,
        );
        let result = engine.run(&definition, json!([1, 2, 3])).await;
        assert_eq!(result.status, "SUCCEEDED");
        assert_eq!(result.output.unwrap(), json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn fail_state_propagates_named_error() {
        let engine = Engine::new(Arc::new(EchoInvoker { calls: Mutex::new(0), fail_first_n: 0 }));
        let definition = def(
            r#"{
                "StartAt": "Boom",
                "States": {"Boom": {"Type": "Fail", "Error": "Custom.Error", "Cause": "nope"}}
            }"#,
        );
        let result = engine.run(&definition, Value::Null).await;
        assert_eq!(result.status, "FAILED");
        assert_eq!(result.error.unwrap(), "Custom.Error");
    }
}
