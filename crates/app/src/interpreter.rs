//! Sequence interpreter.
//!
//! Steps run strictly in order against one binding environment. Every
//! command step's response is bound under its alias (or `step_<index>`) so
//! later steps can reference it. Conditional chains are walked in a loop;
//! only nested `sequence` and `run_routine` commands recurse, and their
//! depth is bounded when they are parsed.

use std::future::Future;
use std::pin::Pin;

use pinhub_domain::command::Command;
use pinhub_domain::error::PinHubError;
use pinhub_domain::sequence::{Bindings, CommandStep, ErrorPolicy, Step, StepKind};
use serde_json::{Value, json};

use crate::dispatcher::Dispatcher;
use crate::ports::{ConfigStore, Peripherals, PinIo};
use crate::response::{Failure, Fields, Outcome};

/// Bookkeeping for one run.
#[derive(Default)]
struct Run {
    bindings: Bindings,
    results: Vec<Value>,
    failed_steps: Vec<usize>,
    /// First failure that was continued past.
    continued: Option<(usize, String, PinHubError)>,
}

impl Run {
    fn summary(&self) -> Fields {
        let mut out = Fields::new();
        out.insert("steps_run".into(), self.results.len().into());
        out.insert("results".into(), Value::Array(self.results.clone()));
        out.insert("failed_steps".into(), json!(self.failed_steps));
        out
    }

    fn abort(self, index: usize, alias: String, error: PinHubError) -> Failure {
        let summary = self.summary();
        let mut failure = Failure::new(PinHubError::StepFailed {
            index,
            alias,
            source: Box::new(error),
        })
        .with("stopped_at_step", index);
        failure.context.extend(summary);
        failure
    }

    fn finish(self) -> Outcome {
        let summary = self.summary();
        match self.continued {
            None => Ok(summary),
            Some((index, alias, error)) => {
                let mut failure = Failure::new(PinHubError::StepFailed {
                    index,
                    alias,
                    source: Box::new(error),
                })
                .with("completed", true);
                failure.context.extend(summary);
                Err(failure)
            }
        }
    }
}

impl<S, P, X> Dispatcher<S, P, X>
where
    S: ConfigStore + Clone,
    P: PinIo,
    X: Peripherals,
{
    /// Run parsed steps. Succeeds only when no step failed, even if the
    /// failures were continued past.
    pub(crate) async fn run_sequence(&self, steps: &[Step]) -> Outcome {
        let mut run = Run::default();
        for (index, step) in steps.iter().enumerate() {
            let mut current = step;
            let command = loop {
                match &current.kind {
                    StepKind::Command(command) => break Some(command),
                    StepKind::Conditional {
                        condition,
                        then,
                        otherwise,
                    } => {
                        let met = match condition.evaluate(&run.bindings) {
                            Ok(met) => met,
                            Err(err) => {
                                run.results.push(json!({
                                    "_step": index,
                                    "_type": "condition",
                                    "condition": condition.source(),
                                    "error": err.to_string(),
                                }));
                                let alias = condition.source().to_string();
                                return Err(run.abort(index, alias, err.into()));
                            }
                        };
                        let branch = if met { Some(then) } else { otherwise.as_ref() };
                        let taken = match (met, branch) {
                            (_, None) => "none",
                            (true, Some(_)) => "then",
                            (false, Some(_)) => "else",
                        };
                        run.results.push(json!({
                            "_step": index,
                            "_type": "condition",
                            "condition": condition.source(),
                            "condition_met": met,
                            "branch_taken": taken,
                        }));
                        match branch {
                            Some(branch) => current = &**branch,
                            None => break None,
                        }
                    }
                }
            };
            let Some(command) = command else {
                continue;
            };

            let name = command.binding_name(index);
            let outcome = self.run_step(command, current.depth, &run.bindings).await;
            let mut entry = match &outcome {
                Ok(fields) => {
                    let mut entry = Fields::new();
                    entry.insert("success".into(), Value::Bool(true));
                    entry.extend(fields.clone());
                    entry
                }
                Err(failure) => failure.to_fields(),
            };
            run.bindings.bind(name.clone(), Value::Object(entry.clone()));
            entry.insert("_step".into(), index.into());
            entry.insert("_name".into(), name.clone().into());
            run.results.push(Value::Object(entry));

            if let Err(failure) = outcome {
                tracing::info!(step = index, alias = %name, error = %failure.error, "step failed");
                if command.on_error == ErrorPolicy::Continue {
                    run.failed_steps.push(index);
                    if run.continued.is_none() {
                        run.continued = Some((index, name, failure.error));
                    }
                } else {
                    return Err(run.abort(index, name, failure.error));
                }
            }
        }
        run.finish()
    }

    /// Substitute references, parse, and dispatch one command step.
    async fn run_step(&self, step: &CommandStep, depth: usize, bindings: &Bindings) -> Outcome {
        let request = step.render(bindings).map_err(PinHubError::from)?;
        let command = Command::parse(&request, depth)?;
        let nested: Pin<Box<dyn Future<Output = Outcome> + '_>> =
            Box::pin(self.execute(command, depth));
        nested.await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{FakePeripherals, FakePins, MemoryStore};

    type TestDispatcher = Dispatcher<MemoryStore, FakePins, FakePeripherals>;

    fn dispatcher() -> (TestDispatcher, FakePins) {
        let pins = FakePins::default();
        let dispatcher = Dispatcher::new(
            MemoryStore::default(),
            pins.clone(),
            FakePeripherals::with_dht(21.5, 75.0),
        );
        (dispatcher, pins)
    }

    async fn run(dispatcher: &TestDispatcher, steps: Value) -> Value {
        dispatcher
            .handle(&json!({"command": "sequence", "steps": steps}))
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn should_substitute_bound_values_into_later_steps() {
        let (dispatcher, _) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"command": "dht_read", "device": 4, "as": "w"},
                {"command": "lcd_print", "text": "Temp: {w.temperature_c}C"},
            ]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(response["results"][1]["text"], "Temp: 21.5C");
        assert_eq!(response["results"][0]["_name"], "w");
        assert_eq!(response["results"][1]["_name"], "step_1");
    }

    #[tokio::test(start_paused = true)]
    async fn should_take_then_branch_when_condition_holds() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"command": "dht_read", "device": 4, "as": "w"},
                {
                    "if": "{w.humidity_pct} > 70",
                    "then": {"command": "activate", "device": 17},
                    "else": {"command": "activate", "device": 27}
                },
            ]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(pins.level(17), Some(true));
        assert_eq!(pins.level(27), None);
        assert_eq!(response["results"][1]["_type"], "condition");
        assert_eq!(response["results"][1]["branch_taken"], "then");
        assert_eq!(response["steps_run"], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_take_else_branch_otherwise() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"command": "dht_read", "device": 4, "as": "w"},
                {
                    "if": "{w.humidity_pct} > 80",
                    "then": {"command": "activate", "device": 17},
                    "else": {"command": "activate", "device": 27}
                },
            ]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(pins.level(17), None);
        assert_eq!(pins.level(27), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn should_record_no_branch_without_else() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"if": "1 > 2", "then": {"command": "activate", "device": 17}},
                {"command": "activate", "device": 27},
            ]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(response["results"][0]["branch_taken"], "none");
        assert_eq!(pins.level(17), None);
        assert_eq!(pins.level(27), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn should_follow_nested_conditionals() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([{
                "if": "DHT22 == DHT22",
                "then": {"if": "2 >= 2", "then": {"command": "activate", "device": 5}}
            }]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(pins.level(5), Some(true));
        assert_eq!(response["steps_run"], 3);
        assert_eq!(response["results"][2]["_step"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_abort_on_first_failure() {
        let (dispatcher, pins) = dispatcher();
        pins.fail(6);
        let response = run(
            &dispatcher,
            json!([
                {"command": "activate", "device": 5},
                {"command": "activate", "device": 6},
                {"command": "activate", "device": 7},
            ]),
        )
        .await;
        assert_eq!(response["success"], false);
        assert_eq!(response["stopped_at_step"], 1);
        assert_eq!(response["steps_run"], 2);
        assert_eq!(pins.level(7), None);
        assert!(
            response["error"]
                .as_str()
                .unwrap()
                .starts_with("step 1 ('step_1') failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_continue_past_failure_but_report_it() {
        let (dispatcher, pins) = dispatcher();
        pins.fail(6);
        let response = run(
            &dispatcher,
            json!([
                {"command": "activate", "device": 5},
                {"command": "activate", "device": 6, "on_error": "continue"},
                {"command": "activate", "device": 7},
            ]),
        )
        .await;
        assert_eq!(response["success"], false);
        assert_eq!(response["completed"], true);
        assert_eq!(response["failed_steps"], json!([1]));
        assert_eq!(response["steps_run"], 3);
        assert_eq!(pins.level(7), Some(true));
        assert!(response.get("stopped_at_step").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_bind_failed_results_too() {
        let (dispatcher, pins) = dispatcher();
        pins.fail(6);
        let response = run(
            &dispatcher,
            json!([
                {"command": "read", "device": 6, "as": "r", "on_error": "continue"},
                {"if": "{r.success} == false", "then": {"command": "activate", "device": 9}},
            ]),
        )
        .await;
        assert_eq!(pins.level(9), Some(true));
        assert_eq!(response["failed_steps"], json!([0]));
    }

    #[tokio::test(start_paused = true)]
    async fn should_treat_unresolved_reference_as_step_failure() {
        let (dispatcher, _) = dispatcher();
        let response = run(
            &dispatcher,
            json!([{"command": "lcd_print", "text": "{ghost.value}"}]),
        )
        .await;
        assert_eq!(response["success"], false);
        assert_eq!(response["error_kind"], "expression");
        assert_eq!(response["results"][0]["success"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn should_always_abort_on_condition_error() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"command": "dht_read", "device": 4, "as": "w"},
                {"if": "{w.sensor_type} > 3", "then": {"command": "activate", "device": 5, "on_error": "continue"}},
                {"command": "activate", "device": 6},
            ]),
        )
        .await;
        assert_eq!(response["success"], false);
        assert_eq!(response["error_kind"], "expression");
        assert_eq!(response["stopped_at_step"], 1);
        assert_eq!(pins.level(6), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_nested_sequence_with_its_own_bindings() {
        let (dispatcher, pins) = dispatcher();
        let response = run(
            &dispatcher,
            json!([
                {"command": "activate", "device": 5, "as": "outer"},
                {"command": "sequence", "steps": [
                    {"command": "read", "device": 5, "as": "inner"},
                ], "as": "nested"},
                {"if": "{nested.results.0.value} == true", "then": {"command": "activate", "device": 8}},
            ]),
        )
        .await;
        assert_eq!(response["success"], true);
        assert_eq!(pins.level(8), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_routine_recursing_past_the_depth_limit() {
        let (dispatcher, _) = dispatcher();
        dispatcher
            .handle(&json!({
                "command": "save_routine",
                "name": "loop",
                "steps": [{"command": "run_routine", "name": "loop"}],
            }))
            .await;
        let response = dispatcher
            .handle(&json!({"command": "run_routine", "name": "loop"}))
            .await;
        assert_eq!(response["success"], false);
        assert_eq!(response["error_kind"], "structural");
        assert_eq!(response["routine"], "loop");
    }
}
