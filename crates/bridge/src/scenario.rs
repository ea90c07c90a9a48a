//! Scenario runner – execute scripted flows from YAML files against any
//! [`CommandChannel`].

use crate::channel::{Args, CommandChannel, TimeoutChannel};
use crate::devices::DeviceInventory;
use crate::types::Status;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioStep {
    Call {
        call: String,
        #[serde(default)]
        args: Args,
        #[serde(default)]
        expect_status: ExpectedOutcome,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    ListDevices {
        #[serde(deserialize_with = "null_as_default")]
        list_devices: DeviceExpectation,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceExpectation {
    #[serde(default)]
    pub expect_count: Option<usize>,
}

/// What a `call` step expects the channel to return. A channel call either
/// yields a value or an error, so these are the only two outcomes a step can
/// observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    #[default]
    Pass,
    Error,
}

impl std::fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExpectedOutcome::Pass => "pass",
            ExpectedOutcome::Error => "error",
        })
    }
}

/// `- list_devices:` with no body means "no expectations".
fn null_as_default<'de, D>(deserializer: D) -> Result<DeviceExpectation, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<DeviceExpectation>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: usize,
    pub target: String,
    /// `pass` when the outcome matched the expectation, `fail` otherwise.
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: Option<String>,
    pub overall_status: Status,
    pub step_results: Vec<StepResult>,
}

/// Load a scenario from a YAML string.
pub fn load_scenario(yaml: &str) -> Result<Scenario, String> {
    serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse scenario YAML: {}", e))
}

/// Execute every step in order and return the overall result. A failing step
/// does not stop the ones after it.
pub async fn run_scenario<C: CommandChannel>(scenario: &Scenario, channel: &C) -> ScenarioResult {
    let mut step_results = Vec::new();
    let mut overall = Status::Pass;

    for (i, step) in scenario.steps.iter().enumerate() {
        let start = Instant::now();
        let (target, matched, error) = match step {
            ScenarioStep::Call {
                call,
                args,
                expect_status,
                timeout_ms,
            } => {
                let bounded = TimeoutChannel::new(channel, Duration::from_millis(*timeout_ms));
                let outcome = bounded.invoke(call, args.clone()).await;
                let actual = if outcome.is_ok() {
                    ExpectedOutcome::Pass
                } else {
                    ExpectedOutcome::Error
                };
                if actual != *expect_status {
                    tracing::warn!(
                        step = i,
                        expected = %expect_status,
                        actual = %actual,
                        "scenario step status mismatch"
                    );
                }
                let error = outcome.err().map(|e| StepError {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                (call.clone(), actual == *expect_status, error)
            }
            ScenarioStep::ListDevices {
                list_devices,
                timeout_ms,
            } => {
                let bounded = TimeoutChannel::new(channel, Duration::from_millis(*timeout_ms));
                match DeviceInventory::new(bounded).list().await {
                    Ok(devices) => match list_devices.expect_count {
                        Some(n) if n != devices.len() => {
                            tracing::warn!(
                                step = i,
                                expected = n,
                                actual = devices.len(),
                                "scenario device count mismatch"
                            );
                            let error = StepError {
                                kind: "expectation".to_string(),
                                message: format!("expected {} devices, got {}", n, devices.len()),
                            };
                            ("list_devices".to_string(), false, Some(error))
                        }
                        _ => ("list_devices".to_string(), true, None),
                    },
                    Err(e) => {
                        let error = StepError {
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        };
                        ("list_devices".to_string(), false, Some(error))
                    }
                }
            }
        };

        let status = if matched { Status::Pass } else { Status::Fail };
        if status == Status::Fail {
            overall = Status::Fail;
        }
        step_results.push(StepResult {
            step: i,
            target,
            status,
            error,
            elapsed_ms: start.elapsed().as_millis() as u64,
        });
    }

    ScenarioResult {
        name: scenario.name.clone(),
        overall_status: overall,
        step_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Device;
    use crate::host::{Host, MemoryDeviceStore};
    use crate::local::LocalChannel;
    use std::sync::Arc;

    fn channel() -> LocalChannel {
        LocalChannel::new(Arc::new(Host::with_store(MemoryDeviceStore::new(vec![
            Device::new("dev1", "Camera"),
            Device::new("dev2", "Mic"),
        ]))))
    }

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: basic test
steps:
  - call: "ping"
    args: {}
    expect_status: "pass"
    timeout_ms: 5000
  - list_devices:
      expect_count: 2
"#;
        let s = load_scenario(yaml).expect("should parse");
        assert_eq!(s.name, Some("basic test".into()));
        assert_eq!(s.steps.len(), 2);
        assert!(matches!(
            s.steps[1],
            ScenarioStep::ListDevices {
                list_devices: DeviceExpectation {
                    expect_count: Some(2)
                },
                timeout_ms: 30_000
            }
        ));
    }

    #[test]
    fn test_parse_scenario_rejects_unknown_status() {
        let yaml = r#"
steps:
  - call: "ping"
    expect_status: "maybe"
"#;
        assert!(load_scenario(yaml).is_err());
    }

    #[test]
    fn test_parse_scenario_rejects_fail_expectation() {
        // A call either returns a value or an error; "fail" can never match.
        let yaml = r#"
steps:
  - call: "missing_command"
    expect_status: "fail"
"#;
        let err = load_scenario(yaml).unwrap_err();
        assert!(err.contains("failed to parse scenario YAML"));

        let yaml = r#"
steps:
  - call: "missing_command"
    expect_status: "error"
"#;
        let s = load_scenario(yaml).unwrap();
        assert!(matches!(
            s.steps[0],
            ScenarioStep::Call {
                expect_status: ExpectedOutcome::Error,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_bare_list_devices_step() {
        let yaml = r#"
steps:
  - list_devices:
  - list_devices:
    timeout_ms: 1000
"#;
        let scenario = load_scenario(yaml).unwrap();
        assert!(matches!(
            scenario.steps[0],
            ScenarioStep::ListDevices {
                list_devices: DeviceExpectation { expect_count: None },
                timeout_ms: 30_000
            }
        ));
        assert!(matches!(
            scenario.steps[1],
            ScenarioStep::ListDevices {
                timeout_ms: 1000,
                ..
            }
        ));

        let result = run_scenario(&scenario, &channel()).await;
        assert_eq!(result.overall_status, Status::Pass);
        assert!(result.step_results.iter().all(|r| r.error.is_none()));
    }

    #[tokio::test]
    async fn test_run_scenario_all_pass() {
        let yaml = r#"
steps:
  - call: "ping"
  - call: "get_device"
    args:
      id: "dev2"
  - call: "missing_command"
    expect_status: "error"
  - list_devices: {}
"#;
        let scenario = load_scenario(yaml).unwrap();
        let result = run_scenario(&scenario, &channel()).await;
        assert_eq!(result.overall_status, Status::Pass);
        assert_eq!(result.step_results.len(), 4);
        assert_eq!(result.step_results[2].error.as_ref().unwrap().kind, "command");
    }

    #[tokio::test]
    async fn test_run_scenario_reports_mismatch_and_continues() {
        let yaml = r#"
name: mismatches
steps:
  - list_devices:
      expect_count: 3
  - call: "nonexistent"
  - call: "ping"
"#;
        let scenario = load_scenario(yaml).unwrap();
        let result = run_scenario(&scenario, &channel()).await;
        assert_eq!(result.overall_status, Status::Fail);
        let statuses: Vec<Status> = result.step_results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Status::Fail, Status::Fail, Status::Pass]);
        assert_eq!(
            result.step_results[0].error.as_ref().unwrap().message,
            "expected 3 devices, got 2"
        );
    }
}
