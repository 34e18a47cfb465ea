//! Fixed step sequence of a run and its per-step state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FetchImagery,
    FetchDem,
    FetchOsm,
    ComputeFeatures,
    Score,
    ExtractTargets,
    GenerateOutputs,
}

impl Step {
    /// Execution order.
    pub const ALL: [Step; 7] = [
        Step::FetchImagery,
        Step::FetchDem,
        Step::FetchOsm,
        Step::ComputeFeatures,
        Step::Score,
        Step::ExtractTargets,
        Step::GenerateOutputs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::FetchImagery => "fetch_imagery",
            Step::FetchDem => "fetch_dem",
            Step::FetchOsm => "fetch_osm",
            Step::ComputeFeatures => "compute_features",
            Step::Score => "score",
            Step::ExtractTargets => "extract_targets",
            Step::GenerateOutputs => "generate_outputs",
        }
    }

    fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Done,
    Failed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Done => "done",
            StepState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub step: Step,
    pub state: StepState,
}

/// Proof that a step is running. Not `Clone`: a step finishes exactly once.
#[derive(Debug)]
#[must_use = "a running step must be completed or failed"]
pub struct ActiveStep {
    step: Step,
}

/// Per-step states in execution order.
///
/// Steps can only start in order, one at a time, and nothing starts after a
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequence {
    states: [StepState; 7],
}

impl StepSequence {
    pub fn new() -> Self {
        Self { states: [StepState::Pending; 7] }
    }

    /// Start `step`. Only the first pending step may start, and only while no
    /// step is running or failed.
    pub fn begin(&mut self, step: Step) -> Result<ActiveStep> {
        if self.states.iter().any(|s| matches!(s, StepState::Running | StepState::Failed)) {
            return Err(PipelineError::Computation(format!(
                "cannot start `{step}` while another step is running or has failed"
            )));
        }
        match self.next_pending() {
            Some(next) if next == step => {
                self.states[step.position()] = StepState::Running;
                Ok(ActiveStep { step })
            }
            Some(next) => Err(PipelineError::Computation(format!("`{step}` started before `{next}`"))),
            None => Err(PipelineError::Computation(format!("`{step}` started after the sequence finished"))),
        }
    }

    pub fn complete(&mut self, active: ActiveStep) -> Step {
        self.states[active.step.position()] = StepState::Done;
        active.step
    }

    pub fn fail(&mut self, active: ActiveStep) -> Step {
        self.states[active.step.position()] = StepState::Failed;
        active.step
    }

    pub fn state(&self, step: Step) -> StepState {
        self.states[step.position()]
    }

    pub fn next_pending(&self) -> Option<Step> {
        Step::ALL.into_iter().find(|s| self.state(*s) == StepState::Pending)
    }

    pub fn last_completed(&self) -> Option<Step> {
        Step::ALL.into_iter().rev().find(|s| self.state(*s) == StepState::Done)
    }

    pub fn is_finished(&self) -> bool {
        self.states.iter().all(|s| *s == StepState::Done)
    }

    pub fn snapshot(&self) -> Vec<StepStatus> {
        Step::ALL.into_iter().map(|step| StepStatus { step, state: self.state(step) }).collect()
    }
}

impl Default for StepSequence {
    fn default() -> Self {
        Self::new()
    }
}
