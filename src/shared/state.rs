//! Workflow states and the transition table that guards them

use std::fmt;

/// Where the capture -> analyze -> display workflow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    /// Waiting for the user to start
    #[default]
    Idle,
    /// Camera stream is live and waiting for a capture
    CameraActive,
    /// A captured image is out for analysis
    Analyzing,
    /// Analysis finished and its shapes are displayed
    ResultsShown,
    /// Analysis failed and a message is displayed
    Error,
}

/// Events that drive the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    Start,
    Captured,
    Cancel,
    AnalysisSucceeded,
    AnalysisFailed,
    Reset,
}

/// An event was issued in a state that does not accept it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Event {event:?} is not valid in state {from:?}")]
pub struct TransitionError {
    pub from: WorkflowState,
    pub event: WorkflowEvent,
}

impl WorkflowState {
    /// Next state for `event`, or an error if the event is not accepted here
    pub fn on(self, event: WorkflowEvent) -> Result<WorkflowState, TransitionError> {
        use WorkflowEvent as E;
        use WorkflowState as S;

        let next = match (self, event) {
            (_, E::Reset) => S::Idle,
            (S::Idle, E::Start) => S::CameraActive,
            (S::CameraActive, E::Captured) => S::Analyzing,
            (S::CameraActive, E::Cancel) => S::Idle,
            (S::Analyzing, E::AnalysisSucceeded) => S::ResultsShown,
            (S::Analyzing, E::AnalysisFailed) => S::Error,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }

    /// Whether a captured image must be held in this state
    pub fn holds_image(self) -> bool {
        matches!(
            self,
            WorkflowState::Analyzing | WorkflowState::ResultsShown | WorkflowState::Error
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::CameraActive => "camera active",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::ResultsShown => "results shown",
            WorkflowState::Error => "error",
        };
        f.write_str(name)
    }
}
