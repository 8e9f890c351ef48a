//! Workflow Coordinator
//!
//! Drives capture -> analyze -> display as an explicit state machine.
//! The phase owns whatever the current state needs: the camera session while
//! the camera is active, the captured image from then on, and the result or
//! error message once analysis settles. Events not accepted by the current
//! state are rejected without touching it.

use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisError, Analyzer};
use crate::capture::{CameraSession, CaptureController, CaptureError, FacingMode};
use crate::shared::{
    AnalysisResult, EncodedImage, TransitionError, WorkflowEvent, WorkflowState,
};

/// Errors returned to the caller of a workflow event
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The event is not valid in the current state
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The camera could not be acquired or read
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

enum Phase {
    Idle,
    CameraActive(CameraSession),
    Analyzing(EncodedImage),
    ResultsShown {
        image: EncodedImage,
        result: AnalysisResult,
    },
    Error {
        image: EncodedImage,
        message: String,
    },
}

impl Phase {
    fn state(&self) -> WorkflowState {
        match self {
            Phase::Idle => WorkflowState::Idle,
            Phase::CameraActive(_) => WorkflowState::CameraActive,
            Phase::Analyzing(_) => WorkflowState::Analyzing,
            Phase::ResultsShown { .. } => WorkflowState::ResultsShown,
            Phase::Error { .. } => WorkflowState::Error,
        }
    }
}

/// Coordinates the camera and the analyzer for one user at a time
pub struct WorkflowController<A: Analyzer> {
    capture: CaptureController,
    analyzer: A,
    preferred_facing: FacingMode,
    phase: Phase,
}

impl<A: Analyzer> WorkflowController<A> {
    /// Create a workflow in the `Idle` state
    pub fn new(capture: CaptureController, analyzer: A, preferred_facing: FacingMode) -> Self {
        Self {
            capture,
            analyzer,
            preferred_facing,
            phase: Phase::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> WorkflowState {
        self.phase.state()
    }

    /// Image captured for the current analysis, if any
    pub fn captured_image(&self) -> Option<&EncodedImage> {
        match &self.phase {
            Phase::Analyzing(image)
            | Phase::ResultsShown { image, .. }
            | Phase::Error { image, .. } => Some(image),
            Phase::Idle | Phase::CameraActive(_) => None,
        }
    }

    /// Shapes from the last analysis, only in `ResultsShown`
    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        match &self.phase {
            Phase::ResultsShown { result, .. } => Some(result),
            _ => None,
        }
    }

    /// User-facing failure message, only in `Error`
    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    fn enter(&mut self, phase: Phase, event: WorkflowEvent) {
        let from = self.state();
        self.phase = phase;
        debug!("Workflow {} -> {} on {:?}", from, self.state(), event);
    }

    fn guard(&self, event: WorkflowEvent) -> Result<WorkflowState, TransitionError> {
        self.state().on(event).map_err(|e| {
            warn!("{}", e);
            e
        })
    }

    /// Open the camera; on `CameraUnavailable` the workflow stays `Idle`
    pub async fn start(&mut self) -> Result<(), WorkflowError> {
        self.guard(WorkflowEvent::Start)?;

        match self.capture.acquire(self.preferred_facing).await {
            Ok(session) => {
                self.enter(Phase::CameraActive(session), WorkflowEvent::Start);
                Ok(())
            }
            Err(e) => {
                error!("Camera start cancelled: {}", e);
                Err(e.into())
            }
        }
    }

    /// Close the camera without capturing
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.guard(WorkflowEvent::Cancel)?;
        if let Phase::CameraActive(session) = std::mem::replace(&mut self.phase, Phase::Idle) {
            self.capture.release(session);
        }
        debug!("Workflow camera active -> idle on Cancel");
        Ok(())
    }

    /// Capture a frame, release the camera and run the analysis to completion
    ///
    /// Returns the state the workflow settled in: `ResultsShown` or `Error`.
    /// A frame that cannot be captured leaves the camera active.
    pub async fn capture(&mut self) -> Result<WorkflowState, WorkflowError> {
        let from = self.state();
        self.guard(WorkflowEvent::Captured)?;

        let mut session = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::CameraActive(session) => session,
            other => {
                self.phase = other;
                return Err(TransitionError {
                    from,
                    event: WorkflowEvent::Captured,
                }
                .into());
            }
        };

        let image = match self.capture.capture_frame(&mut session) {
            Ok(image) => image,
            Err(e) => {
                warn!("Frame capture failed, camera stays active: {}", e);
                self.phase = Phase::CameraActive(session);
                return Err(e.into());
            }
        };
        self.capture.release(session);

        self.enter(Phase::Analyzing(image.clone()), WorkflowEvent::Captured);
        info!("Analyzing captured image");

        let outcome = self.analyzer.analyze(&image).await;
        self.settle(outcome)
    }

    fn settle(
        &mut self,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Result<WorkflowState, WorkflowError> {
        match outcome {
            Ok(result) => self.analysis_succeeded(result),
            Err(e) => self.analysis_failed(e.to_string()),
        }
    }

    /// Store the result of the in-flight analysis
    pub fn analysis_succeeded(
        &mut self,
        result: AnalysisResult,
    ) -> Result<WorkflowState, WorkflowError> {
        self.guard(WorkflowEvent::AnalysisSucceeded)?;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Analyzing(image) => {
                info!("Analysis found {} shapes", result.len());
                self.enter(
                    Phase::ResultsShown { image, result },
                    WorkflowEvent::AnalysisSucceeded,
                );
            }
            other => {
                // Results without their image cannot be shown
                error!("Analysis result arrived without a captured image, resetting");
                drop(other);
            }
        }
        Ok(self.state())
    }

    /// Store the failure message of the in-flight analysis
    pub fn analysis_failed(
        &mut self,
        message: impl Into<String>,
    ) -> Result<WorkflowState, WorkflowError> {
        self.guard(WorkflowEvent::AnalysisFailed)?;
        let message = message.into();
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Analyzing(image) => {
                error!("{}", message);
                self.enter(Phase::Error { image, message }, WorkflowEvent::AnalysisFailed);
            }
            other => {
                error!("Analysis failure arrived without a captured image, resetting");
                drop(other);
            }
        }
        Ok(self.state())
    }

    /// Discard image, result and error and return to `Idle`
    ///
    /// Accepted in every state; an active camera is released.
    pub fn reset(&mut self) {
        if let Phase::CameraActive(session) = std::mem::replace(&mut self.phase, Phase::Idle) {
            self.capture.release(session);
        }
        debug!("Workflow reset to idle");
    }
}
