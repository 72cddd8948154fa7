//! Lifecycle of a single generation request.
//!
//! One controller instance lives for the whole session and owns the only
//! mutable request state in the application. Everything downstream (viewer,
//! exporter, UI) reads snapshots; nothing else may write.

use crate::api::{MeshService, Pending, pending, take};
use crate::artifact::{MeshArtifact, MeshKind, MeshRequest};
use crate::error::{ApiError, SubmitError};

/// Where the current submission stands. A tagged union instead of separate
/// loading/error/success flags, so contradictory combinations cannot exist.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    InFlight,
    Succeeded(MeshArtifact),
    Failed(String),
}

/// Notifications sent to subscribers as a submission progresses. `Ended`
/// fires exactly once per submission, whatever the outcome, and is the
/// signal to re-enable submission affordances.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Started,
    Succeeded(MeshArtifact),
    Failed(String),
    Ended,
}

type Observer = Box<dyn FnMut(&RequestEvent)>;

pub struct RequestController<S> {
    service: S,
    state: RequestState,
    /// Last successful artifact. Kept across later failures; only the next
    /// successful generation replaces it.
    current: Option<MeshArtifact>,
    in_flight: Option<Pending<Result<MeshArtifact, ApiError>>>,
    observers: Vec<Observer>,
}

impl<S: MeshService> RequestController<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: RequestState::Idle,
            current: None,
            in_flight: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&RequestEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, RequestState::InFlight)
    }

    /// The artifact the viewer and exporter should work against, if any.
    pub fn artifact(&self) -> Option<&MeshArtifact> {
        self.current.as_ref()
    }

    /// Validate and start a generation. Invalid input is rejected before any
    /// transport call; while a generation is in flight every further submit
    /// is rejected with [`SubmitError::Busy`] so the current-artifact slot
    /// can never be raced.
    pub fn submit(
        &mut self,
        prompt: &str,
        mesh_type: MeshKind,
        element_size: f64,
    ) -> Result<(), SubmitError> {
        let request = MeshRequest::new(prompt, mesh_type, element_size)?;
        if self.is_generating() {
            return Err(SubmitError::Busy);
        }
        self.state = RequestState::InFlight;
        self.notify(&RequestEvent::Started);
        let outcome = pending();
        self.service.generate(request, outcome.clone());
        self.in_flight = Some(outcome);
        Ok(())
    }

    /// Apply a resolved outcome, if one arrived. Called once per frame.
    pub fn poll(&mut self) {
        let Some(result) = self.in_flight.as_ref().and_then(take) else {
            return;
        };
        self.in_flight = None;
        match result {
            Ok(artifact) => {
                self.current = Some(artifact.clone());
                self.state = RequestState::Succeeded(artifact.clone());
                self.notify(&RequestEvent::Succeeded(artifact));
            }
            Err(err) => {
                let message = failure_message(err);
                self.state = RequestState::Failed(message.clone());
                self.notify(&RequestEvent::Failed(message));
            }
        }
        self.notify(&RequestEvent::Ended);
    }

    fn notify(&mut self, event: &RequestEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

/// Service failures are shown verbatim; everything else gets the generic
/// connectivity text while the detail goes to the log.
fn failure_message(err: ApiError) -> String {
    match err {
        ApiError::Service(message) => message,
        other => {
            log::error!("generation request failed: {other:?}");
            other.to_string()
        }
    }
}
