//! Error types for the meshforge client.

use thiserror::Error;

use crate::artifact::FileKind;

/// Input rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please enter a mesh generation prompt")]
    EmptyPrompt,

    #[error("Element size must be between {min} and {max}")]
    ElementSizeOutOfRange { min: f64, max: f64 },
}

/// Why a submission was not started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// At most one generation may be outstanding; the previous one has not
    /// resolved yet.
    #[error("A mesh is already being generated")]
    Busy,
}

/// Failures talking to the mesh generation service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Connectivity failure, timeout, non-2xx reply, or a body that could
    /// not be interpreted. The payload is diagnostic detail for the log; the
    /// display text stays generic because the server body cannot be trusted.
    #[error("Failed to connect to the server")]
    Transport(String),

    /// Structured failure reported by the service. Shown verbatim.
    #[error("{0}")]
    Service(String),

    /// The service does not know this artifact id or file kind.
    #[error("No {kind} file is available for mesh {mesh_id}")]
    NotFound { mesh_id: String, kind: FileKind },
}

/// The preview could not be produced. Never fatal: generation stays
/// successful and the viewer falls back to the placeholder shape.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Fetch(#[from] ApiError),

    #[error("could not read the mesh file: {0}")]
    Parse(String),
}
