//! Request and artifact model for the mesh generation service.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ValidationError};

/// Smallest element size the generation form accepts.
pub const ELEMENT_SIZE_MIN: f64 = 0.01;
/// Largest element size the generation form accepts.
pub const ELEMENT_SIZE_MAX: f64 = 1.0;
/// Pre-filled element size.
pub const ELEMENT_SIZE_DEFAULT: f64 = 0.1;

/// Whether the service should produce a planar or a volumetric mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeshKind {
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
}

impl MeshKind {
    pub const ALL: [MeshKind; 2] = [MeshKind::TwoD, MeshKind::ThreeD];

    pub fn label(self) -> &'static str {
        match self {
            MeshKind::TwoD => "2D Mesh",
            MeshKind::ThreeD => "3D Mesh",
        }
    }
}

/// File representations an artifact can be downloaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Native binary mesh.
    Msh,
    /// Surface tessellation; the only kind the viewer can preview.
    Stl,
    /// Script the meshing engine ran to produce the artifact.
    Geo,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Msh, FileKind::Stl, FileKind::Geo];

    /// Token used in download routes and file extensions.
    pub fn token(self) -> &'static str {
        match self {
            FileKind::Msh => "msh",
            FileKind::Stl => "stl",
            FileKind::Geo => "geo",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "msh" => Some(FileKind::Msh),
            "stl" => Some(FileKind::Stl),
            "geo" => Some(FileKind::Geo),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Msh => "MSH",
            FileKind::Stl => "STL",
            FileKind::Geo => "Script",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// A validated generation request. Construction is the only place input is
/// checked; once built the request is immutable and safe to hand to the
/// transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshRequest {
    prompt: String,
    mesh_type: MeshKind,
    element_size: f64,
}

impl MeshRequest {
    pub fn new(
        prompt: &str,
        mesh_type: MeshKind,
        element_size: f64,
    ) -> Result<Self, ValidationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        // NaN fails the range check as well.
        if !(ELEMENT_SIZE_MIN..=ELEMENT_SIZE_MAX).contains(&element_size) {
            return Err(ValidationError::ElementSizeOutOfRange {
                min: ELEMENT_SIZE_MIN,
                max: ELEMENT_SIZE_MAX,
            });
        }
        Ok(Self {
            prompt: prompt.to_owned(),
            mesh_type,
            element_size,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn mesh_type(&self) -> MeshKind {
        self.mesh_type
    }

    pub fn element_size(&self) -> f64 {
        self.element_size
    }
}

/// A successfully generated mesh. Only ever built from a `success` reply, so
/// holding one implies the id exists server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshArtifact {
    mesh_id: String,
    note: Option<String>,
    representations: Vec<FileKind>,
}

impl MeshArtifact {
    pub(crate) fn new(
        mesh_id: String,
        note: Option<String>,
        representations: Vec<FileKind>,
    ) -> Self {
        Self {
            mesh_id,
            note,
            representations,
        }
    }

    pub fn mesh_id(&self) -> &str {
        &self.mesh_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn representations(&self) -> &[FileKind] {
        &self.representations
    }

    pub fn has(&self, kind: FileKind) -> bool {
        self.representations.contains(&kind)
    }
}

/// Shown when a failure reply carries no message of its own.
const GENERATION_FAILED: &str = "Failed to generate mesh";

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum GenerateReply {
    Success {
        mesh_id: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        representations: Vec<String>,
    },
    #[serde(alias = "error")]
    Failure {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Interprets a 2xx body from the generation endpoint. A structured failure
/// becomes `ApiError::Service` so its message reaches the user verbatim; a
/// body that fits neither shape is treated like any other transport problem.
pub(crate) fn parse_generate_reply(body: &str) -> Result<MeshArtifact, ApiError> {
    let reply: GenerateReply = serde_json::from_str(body)
        .map_err(|err| ApiError::Transport(format!("unexpected reply: {err}")))?;
    match reply {
        GenerateReply::Success {
            mesh_id,
            message,
            representations,
        } => {
            let kinds = representations
                .iter()
                .filter_map(|token| {
                    let kind = FileKind::from_token(token);
                    if kind.is_none() {
                        log::debug!("ignoring unknown representation kind {token:?}");
                    }
                    kind
                })
                .collect();
            Ok(MeshArtifact::new(mesh_id, message, kinds))
        }
        GenerateReply::Failure { message } => Err(ApiError::Service(
            message.unwrap_or_else(|| GENERATION_FAILED.to_owned()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_trims_prompt() {
        let request = MeshRequest::new("  a plate with holes  ", MeshKind::TwoD, 0.1).unwrap();
        assert_eq!(request.prompt(), "a plate with holes");
    }

    #[test]
    fn request_rejects_blank_prompt() {
        assert_eq!(
            MeshRequest::new("   \n\t ", MeshKind::TwoD, 0.1),
            Err(ValidationError::EmptyPrompt)
        );
    }

    #[test]
    fn request_rejects_element_size_outside_bounds() {
        for size in [0.0, -0.1, 1.5, f64::NAN, f64::INFINITY] {
            let result = MeshRequest::new("a cube", MeshKind::ThreeD, size);
            assert!(
                matches!(result, Err(ValidationError::ElementSizeOutOfRange { .. })),
                "size {size} should be rejected"
            );
        }
    }

    #[test]
    fn request_accepts_boundary_element_sizes() {
        assert!(MeshRequest::new("a cube", MeshKind::ThreeD, ELEMENT_SIZE_MIN).is_ok());
        assert!(MeshRequest::new("a cube", MeshKind::ThreeD, ELEMENT_SIZE_MAX).is_ok());
    }

    #[test]
    fn request_serializes_to_wire_form() {
        let request = MeshRequest::new("circular hole mesh", MeshKind::TwoD, 0.1).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "prompt": "circular hole mesh",
                "mesh_type": "2D",
                "element_size": 0.1,
            })
        );
    }

    #[test]
    fn success_reply_parses_to_artifact() {
        let artifact = parse_generate_reply(
            r#"{"status": "success", "mesh_id": "m1", "representations": ["stl", "geo"]}"#,
        )
        .unwrap();
        assert_eq!(artifact.mesh_id(), "m1");
        assert!(artifact.has(FileKind::Stl));
        assert!(artifact.has(FileKind::Geo));
        assert!(!artifact.has(FileKind::Msh));
    }

    #[test]
    fn unknown_representation_tokens_are_ignored() {
        let artifact = parse_generate_reply(
            r#"{"status": "success", "mesh_id": "m1", "representations": ["stl", "vtk"]}"#,
        )
        .unwrap();
        assert_eq!(artifact.representations(), &[FileKind::Stl]);
    }

    #[test]
    fn failure_reply_surfaces_message_verbatim() {
        let err =
            parse_generate_reply(r#"{"status": "failure", "message": "no geometry recognized"}"#)
                .unwrap_err();
        assert_eq!(err, ApiError::Service("no geometry recognized".to_owned()));
    }

    #[test]
    fn error_status_is_treated_as_failure() {
        let err = parse_generate_reply(r#"{"status": "error", "message": "engine crashed"}"#)
            .unwrap_err();
        assert_eq!(err, ApiError::Service("engine crashed".to_owned()));
    }

    #[test]
    fn failure_without_message_gets_a_fallback() {
        let err = parse_generate_reply(r#"{"status": "failure"}"#).unwrap_err();
        assert_eq!(err, ApiError::Service(GENERATION_FAILED.to_owned()));
    }

    #[test]
    fn success_without_mesh_id_is_a_transport_error() {
        let err = parse_generate_reply(r#"{"status": "success"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn garbage_body_is_a_transport_error() {
        let err = parse_generate_reply("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    proptest! {
        /// An artifact comes out of parsing exactly when the reply says
        /// success and carries an id.
        #[test]
        fn artifact_iff_success_with_id(
            status in prop_oneof![Just("success"), Just("failure")],
            mesh_id in proptest::option::of("[a-z0-9]{1,12}"),
            message in proptest::option::of("[ -~]{0,40}"),
        ) {
            let mut reply = serde_json::json!({ "status": status });
            if let Some(id) = &mesh_id {
                reply["mesh_id"] = serde_json::json!(id);
            }
            if let Some(text) = &message {
                reply["message"] = serde_json::json!(text);
            }
            let parsed = parse_generate_reply(&reply.to_string());
            prop_assert_eq!(parsed.is_ok(), status == "success" && mesh_id.is_some());
        }
    }
}
