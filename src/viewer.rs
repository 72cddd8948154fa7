//! Selects and prepares what the viewport shows for the current artifact.
//!
//! The selection is total: every combination of (generating, artifact,
//! preview progress) maps to exactly one [`Scene`] variant. Preview loading
//! is keyed to the artifact identity, so a load that resolves after the
//! artifact changed is discarded instead of clobbering the new state.

use csgrs::mesh::Mesh;

use crate::api::{MeshService, Pending, pending, take};
use crate::artifact::{FileKind, MeshArtifact};
use crate::error::{ApiError, PreviewError};

/// Parsed surface geometry ready for tessellation into GL vertices.
pub struct MeshPreview {
    mesh: Mesh<()>,
}

impl MeshPreview {
    pub fn from_stl(bytes: &[u8]) -> Result<Self, PreviewError> {
        match Mesh::<()>::from_stl(bytes, None) {
            Ok(mesh) if !mesh.polygons.is_empty() => Ok(Self { mesh }),
            Ok(_) => Err(PreviewError::Parse("mesh file contains no faces".into())),
            Err(_) => Err(PreviewError::Parse(
                "unsupported or corrupt mesh file".into(),
            )),
        }
    }

    pub fn mesh(&self) -> &Mesh<()> {
        &self.mesh
    }
}

/// Fixed stand-in shown while no real preview is available.
pub fn placeholder_mesh() -> Mesh<()> {
    Mesh::icosahedron(1.0, None)
}

/// Geometry derived from the current artifact. Rebuilt whenever the artifact
/// identity changes, never persisted.
pub enum ViewerGeometry {
    Empty,
    Placeholder,
    Loaded(MeshPreview),
}

/// What the viewport should show this frame.
pub enum Scene<'a> {
    /// A generation is in flight; show the busy overlay instead of geometry.
    Busy,
    Empty,
    Placeholder,
    Loaded(&'a MeshPreview),
}

pub struct MeshView<S> {
    service: S,
    /// Artifact id the geometry below was derived from.
    shown: Option<String>,
    geometry: ViewerGeometry,
    in_flight: Option<(String, Pending<Result<Vec<u8>, ApiError>>)>,
    warning: Option<String>,
}

impl<S: MeshService> MeshView<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            shown: None,
            geometry: ViewerGeometry::Empty,
            in_flight: None,
            warning: None,
        }
    }

    /// Re-derive geometry when the artifact identity changes. A pending
    /// preview load for the previous artifact is abandoned here; its late
    /// completion is additionally filtered in [`poll`](Self::poll).
    pub fn sync(&mut self, artifact: Option<&MeshArtifact>) {
        let id = artifact.map(|a| a.mesh_id().to_owned());
        if id == self.shown {
            return;
        }
        self.shown = id;
        self.in_flight = None;
        self.warning = None;
        match artifact {
            None => self.geometry = ViewerGeometry::Empty,
            Some(artifact) if artifact.has(FileKind::Stl) => {
                self.geometry = ViewerGeometry::Placeholder;
                let out = pending();
                self.service
                    .download(artifact.mesh_id(), FileKind::Stl, out.clone());
                self.in_flight = Some((artifact.mesh_id().to_owned(), out));
            }
            // Nothing previewable; the placeholder says "result received,
            // no preview for it".
            Some(_) => self.geometry = ViewerGeometry::Placeholder,
        }
    }

    /// Apply a finished preview load. Load failures degrade to the
    /// placeholder with a warning; they never touch the request lifecycle.
    pub fn poll(&mut self) {
        let Some((mesh_id, slot)) = &self.in_flight else {
            return;
        };
        let Some(result) = take(slot) else {
            return;
        };
        let mesh_id = mesh_id.clone();
        self.in_flight = None;
        if self.shown.as_deref() != Some(mesh_id.as_str()) {
            // Stale: another artifact became current while this was loading.
            return;
        }
        let loaded = result
            .map_err(PreviewError::from)
            .and_then(|bytes| MeshPreview::from_stl(&bytes));
        match loaded {
            Ok(preview) => self.geometry = ViewerGeometry::Loaded(preview),
            Err(err) => {
                log::warn!("preview of mesh {mesh_id} failed: {err}");
                self.warning = Some(format!("Preview unavailable: {err}"));
            }
        }
    }

    pub fn scene(&self, generating: bool) -> Scene<'_> {
        if generating {
            return Scene::Busy;
        }
        match &self.geometry {
            ViewerGeometry::Empty => Scene::Empty,
            ViewerGeometry::Placeholder => Scene::Placeholder,
            ViewerGeometry::Loaded(preview) => Scene::Loaded(preview),
        }
    }

    pub fn loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}

/// Appends one line segment per polygon edge as interleaved
/// `x y z r g b` vertex pairs.
pub fn push_edges(mesh: &Mesh<()>, color: [f32; 3], out: &mut Vec<f32>) {
    for polygon in &mesh.polygons {
        let n = polygon.vertices.len();
        for i in 0..n {
            let a = &polygon.vertices[i].pos;
            let b = &polygon.vertices[(i + 1) % n].pos;
            out.extend_from_slice(&[
                a.x as f32, a.y as f32, a.z as f32, color[0], color[1], color[2],
                b.x as f32, b.y as f32, b.z as f32, color[0], color[1], color[2],
            ]);
        }
    }
}

/// Appends a triangle fan per polygon, flat-shaded against a fixed light so
/// the solid view reads as 3D without a real lighting pass.
pub fn push_faces(mesh: &Mesh<()>, color: [f32; 3], out: &mut Vec<f32>) {
    let light = {
        let (x, y, z) = (0.4_f32, 0.8, 0.45);
        let len = (x * x + y * y + z * z).sqrt();
        [x / len, y / len, z / len]
    };
    for polygon in &mesh.polygons {
        let verts = &polygon.vertices;
        if verts.len() < 3 {
            continue;
        }
        let p = |i: usize| {
            let v = &verts[i].pos;
            [v.x as f32, v.y as f32, v.z as f32]
        };
        let a = p(0);
        for i in 1..verts.len() - 1 {
            let b = p(i);
            let c = p(i + 1);
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let normal = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2])
                .sqrt()
                .max(1e-6);
            let facing = (normal[0] * light[0] + normal[1] * light[1] + normal[2] * light[2]) / len;
            let shade = 0.35 + 0.65 * facing.abs();
            let shaded = [color[0] * shade, color[1] * shade, color[2] * shade];
            for corner in [a, b, c] {
                out.extend_from_slice(&corner);
                out.extend_from_slice(&shaded);
            }
        }
    }
}

/// Appends an axis helper: X red, Y green, Z blue.
pub fn push_axes(length: f32, out: &mut Vec<f32>) {
    let axes = [
        ([length, 0.0, 0.0], [0.9, 0.3, 0.3]),
        ([0.0, length, 0.0], [0.3, 0.9, 0.3]),
        ([0.0, 0.0, length], [0.3, 0.5, 0.9]),
    ];
    for (tip, color) in axes {
        out.extend_from_slice(&[0.0, 0.0, 0.0, color[0], color[1], color[2]]);
        out.extend_from_slice(&tip);
        out.extend_from_slice(&color);
    }
}

/// Largest coordinate magnitude in an interleaved vertex buffer; used to
/// place the camera far enough back.
pub fn scene_radius(vertices: &[f32]) -> f32 {
    vertices
        .chunks_exact(6)
        .flat_map(|v| &v[..3])
        .fold(0.0_f32, |acc, c| acc.max(c.abs()))
}
