pub mod api;
pub mod artifact;
pub mod controller;
pub mod error;
pub mod export;
mod renderer;
pub mod viewer;

use std::sync::Arc;

use csgrs::mesh::Mesh;
use eframe::egui;
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use crate::api::ApiClient;
use crate::artifact::{ELEMENT_SIZE_DEFAULT, ELEMENT_SIZE_MAX, ELEMENT_SIZE_MIN, FileKind, MeshKind};
use crate::controller::{RequestController, RequestState};
use crate::error::SubmitError;
use crate::export::{ExportManager, SaveTarget};
use crate::viewer::{MeshView, Scene};

const EXAMPLE_PROMPTS: [&str; 4] = [
    "Create a 2D rectangular mesh with a circular hole at the center",
    "Generate a triangular mesh for a square domain with fine elements near the center",
    "Create a mesh for a L-shaped domain with adaptive refinement",
    "Generate a mesh for a circular domain with structured elements",
];

const SUCCESS_MESSAGE: &str = "Mesh generated successfully!";

// #667eea, the accent the service's own pages use.
const MESH_COLOR: [f32; 3] = [0.40, 0.49, 0.92];

pub struct MeshForgeApp {
    controller: RequestController<ApiClient>,
    view: MeshView<ApiClient>,
    exports: ExportManager<ApiClient>,

    // Form state.
    prompt: String,
    mesh_type: MeshKind,
    element_size: f64,
    form_error: Option<String>,

    // Presentation-only viewer state.
    wireframe: bool,
    show_axes: bool,
    rotation: UnitQuaternion<f32>,
    zoom: f32,

    placeholder: Mesh<()>,
    gpu: Option<Arc<renderer::GpuScene>>,
    line_vertices: Vec<f32>,
    tri_vertices: Vec<f32>,
}

impl MeshForgeApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let api = ApiClient::from_env();
        Self {
            controller: RequestController::new(api.clone()),
            view: MeshView::new(api.clone()),
            exports: ExportManager::new(api, default_save_target()),
            prompt: String::new(),
            mesh_type: MeshKind::TwoD,
            element_size: ELEMENT_SIZE_DEFAULT,
            form_error: None,
            wireframe: true,
            show_axes: true,
            rotation: UnitQuaternion::identity(),
            zoom: 1.0,
            placeholder: viewer::placeholder_mesh(),
            gpu: None,
            line_vertices: Vec::new(),
            tri_vertices: Vec::new(),
        }
    }

    fn submit(&mut self) {
        self.form_error = None;
        match self
            .controller
            .submit(&self.prompt, self.mesh_type, self.element_size)
        {
            Ok(()) => {}
            // The button is disabled while generating; the guard stays
            // anyway so nothing can race the current artifact.
            Err(SubmitError::Busy) => {}
            Err(SubmitError::Invalid(err)) => self.form_error = Some(err.to_string()),
        }
    }
}

impl eframe::App for MeshForgeApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        // Apply whatever resolved since the last frame.
        self.controller.poll();
        self.view.sync(self.controller.artifact());
        self.view.poll();
        self.exports.poll();

        let generating = self.controller.is_generating();
        if generating || self.view.loading() || self.exports.in_progress() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        // ------------------------------------------------------------------
        // Form panel
        // ------------------------------------------------------------------
        egui::SidePanel::left("generator_panel")
            .resizable(false)
            .min_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Generate Mesh");
                ui.separator();

                ui.label("Mesh description");
                ui.add_enabled(
                    !generating,
                    egui::TextEdit::multiline(&mut self.prompt)
                        .hint_text(
                            "Describe the mesh you want to generate. Be specific about \
                             geometry, element types, and refinement requirements.",
                        )
                        .desired_rows(5)
                        .desired_width(f32::INFINITY),
                );

                ui.add_space(6.0);
                ui.add_enabled_ui(!generating, |ui| {
                    egui::ComboBox::from_label("Mesh type")
                        .selected_text(self.mesh_type.label())
                        .show_ui(ui, |ui| {
                            for kind in MeshKind::ALL {
                                ui.selectable_value(&mut self.mesh_type, kind, kind.label());
                            }
                        });

                    ui.horizontal(|ui| {
                        ui.label("Element size");
                        ui.add(
                            egui::DragValue::new(&mut self.element_size)
                                .speed(0.01)
                                .range(ELEMENT_SIZE_MIN..=ELEMENT_SIZE_MAX),
                        );
                    });
                });

                ui.add_space(6.0);
                if ui
                    .add_enabled(!generating, egui::Button::new("Generate Mesh"))
                    .clicked()
                {
                    self.submit();
                }
                if generating {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Generating...");
                    });
                }

                if let Some(error) = &self.form_error {
                    ui.colored_label(egui::Color32::from_rgb(204, 51, 51), error);
                }
                match self.controller.state() {
                    RequestState::Failed(message) => {
                        ui.colored_label(egui::Color32::from_rgb(204, 51, 51), message);
                    }
                    RequestState::Succeeded(_) => {
                        ui.colored_label(egui::Color32::from_rgb(51, 153, 51), SUCCESS_MESSAGE);
                    }
                    _ => {}
                }
                if let Some(warning) = self.view.warning() {
                    ui.colored_label(egui::Color32::from_rgb(204, 153, 0), warning);
                }
                if let Some(notice) = self.exports.notice() {
                    ui.colored_label(egui::Color32::from_rgb(204, 153, 0), notice);
                }

                ui.separator();
                ui.label("Example prompts:");
                for example in EXAMPLE_PROMPTS {
                    let button = egui::Button::new(egui::RichText::new(example).small());
                    if ui.add_enabled(!generating, button).clicked() {
                        self.prompt = example.to_owned();
                    }
                }

                if let Some(artifact) = self.controller.artifact() {
                    ui.separator();
                    ui.checkbox(&mut self.wireframe, "wireframe");
                    ui.checkbox(&mut self.show_axes, "axes");

                    ui.add_space(6.0);
                    ui.label("Export");
                    ui.horizontal_wrapped(|ui| {
                        for kind in FileKind::ALL {
                            if ui.button(format!("Download {}", kind.label())).clicked() {
                                self.exports.request(artifact, kind);
                            }
                        }
                    });
                }
            });

        // ------------------------------------------------------------------
        // Viewport
        // ------------------------------------------------------------------
        egui::CentralPanel::default().show(ctx, |ui| {
            match self.view.scene(generating) {
                Scene::Busy => {
                    ui.add_space(ui.available_height() * 0.45);
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label("Generating mesh...");
                    });
                }
                Scene::Empty => {
                    ui.add_space(ui.available_height() * 0.4);
                    ui.vertical_centered(|ui| {
                        ui.heading("No mesh loaded");
                        ui.label(
                            "Generate a mesh using the form on the left to see it \
                             visualized here",
                        );
                    });
                }
                scene @ (Scene::Placeholder | Scene::Loaded(_)) => {
                    let (rect, response) =
                        ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

                    // left-drag orbits, scroll dollies
                    if response.dragged() && ui.input(|i| i.pointer.primary_down()) {
                        let delta = response.drag_delta();
                        let yaw = delta.x * 0.01;
                        let pitch = delta.y * 0.01;
                        self.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
                            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch)
                            * self.rotation;
                    }
                    let scroll = ui.input(|i| i.raw_scroll_delta.y);
                    if scroll.abs() > 0.0 {
                        self.zoom = (self.zoom * (1.0 + scroll * 0.001)).clamp(0.05, 50.0);
                    }

                    let mesh = match &scene {
                        Scene::Loaded(preview) => preview.mesh(),
                        _ => &self.placeholder,
                    };
                    self.line_vertices.clear();
                    self.tri_vertices.clear();
                    if self.wireframe {
                        viewer::push_edges(mesh, MESH_COLOR, &mut self.line_vertices);
                    } else {
                        viewer::push_faces(mesh, MESH_COLOR, &mut self.tri_vertices);
                    }
                    let radius = viewer::scene_radius(&self.line_vertices)
                        .max(viewer::scene_radius(&self.tri_vertices))
                        .max(1.0);
                    if self.show_axes {
                        viewer::push_axes(radius * 1.25, &mut self.line_vertices);
                    }

                    if let Some(gl) = frame.gl() {
                        if self.gpu.is_none() {
                            self.gpu = Some(Arc::new(unsafe { renderer::GpuScene::new(gl) }));
                        }

                        // Upload only while we hold the single strong ref,
                        // i.e. after last frame's paint callback is done.
                        if let Some(gpu_arc) = &mut self.gpu {
                            if let Some(gpu) = Arc::get_mut(gpu_arc) {
                                unsafe {
                                    gpu.upload_lines(gl, &self.line_vertices);
                                    gpu.upload_triangles(gl, &self.tri_vertices);
                                }
                            }
                        }

                        if let Some(gpu_arc) = &self.gpu {
                            let gpu_for_cb = gpu_arc.clone();
                            let mvp = mvp(self.rotation, self.zoom, radius, rect);
                            let callback =
                                egui_glow::CallbackFn::new(move |_info, painter| unsafe {
                                    gpu_for_cb.paint(painter.gl(), mvp);
                                });
                            ui.painter().add(egui::PaintCallback {
                                rect,
                                callback: Arc::new(callback),
                            });
                        }
                    }
                }
            }
        });
    }
}

/// MVP that keeps the whole scene in front of the camera; `zoom` is a dolly
/// factor (1 = default distance, 2 = half the distance).
fn mvp(rotation: UnitQuaternion<f32>, zoom: f32, radius: f32, rect: egui::Rect) -> Matrix4<f32> {
    let base_eye = radius * 3.0;
    let eye = Point3::new(0.0, 0.0, base_eye / zoom);

    let aspect = rect.width() / rect.height().max(1.0);
    let proj = Matrix4::new_perspective(aspect, 60_f32.to_radians(), 0.1, 10_000.0);
    let view = Matrix4::look_at_rh(&eye, &Point3::origin(), &Vector3::y());

    proj * view * rotation.to_homogeneous()
}

fn default_save_target() -> Box<dyn SaveTarget> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        Box::new(export::DiskSaver)
    }
    #[cfg(target_arch = "wasm32")]
    {
        Box::new(export::BrowserSaver)
    }
}

// ── Web entry-point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    use wasm_bindgen::JsCast;

    // Redirect `log` macros & panic messages to the browser console
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    console_error_panic_hook::set_once();

    // The element id must match the <canvas> in index.html
    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("meshforge_canvas"))
        .ok_or_else(|| JsValue::from_str("canvas element `meshforge_canvas` missing"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| JsValue::from_str("`meshforge_canvas` is not a canvas"))?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|cc| Ok(Box::new(MeshForgeApp::new(cc)))),
        )
        .await?;

    Ok(())
}
