// ── Native entry-point ──
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        // The solid view depth-tests against this buffer.
        depth_buffer: 24,
        ..Default::default()
    };
    eframe::run_native(
        "MeshForge",
        options,
        Box::new(|cc| Ok(Box::new(meshforge_ui::MeshForgeApp::new(cc)))),
    )
}

// On the web the wasm-bindgen `start` export in the library is the entry.
#[cfg(target_arch = "wasm32")]
fn main() {}
