//! Download-and-save flow for artifact file representations.
//!
//! Exports are independent of the request lifecycle: any number may run at
//! once, and a failed export only leaves a notice, never a state change.

use crate::api::{MeshService, Pending, pending, take};
use crate::artifact::{FileKind, MeshArtifact};
use crate::error::ApiError;

/// Platform primitive that hands finished bytes to the user as a named
/// file. Kept behind a trait so each target supplies its own and tests can
/// record instead of writing.
pub trait SaveTarget {
    fn save(&self, file_name: &str, bytes: Vec<u8>);
}

/// Local file name for an export; derived from the artifact id and kind so
/// repeated exports land on the same name.
pub fn export_file_name(mesh_id: &str, kind: FileKind) -> String {
    format!("{mesh_id}.{}", kind.token())
}

struct PendingExport {
    mesh_id: String,
    kind: FileKind,
    out: Pending<Result<Vec<u8>, ApiError>>,
}

pub struct ExportManager<S> {
    service: S,
    target: Box<dyn SaveTarget>,
    in_flight: Vec<PendingExport>,
    notice: Option<String>,
}

impl<S: MeshService> ExportManager<S> {
    pub fn new(service: S, target: Box<dyn SaveTarget>) -> Self {
        Self {
            service,
            target,
            in_flight: Vec::new(),
            notice: None,
        }
    }

    /// Start downloading one representation of the current artifact.
    /// Overlapping requests, including repeats of the same kind, are fine.
    pub fn request(&mut self, artifact: &MeshArtifact, kind: FileKind) {
        self.notice = None;
        let out = pending();
        self.service.download(artifact.mesh_id(), kind, out.clone());
        self.in_flight.push(PendingExport {
            mesh_id: artifact.mesh_id().to_owned(),
            kind,
            out,
        });
    }

    /// Hand finished downloads to the save target; keep the rest pending.
    pub fn poll(&mut self) {
        let mut index = 0;
        while index < self.in_flight.len() {
            let Some(result) = take(&self.in_flight[index].out) else {
                index += 1;
                continue;
            };
            let job = self.in_flight.swap_remove(index);
            match result {
                Ok(bytes) => {
                    let file_name = export_file_name(&job.mesh_id, job.kind);
                    log::info!("saving {file_name} ({} bytes)", bytes.len());
                    self.target.save(&file_name, bytes);
                }
                Err(err) => {
                    log::error!(
                        "export of {} for mesh {} failed: {err:?}",
                        job.kind,
                        job.mesh_id
                    );
                    self.notice = Some(err.to_string());
                }
            }
        }
    }

    pub fn in_progress(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Last non-fatal export failure, for inline display.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

/// Native saver: asks where to put the file, then writes it.
#[cfg(not(target_arch = "wasm32"))]
pub struct DiskSaver;

#[cfg(not(target_arch = "wasm32"))]
impl SaveTarget for DiskSaver {
    fn save(&self, file_name: &str, bytes: Vec<u8>) {
        let file_name = file_name.to_owned();
        crate::api::spawn(async move {
            let Some(handle) = rfd::AsyncFileDialog::new()
                .set_file_name(&file_name)
                .save_file()
                .await
            else {
                log::info!("save of {file_name} cancelled");
                return;
            };
            match handle.write(&bytes).await {
                Ok(()) => log::info!("saved {file_name}"),
                Err(err) => log::error!("could not save {file_name}: {err}"),
            }
        });
    }
}

/// Web saver: blob URL plus a temporary anchor click, the same trick the
/// browser build of every mesh tool uses.
#[cfg(target_arch = "wasm32")]
pub struct BrowserSaver;

#[cfg(target_arch = "wasm32")]
impl SaveTarget for BrowserSaver {
    fn save(&self, file_name: &str, bytes: Vec<u8>) {
        if let Err(err) = save_via_anchor(file_name, &bytes) {
            log::error!("could not save {file_name}: {err:?}");
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn save_via_anchor(file_name: &str, bytes: &[u8]) -> Result<(), wasm_bindgen::JsValue> {
    use wasm_bindgen::{JsCast, JsValue};

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(bytes).into());
    let blob = web_sys::Blob::new_with_u8_array_sequence(&parts)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor = document.create_element("a")?;
    anchor.set_attribute("href", &url)?;
    anchor.set_attribute("download", file_name)?;
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?;
    body.append_child(&anchor)?;
    anchor
        .dyn_ref::<web_sys::HtmlElement>()
        .ok_or_else(|| JsValue::from_str("anchor is not an element"))?
        .click();
    body.remove_child(&anchor)?;
    web_sys::Url::revoke_object_url(&url)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSaver;
    use super::*;
    use crate::api::testing::FakeService;

    fn manager() -> (FakeService, RecordingSaver, ExportManager<FakeService>) {
        let service = FakeService::default();
        let saver = RecordingSaver::default();
        let manager = ExportManager::new(service.clone(), Box::new(saver.clone()));
        (service, saver, manager)
    }

    #[test]
    fn file_names_are_deterministic() {
        assert_eq!(export_file_name("m1", FileKind::Stl), "m1.stl");
        assert_eq!(export_file_name("m1", FileKind::Geo), "m1.geo");
    }

    #[test]
    fn finished_download_is_saved_under_the_derived_name() {
        let (service, saver, mut manager) = manager();
        let artifact = FakeService::artifact("m1", &[FileKind::Stl]);

        manager.request(&artifact, FileKind::Stl);
        assert!(manager.in_progress());

        service.resolve_download("m1", FileKind::Stl, Ok(b"solid bytes".to_vec()));
        manager.poll();

        assert!(!manager.in_progress());
        assert_eq!(
            saver.saved.lock().unwrap().as_slice(),
            &[("m1.stl".to_owned(), b"solid bytes".to_vec())]
        );
    }

    #[test]
    fn failed_download_leaves_a_notice_and_saves_nothing() {
        let (service, saver, mut manager) = manager();
        let artifact = FakeService::artifact("m1", &[FileKind::Stl]);

        manager.request(&artifact, FileKind::Msh);
        service.resolve_download(
            "m1",
            FileKind::Msh,
            Err(ApiError::NotFound {
                mesh_id: "m1".to_owned(),
                kind: FileKind::Msh,
            }),
        );
        manager.poll();

        assert!(saver.saved.lock().unwrap().is_empty());
        let notice = manager.notice().expect("notice expected");
        assert!(notice.contains("msh"));
    }

    #[test]
    fn overlapping_exports_resolve_independently_in_any_order() {
        let (service, saver, mut manager) = manager();
        let artifact = FakeService::artifact("m1", &[FileKind::Stl, FileKind::Geo]);

        manager.request(&artifact, FileKind::Stl);
        manager.request(&artifact, FileKind::Geo);

        service.resolve_download("m1", FileKind::Geo, Ok(b"// script".to_vec()));
        manager.poll();
        service.resolve_download("m1", FileKind::Stl, Ok(b"solid".to_vec()));
        manager.poll();

        let mut names: Vec<String> = saver
            .saved
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["m1.geo".to_owned(), "m1.stl".to_owned()]);
    }

    #[test]
    fn repeated_exports_of_the_same_kind_yield_the_same_bytes() {
        let (service, saver, mut manager) = manager();
        let artifact = FakeService::artifact("m1", &[FileKind::Stl]);

        manager.request(&artifact, FileKind::Stl);
        manager.request(&artifact, FileKind::Stl);
        service.resolve_download("m1", FileKind::Stl, Ok(b"solid".to_vec()));
        service.resolve_download("m1", FileKind::Stl, Ok(b"solid".to_vec()));
        manager.poll();

        let saved = saver.saved.lock().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0], saved[1]);
    }
}
