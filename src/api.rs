//! Transport client for the mesh generation service.
//!
//! All calls are fire-and-forget from the caller's point of view: the caller
//! hands over a [`Pending`] slot and polls it once per frame. The service
//! fulfils the slot from a spawned task, so nothing here blocks the UI
//! thread. No retries, no caching.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::artifact::{FileKind, MeshArtifact, MeshRequest, parse_generate_reply};
use crate::error::ApiError;

/// Completion slot shared between the UI thread and a spawned task.
pub type Pending<T> = Arc<Mutex<Option<T>>>;

pub fn pending<T>() -> Pending<T> {
    Arc::new(Mutex::new(None))
}

/// Non-blocking take; a slot held briefly by the writer reads as empty and
/// is picked up on the next frame.
pub fn take<T>(slot: &Pending<T>) -> Option<T> {
    slot.try_lock().ok().and_then(|mut guard| guard.take())
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use once_cell::sync::Lazy;
    static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("failed to start async runtime")
    });
    RUNTIME.spawn(future);
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// The generation endpoint as the rest of the crate sees it. The controller,
/// viewer and exporter only ever talk to this trait, which keeps them
/// deterministic under test.
pub trait MeshService {
    /// Submit a generation request; the outcome lands in `out`.
    fn generate(&self, request: MeshRequest, out: Pending<Result<MeshArtifact, ApiError>>);

    /// Fetch one file representation of a known artifact; the bytes are
    /// opaque to the client.
    fn download(&self, mesh_id: &str, kind: FileKind, out: Pending<Result<Vec<u8>, ApiError>>);
}

/// HTTP implementation of [`MeshService`].
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            base_url,
            http: build_http(),
        }
    }

    /// Base URL from the environment: the page origin on the web, the
    /// `MESHFORGE_URL` variable (default `http://localhost:8000`) natively.
    pub fn from_env() -> Self {
        Self::new(default_base_url())
    }
}

impl MeshService for ApiClient {
    fn generate(&self, request: MeshRequest, out: Pending<Result<MeshArtifact, ApiError>>) {
        let http = self.http.clone();
        let url = format!("{}/generate-mesh", self.base_url);
        spawn(async move {
            let result = post_generate(http, url, request).await;
            *out.lock().unwrap() = Some(result);
        });
    }

    fn download(&self, mesh_id: &str, kind: FileKind, out: Pending<Result<Vec<u8>, ApiError>>) {
        let http = self.http.clone();
        let url = download_url(&self.base_url, mesh_id, kind);
        let mesh_id = mesh_id.to_owned();
        spawn(async move {
            let result = fetch_file(http, url, mesh_id, kind).await;
            *out.lock().unwrap() = Some(result);
        });
    }
}

fn build_http() -> reqwest::Client {
    // Script generation can take a while server-side; the timeout only has
    // to catch a dead connection. The browser manages its own on wasm.
    #[cfg(not(target_arch = "wasm32"))]
    {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .expect("failed to build http client")
    }
    #[cfg(target_arch = "wasm32")]
    {
        reqwest::Client::new()
    }
}

#[cfg(target_arch = "wasm32")]
fn default_base_url() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:8000".to_owned())
}

#[cfg(not(target_arch = "wasm32"))]
fn default_base_url() -> String {
    std::env::var("MESHFORGE_URL").unwrap_or_else(|_| "http://localhost:8000".to_owned())
}

fn download_url(base_url: &str, mesh_id: &str, kind: FileKind) -> String {
    format!("{base_url}/mesh/{mesh_id}/download/{}", kind.token())
}

async fn post_generate(
    http: reqwest::Client,
    url: String,
    request: MeshRequest,
) -> Result<MeshArtifact, ApiError> {
    let response = http
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(transport_from_body(status, &body));
    }
    parse_generate_reply(&body)
}

async fn fetch_file(
    http: reqwest::Client,
    url: String,
    mesh_id: String,
    kind: FileKind,
) -> Result<Vec<u8>, ApiError> {
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound { mesh_id, kind });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(transport_from_body(status, &body));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    Ok(bytes.to_vec())
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Non-2xx replies carry diagnostics in a `detail` field when the service
/// itself answered; anything else is kept raw.
fn transport_from_body(status: reqwest::StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => ApiError::Transport(format!("HTTP {status}: {}", err.detail)),
        Err(_) => ApiError::Transport(format!("HTTP {status}")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic stand-in for the remote service: records every call and
    //! lets tests resolve the completion slots by hand.

    use super::*;

    #[derive(Clone, Default)]
    pub struct FakeService {
        pub generate_calls: Arc<Mutex<Vec<MeshRequest>>>,
        generate_slots: Arc<Mutex<Vec<Pending<Result<MeshArtifact, ApiError>>>>>,
        pub download_calls: Arc<Mutex<Vec<(String, FileKind)>>>,
        download_slots: Arc<Mutex<Vec<(String, FileKind, Pending<Result<Vec<u8>, ApiError>>)>>>,
    }

    impl FakeService {
        pub fn artifact(mesh_id: &str, kinds: &[FileKind]) -> MeshArtifact {
            MeshArtifact::new(mesh_id.to_owned(), None, kinds.to_vec())
        }

        pub fn generate_count(&self) -> usize {
            self.generate_calls.lock().unwrap().len()
        }

        pub fn download_count(&self) -> usize {
            self.download_calls.lock().unwrap().len()
        }

        /// Resolve the oldest unresolved generate call.
        pub fn resolve_generate(&self, result: Result<MeshArtifact, ApiError>) {
            let slot = self.generate_slots.lock().unwrap().remove(0);
            *slot.lock().unwrap() = Some(result);
        }

        /// Resolve the oldest unresolved download of the given id and kind.
        pub fn resolve_download(
            &self,
            mesh_id: &str,
            kind: FileKind,
            result: Result<Vec<u8>, ApiError>,
        ) {
            let mut slots = self.download_slots.lock().unwrap();
            let index = slots
                .iter()
                .position(|(id, k, _)| id == mesh_id && *k == kind)
                .expect("no matching download in flight");
            let (_, _, slot) = slots.remove(index);
            *slot.lock().unwrap() = Some(result);
        }
    }

    impl MeshService for FakeService {
        fn generate(&self, request: MeshRequest, out: Pending<Result<MeshArtifact, ApiError>>) {
            self.generate_calls.lock().unwrap().push(request);
            self.generate_slots.lock().unwrap().push(out);
        }

        fn download(&self, mesh_id: &str, kind: FileKind, out: Pending<Result<Vec<u8>, ApiError>>) {
            self.download_calls
                .lock()
                .unwrap()
                .push((mesh_id.to_owned(), kind));
            self.download_slots
                .lock()
                .unwrap()
                .push((mesh_id.to_owned(), kind, out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_take_is_none_until_fulfilled() {
        let slot: Pending<u32> = pending();
        assert_eq!(take(&slot), None);
        *slot.lock().unwrap() = Some(7);
        assert_eq!(take(&slot), Some(7));
        assert_eq!(take(&slot), None);
    }

    #[test]
    fn download_urls_follow_the_service_routes() {
        assert_eq!(
            download_url("http://localhost:8000", "m1", FileKind::Stl),
            "http://localhost:8000/mesh/m1/download/stl"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(
            download_url(&client.base_url, "m1", FileKind::Geo),
            "http://localhost:8000/mesh/m1/download/geo"
        );
    }

    #[test]
    fn structured_detail_is_kept_in_the_transport_diagnostic() {
        let err = transport_from_body(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail": "model not loaded"}"#,
        );
        assert_eq!(
            err,
            ApiError::Transport("HTTP 500 Internal Server Error: model not loaded".to_owned())
        );
    }

    #[test]
    fn unstructured_bodies_fall_back_to_the_status_line() {
        let err = transport_from_body(reqwest::StatusCode::BAD_GATEWAY, "<html></html>");
        assert_eq!(err, ApiError::Transport("HTTP 502 Bad Gateway".to_owned()));
    }
}
