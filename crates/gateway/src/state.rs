use inference::{Detector, InferenceAdapter, ResultStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedAdapter = Arc<Mutex<InferenceAdapter<Box<dyn Detector>>>>;

#[derive(Clone)]
pub struct AppState {
    /// Held for the whole clear/persist/detect/cleanup sequence of a request.
    pub adapter: SharedAdapter,
    pub static_dir: PathBuf,
    pub scratch_root: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        detector: Box<dyn Detector>,
        store: ResultStore,
        scratch_root: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        let static_dir = store.root().to_path_buf();
        Self {
            adapter: Arc::new(Mutex::new(InferenceAdapter::new(detector, store))),
            static_dir,
            scratch_root,
            max_upload_bytes,
        }
    }
}
