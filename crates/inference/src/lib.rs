pub mod adapter;
pub mod backend;
pub mod config;
pub mod detector;
pub mod processing;
pub mod render;
pub mod store;

// Re-export commonly used types for convenience
pub use adapter::InferenceAdapter;
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{ExecutionProvider, InferenceConfig};
pub use detector::{Annotation, Detector, ModelDetector};
pub use processing::Detection;
pub use store::ResultStore;
