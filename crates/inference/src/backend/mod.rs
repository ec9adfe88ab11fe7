use ndarray::{Array, ArrayD, IxDyn};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// The external detection model, seen as a tensor-in/tensor-out function.
pub trait InferenceBackend: Send {
    fn load_model(path: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a preprocessed `[1, 3, H, W]` input
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

pub struct InferenceOutput {
    pub dets: ArrayD<f32>,   // [1, Q, 4] cxcywh (normalized 0-1)
    pub logits: ArrayD<f32>, // [1, Q, num_classes] class logits
}
