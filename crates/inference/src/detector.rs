use crate::{
    backend::InferenceBackend,
    config::InferenceConfig,
    processing::{Detection, PostProcessor, PreProcessor, TransformParams},
    render::Renderer,
};
use image::RgbImage;

/// Annotated rendering of one input image.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub image: RgbImage,
    pub detections: Vec<Detection>,
}

/// Image in, annotated image out.
///
/// `Ok(None)` means the model ran but produced nothing to save.
pub trait Detector: Send {
    fn annotate(&mut self, image: &RgbImage) -> anyhow::Result<Option<Annotation>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn annotate(&mut self, image: &RgbImage) -> anyhow::Result<Option<Annotation>> {
        (**self).annotate(image)
    }
}

/// [`Detector`] backed by a loaded model: letterbox, infer, decode, draw.
pub struct ModelDetector<B: InferenceBackend> {
    backend: B,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    renderer: Renderer,
}

impl<B: InferenceBackend> ModelDetector<B> {
    pub fn new(backend: B, config: &InferenceConfig) -> Self {
        Self {
            backend,
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(config.confidence_threshold),
            renderer: Renderer::new(config.box_thickness),
        }
    }

    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let prep = self.preprocessor.preprocess_image(image)?;

        let output = self.backend.infer(&prep.input)?;

        let transform = TransformParams {
            orig_width: image.width(),
            orig_height: image.height(),
            input_width: self.preprocessor.input_size.0,
            input_height: self.preprocessor.input_size.1,
            scale: prep.scale,
            offset_x: prep.offset_x,
            offset_y: prep.offset_y,
        };

        self.postprocessor
            .parse_detections(&output.dets.view(), &output.logits.view(), &transform)
    }
}

impl<B: InferenceBackend> Detector for ModelDetector<B> {
    fn annotate(&mut self, image: &RgbImage) -> anyhow::Result<Option<Annotation>> {
        let detections = self.detect(image)?;
        let rendered = self.renderer.render(image, &detections);

        Ok(Some(Annotation {
            image: rendered,
            detections,
        }))
    }
}

#[cfg(feature = "ort-backend")]
impl ModelDetector<crate::backend::ort::OrtBackend> {
    /// Load the ONNX model named by `config` with its execution provider.
    pub fn load(config: &InferenceConfig) -> anyhow::Result<Self> {
        let backend = crate::backend::ort::OrtBackend::load_model_with_provider(
            &config.model_path,
            config.execution_provider,
        )?;
        Ok(Self::new(backend, config))
    }
}
