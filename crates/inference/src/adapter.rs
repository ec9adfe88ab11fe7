use crate::{detector::Detector, store::ResultStore};
use image::ImageReader;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::path::Path;
use std::time::Instant;

struct AdapterMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    empty: Counter<u64>,
    detections: Counter<u64>,
}

impl AdapterMetrics {
    fn init(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];
        Self {
            duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time to decode, annotate and store one upload")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("detect_requests_total")
                .with_description("Total detect calls")
                .build(),
            empty: meter
                .u64_counter("detect_empty_total")
                .with_description("Detect calls where the detector produced no rendering")
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Total boxes drawn")
                .build(),
        }
    }
}

/// Runs the detector on an image file and files the rendering in the result store.
pub struct InferenceAdapter<D: Detector> {
    detector: D,
    store: ResultStore,
    metrics: AdapterMetrics,
}

impl<D: Detector> InferenceAdapter<D> {
    pub fn new(detector: D, store: ResultStore) -> Self {
        Self {
            detector,
            store,
            metrics: AdapterMetrics::init("inference"),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Annotate the image at `image_path` and save it as `<stem>_result.jpg`.
    ///
    /// Returns the result's file name, or `None` when the detector produced no
    /// rendering. Unreadable images and model failures are errors.
    #[tracing::instrument(skip_all, fields(image = %image_path.display()))]
    pub fn detect(&mut self, image_path: &Path) -> anyhow::Result<Option<String>> {
        let start = Instant::now();
        self.metrics.requests.add(1, &[]);

        let result = self.annotate_and_store(image_path);

        let outcome = match &result {
            Ok(Some(_)) => "stored",
            Ok(None) => "empty",
            Err(_) => "error",
        };
        let elapsed = start.elapsed().as_secs_f64();
        self.metrics
            .duration
            .record(elapsed, &[KeyValue::new("outcome", outcome)]);
        tracing::debug!(outcome, elapsed_ms = elapsed * 1000.0, "Detect finished");

        result
    }

    fn annotate_and_store(&mut self, image_path: &Path) -> anyhow::Result<Option<String>> {
        self.store.ensure()?;

        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No usable file name in {}", image_path.display()))?
            .to_string();

        // Browsers send names like `blob`, so the format comes from the bytes.
        let image = ImageReader::open(image_path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();

        let Some(annotation) = self.detector.annotate(&image)? else {
            tracing::warn!("Detector produced no rendering");
            self.metrics.empty.add(1, &[]);
            return Ok(None);
        };

        let name = ResultStore::result_name(&stem);
        let path = self.store.save(&name, &annotation.image)?;

        let count = annotation.detections.len();
        self.metrics.detections.add(count as u64, &[]);

        tracing::info!(
            result = %path.display(),
            detections = count,
            "Annotated image stored"
        );

        Ok(Some(name))
    }
}
