
/// Letterbox geometry used to map model-space boxes back onto the original image.
#[derive(Debug, Clone, Copy)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// One box in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u16,
}

impl Detection {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Decode RF-DETR output into detections above the confidence threshold.
    #[tracing::instrument(skip_all)]
    pub fn parse_detections(
        &self,
        dets: &ndarray::ArrayViewD<f32>,   // [1, Q, 4] - boxes in cxcywh format (normalized 0-1)
        logits: &ndarray::ArrayViewD<f32>, // [1, Q, C] - class logits
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        if dets.ndim() != 3 || logits.ndim() != 3 {
            anyhow::bail!(
                "Unexpected output rank: dets {:?}, logits {:?}",
                dets.shape(),
                logits.shape()
            );
        }

        let num_queries = dets.shape()[1];
        let num_classes = logits.shape()[2];

        if logits.shape()[1] != num_queries {
            anyhow::bail!(
                "Query count mismatch: dets has {}, logits has {}",
                num_queries,
                logits.shape()[1]
            );
        }
        if num_classes < 2 {
            anyhow::bail!("Logits need a background and at least one class, got {}", num_classes);
        }

        let mut detections = Vec::new();

        for i in 0..num_queries {
            // RF-DETR classes are 1-indexed (0 = background), so argmax starts at 1
            let mut max_logit = f32::NEG_INFINITY;
            let mut class_idx = 1usize;
            for c in 1..num_classes {
                let logit = logits[[0, i, c]];
                if logit > max_logit {
                    max_logit = logit;
                    class_idx = c;
                }
            }

            let confidence = sigmoid(max_logit);

            if confidence < self.confidence_threshold {
                continue;
            }

            let (x1_norm, y1_norm, x2_norm, y2_norm) = cxcywh_to_xyxy(
                dets[[0, i, 0]],
                dets[[0, i, 1]],
                dets[[0, i, 2]],
                dets[[0, i, 3]],
            );

            let to_orig_x = |x_norm: f32| {
                ((x_norm * transform.input_width as f32 - transform.offset_x) / transform.scale)
                    .clamp(0.0, transform.orig_width as f32)
            };
            let to_orig_y = |y_norm: f32| {
                ((y_norm * transform.input_height as f32 - transform.offset_y) / transform.scale)
                    .clamp(0.0, transform.orig_height as f32)
            };

            detections.push(Detection {
                x1: to_orig_x(x1_norm),
                y1: to_orig_y(y1_norm),
                x2: to_orig_x(x2_norm),
                y2: to_orig_y(y2_norm),
                confidence,
                class_id: (class_idx - 1) as u16,
            });
        }

        tracing::debug!(
            queries = num_queries,
            kept = detections.len(),
            "Detections decoded"
        );

        Ok(detections)
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
