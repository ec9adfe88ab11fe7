use std::env;
use std::str::FromStr;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (512, 512);
pub const DEFAULT_MODEL_PATH: &str = "models/model.onnx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => anyhow::bail!(
                "{} is not a supported execution provider. Use either `cpu` or `cuda`.",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: String,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub execution_provider: ExecutionProvider,
    pub box_thickness: u32,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path =
            env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string());

        let input_width = env::var("INPUT_WIDTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_INPUT_SIZE.0);

        let input_height = env::var("INPUT_HEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_INPUT_SIZE.1);

        let confidence_threshold = env::var("CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.5);

        // A typo here would silently fall back to CPU, so this one is strict.
        let execution_provider = match env::var("EXECUTION_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => ExecutionProvider::Cpu,
        };

        let box_thickness = env::var("BOX_THICKNESS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            model_path,
            input_size: (input_width, input_height),
            confidence_threshold,
            execution_provider,
            box_thickness,
        })
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            model_path: "/models/model.onnx".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.5,
            execution_provider: ExecutionProvider::Cpu,
            box_thickness: 3,
        }
    }
}
