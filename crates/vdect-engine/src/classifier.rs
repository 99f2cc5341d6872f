//! Classifier capability traits and their ONNX Runtime implementations.
//!
//! Classifiers are opaque scoring functions: the engine never reimplements
//! their internals, it only consumes documented inputs and outputs. Tests
//! substitute hand-written doubles behind the same traits.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::{Array3, Array4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::ensemble::FaceFrame;
use crate::error::{EngineError, EngineResult};
use crate::saliency::AttentionStack;

/// One forward pass over one image.
pub struct ImageForward {
    /// Per-class logits.
    pub logits: Vec<f32>,
    /// Per-layer attention tensors, when requested and available.
    ///
    /// Contract: either fully populated or `None`, never partial.
    pub attentions: Option<AttentionStack>,
}

/// Image classifier capability.
pub trait ImageClassifier: Send + Sync {
    /// Run one forward pass. When `want_attentions` is set and the model can
    /// produce attention weights, the result carries a full [`AttentionStack`].
    fn forward(&self, pixels: &Array3<f32>, want_attentions: bool) -> EngineResult<ImageForward>;

    /// Gradient of the predicted class's score with respect to the input,
    /// shaped like the input (channels first).
    ///
    /// Returns [`EngineError::GradientUnavailable`] when the model has no
    /// gradient output.
    fn input_gradient(&self, pixels: &Array3<f32>) -> EngineResult<Array3<f32>>;

    /// Class labels, indexed by logit position.
    fn labels(&self) -> &[String];
}

/// Per-frame video classifier network capability.
///
/// Scores are the probability that the frame is manipulated, in [0, 1].
pub trait FrameNetwork: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, face: &FaceFrame) -> EngineResult<f32>;
}

/// Resize and normalize an image into a channels-first tensor.
///
/// Pixels are scaled to [0, 1] and normalized with mean 0.5 / std 0.5 per
/// channel, matching the ViT image processor.
pub fn preprocess_image(img: &RgbImage, input_size: u32) -> Array3<f32> {
    let resized = image::imageops::resize(
        img,
        input_size,
        input_size,
        image::imageops::FilterType::Triangle,
    );

    let side = input_size as usize;
    let mut chw = Array3::<f32>::zeros((3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            chw[[c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    chw
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// ONNX-backed image classifier.
///
/// Expects a graph with one `[1, 3, H, W]` input and outputs:
/// - `logits`: `[1, num_classes]`
/// - `attentions.{i}`: `[1, heads, tokens, tokens]` per layer (optional)
/// - `input_grad`: `[1, 3, H, W]` gradient of the top-class score (optional)
pub struct OnnxImageClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    attention_outputs: Vec<String>,
    has_gradient_output: bool,
}

impl OnnxImageClassifier {
    /// Load a classifier from an ONNX file.
    pub fn new(model_path: impl AsRef<Path>, labels: Vec<String>) -> EngineResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }

        let session = create_session(model_path)?;

        let mut attention_outputs: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .filter(|n| n.starts_with("attentions."))
            .collect();
        attention_outputs.sort_by_key(|n| {
            n.rsplit('.')
                .next()
                .and_then(|i| i.parse::<usize>().ok())
                .unwrap_or(usize::MAX)
        });
        let has_gradient_output = session.outputs().iter().any(|o| o.name() == "input_grad");

        info!(
            model = %model_path.display(),
            classes = labels.len(),
            attention_layers = attention_outputs.len(),
            gradient_output = has_gradient_output,
            "Image classifier loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            attention_outputs,
            has_gradient_output,
        })
    }
}

impl ImageClassifier for OnnxImageClassifier {
    fn forward(&self, pixels: &Array3<f32>, want_attentions: bool) -> EngineResult<ImageForward> {
        let input = to_batched_tensor(pixels)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::internal("Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::inference(format!("ONNX inference failed: {}", e)))?;

        let logits = extract_vec(&outputs, "logits")?;

        let attentions = if want_attentions && !self.attention_outputs.is_empty() {
            let mut layers = Vec::with_capacity(self.attention_outputs.len());
            for name in &self.attention_outputs {
                layers.push(extract_attention_layer(&outputs, name)?);
            }
            Some(AttentionStack::new(layers)?)
        } else {
            None
        };

        Ok(ImageForward { logits, attentions })
    }

    fn input_gradient(&self, pixels: &Array3<f32>) -> EngineResult<Array3<f32>> {
        if !self.has_gradient_output {
            return Err(EngineError::GradientUnavailable);
        }

        let (channels, height, width) = pixels.dim();
        let input = to_batched_tensor(pixels)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::internal("Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::inference(format!("ONNX inference failed: {}", e)))?;

        let data = extract_vec(&outputs, "input_grad")?;
        if data.len() != channels * height * width {
            return Err(EngineError::shape(format!(
                "input_grad has {} elements, expected {}",
                data.len(),
                channels * height * width
            )));
        }

        Array3::from_shape_vec((channels, height, width), data)
            .map_err(|e| EngineError::shape(format!("input_grad reshape failed: {}", e)))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// ONNX-backed per-frame video network.
///
/// Expects a `[1, 3, S, S]` input and either two logits `[real, fake]` or a
/// single manipulation logit as output.
pub struct OnnxFrameNetwork {
    name: String,
    session: Mutex<Session>,
    input_size: u32,
    output_name: String,
}

impl OnnxFrameNetwork {
    pub fn new(
        name: impl Into<String>,
        model_path: impl AsRef<Path>,
        input_size: u32,
    ) -> EngineResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }

        let name = name.into();
        let session = create_session(model_path)?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| EngineError::inference("Model declares no outputs"))?;
        info!(network = %name, model = %model_path.display(), "Frame network loaded");

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_size,
            output_name,
        })
    }
}

impl FrameNetwork for OnnxFrameNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, face: &FaceFrame) -> EngineResult<f32> {
        let pixels = preprocess_image(&face.image, self.input_size);
        let input = to_batched_tensor(&pixels)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::internal("Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::inference(format!("ONNX inference failed: {}", e)))?;

        let logits = extract_vec(&outputs, &self.output_name)?;
        match logits.len() {
            // [real, fake] logits
            2 => Ok(softmax(&logits)[1]),
            // single manipulation logit
            1 => Ok(1.0 / (1.0 + (-logits[0]).exp())),
            n => Err(EngineError::shape(format!(
                "Frame network produced {} logits, expected 1 or 2",
                n
            ))),
        }
    }
}

/// Create an ONNX Runtime session with automatic execution provider selection.
pub fn create_session(model_path: &Path) -> EngineResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| EngineError::internal(format!("Failed to read model file: {}", e)))?;

    let mut builder = Session::builder()
        .map_err(|e| EngineError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EngineError::internal(format!("Failed to set optimization level: {}", e)))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, falling back to CPU");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    debug!("Using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| EngineError::internal(format!("Failed to load ONNX model: {}", e)))
}

/// Convert a channels-first image tensor to a batched ORT value.
fn to_batched_tensor(pixels: &Array3<f32>) -> EngineResult<Value> {
    let (channels, height, width) = pixels.dim();
    let batched: Array4<f32> = pixels.clone().insert_axis(ndarray::Axis(0));

    let data: Vec<f32> = batched.iter().copied().collect();
    let shape = vec![1usize, channels, height, width];
    Tensor::from_array((shape, data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| EngineError::internal(format!("Failed to create tensor: {}", e)))
}

/// Extract a named output as a flat f32 vector.
fn extract_vec(outputs: &ort::session::SessionOutputs, name: &str) -> EngineResult<Vec<f32>> {
    let output = outputs
        .get(name)
        .ok_or_else(|| EngineError::inference(format!("Missing {} output", name)))?;
    let tensor = output
        .try_extract_tensor::<f32>()
        .map_err(|e| EngineError::inference(format!("Failed to extract {}: {}", name, e)))?;
    Ok(tensor.1.iter().copied().collect())
}

/// Extract one `[1, heads, tokens, tokens]` attention layer.
fn extract_attention_layer(
    outputs: &ort::session::SessionOutputs,
    name: &str,
) -> EngineResult<Array3<f32>> {
    let output = outputs
        .get(name)
        .ok_or_else(|| EngineError::inference(format!("Missing {} output", name)))?;
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| EngineError::inference(format!("Failed to extract {}: {}", name, e)))?;

    if shape.len() != 4 || shape[0] != 1 {
        return Err(EngineError::shape(format!(
            "Attention output {} has shape {:?}, expected [1, heads, tokens, tokens]",
            name, shape
        )));
    }

    let (heads, rows, cols) = (shape[1] as usize, shape[2] as usize, shape[3] as usize);
    Array3::from_shape_vec((heads, rows, cols), data.to_vec())
        .map_err(|e| EngineError::shape(format!("Attention reshape failed: {}", e)))
}
