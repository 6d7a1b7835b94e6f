use crate::error::{AppError, ModelLoadError};
use crate::models::classify_types::{InferenceOptions, TensorLayout, MODEL_INPUT_SIZE};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// A loaded model that maps one preprocessed image to an output vector.
///
/// Implementations are shared by every worker of a run, so `predict` takes
/// `&self`; backends that need exclusive access must lock internally.
pub trait Classifier: Send + Sync {
    /// Square input edge in pixels.
    fn input_size(&self) -> u32 {
        MODEL_INPUT_SIZE
    }

    fn layout(&self) -> TensorLayout {
        TensorLayout::Nhwc
    }

    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError>;
}

impl<C: Classifier + ?Sized> Classifier for std::sync::Arc<C> {
    fn input_size(&self) -> u32 {
        (**self).input_size()
    }

    fn layout(&self) -> TensorLayout {
        (**self).layout()
    }

    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        (**self).predict(input)
    }
}

/// Constructor parameter that a layer type is known to reject in some model
/// files; a shimmed load drops it before the layer is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerShim {
    pub layer: &'static str,
    pub parameter: &'static str,
}

impl LayerShim {
    /// True when a load error is this shim's known defect.
    pub fn matches(&self, message: &str) -> bool {
        message.contains(self.layer) && message.contains(self.parameter)
    }
}

pub const DEPTHWISE_GROUPS_SHIM: LayerShim = LayerShim {
    layer: "DepthwiseConv2D",
    parameter: "groups",
};

/// Turns a model file into a `Classifier`. `shims` is empty on the first
/// attempt and only populated for the compatibility retry.
pub trait ModelDeserializer: Send + Sync {
    type Model: Classifier + 'static;

    fn deserialize(&self, path: &Path, shims: &[LayerShim]) -> Result<Self::Model, ModelLoadError>;
}

pub struct ModelLoader<D> {
    deserializer: D,
}

impl<D: ModelDeserializer> ModelLoader<D> {
    pub fn new(deserializer: D) -> Self {
        Self { deserializer }
    }

    /// Standard load, retried once with the depthwise shim when (and only
    /// when) the first error is that defect. Other errors pass through as is.
    pub fn load(&self, path: &Path) -> Result<D::Model, ModelLoadError> {
        match self.deserializer.deserialize(path, &[]) {
            Ok(model) => Ok(model),
            Err(err) if DEPTHWISE_GROUPS_SHIM.matches(&err.message) => {
                warn!(
                    "Detected {} '{}' incompatibility in {}, retrying with compatibility loader",
                    DEPTHWISE_GROUPS_SHIM.layer,
                    DEPTHWISE_GROUPS_SHIM.parameter,
                    path.display()
                );
                self.deserializer.deserialize(path, &[DEPTHWISE_GROUPS_SHIM])
            }
            Err(err) => Err(err),
        }
    }
}

/// ONNX Runtime session. `Session::run` needs `&mut`, so calls are serialized.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    layout: TensorLayout,
}

impl OnnxClassifier {
    pub fn new(session: Session, layout: TensorLayout) -> Result<Self, AppError> {
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| AppError::Inference("Model has no inputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            layout,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn layout(&self) -> TensorLayout {
        self.layout
    }

    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let input_tensor = Value::from_array(input)
            .map_err(|e| AppError::Inference(format!("Failed to create tensor value: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Inference("Model lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AppError::Inference(e.to_string()))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(data.iter().copied().collect())
    }
}

pub struct OnnxDeserializer {
    pub options: InferenceOptions,
    pub intra_threads: usize,
}

impl OnnxDeserializer {
    pub fn new(options: InferenceOptions) -> Self {
        Self {
            options,
            intra_threads: 1,
        }
    }

    fn build_session(&self, path: &Path, shims: &[LayerShim]) -> Result<Session, String> {
        let _ = ort::init().with_name("photo-sorter").commit();

        // Shimmed loads skip graph rewriting, where grouped depthwise
        // convolutions get fused.
        let level = if shims.is_empty() {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };

        let mut builder = Session::builder()
            .map_err(|e| format!("Failed to create session builder: {}", e))?
            .with_optimization_level(level)
            .map_err(|e| format!("Failed to set optimization level: {}", e))?
            .with_intra_threads(self.intra_threads)
            .map_err(|e| format!("Failed to set intra threads: {}", e))?;

        if self.options.use_gpu {
            builder = builder.with_execution_providers([
                ort::execution_providers::DirectMLExecutionProvider::default().build(),
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CUDAExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ]).map_err(|e| format!("Failed to register GPU execution providers: {}", e))?;
        } else {
            builder = builder.with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ]).map_err(|e| format!("Failed to register CPU execution provider: {}", e))?;
        }

        builder
            .commit_from_file(path)
            .map_err(|e| format!("Failed to load ONNX model: {}", e))
    }
}

impl ModelDeserializer for OnnxDeserializer {
    type Model = OnnxClassifier;

    fn deserialize(&self, path: &Path, shims: &[LayerShim]) -> Result<OnnxClassifier, ModelLoadError> {
        let session = self
            .build_session(path, shims)
            .map_err(|message| ModelLoadError::new(path, message))?;

        info!("Loaded model {}", path.display());
        OnnxClassifier::new(session, self.options.layout)
            .map_err(|e| ModelLoadError::new(path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed;

    impl Classifier for Fixed {
        fn predict(&self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
            Ok(vec![1.0])
        }
    }

    /// Fails the first call with `first_error`, then succeeds if shims were passed.
    struct Scripted {
        first_error: &'static str,
        calls: Arc<AtomicUsize>,
        seen_shims: Arc<Mutex<Vec<Vec<LayerShim>>>>,
    }

    impl ModelDeserializer for Scripted {
        type Model = Fixed;

        fn deserialize(&self, path: &Path, shims: &[LayerShim]) -> Result<Fixed, ModelLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_shims.lock().unwrap().push(shims.to_vec());
            if shims.contains(&DEPTHWISE_GROUPS_SHIM) {
                Ok(Fixed)
            } else {
                Err(ModelLoadError::new(path, self.first_error))
            }
        }
    }

    fn scripted(first_error: &'static str) -> (Scripted, Arc<AtomicUsize>, Arc<Mutex<Vec<Vec<LayerShim>>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Scripted {
                first_error,
                calls: calls.clone(),
                seen_shims: seen.clone(),
            },
            calls,
            seen,
        )
    }

    #[test]
    fn depthwise_groups_error_triggers_one_retry() {
        let (d, calls, seen) = scripted(
            "Unrecognized keyword arguments passed to DepthwiseConv2D: {'groups': 1}",
        );
        let loader = ModelLoader::new(d);
        assert!(loader.load(Path::new("model.onnx")).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let seen = seen.lock().unwrap();
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], vec![DEPTHWISE_GROUPS_SHIM]);
    }

    #[test]
    fn unrelated_error_is_returned_unchanged() {
        let (d, calls, _) = scripted("file is not a valid model");
        let loader = ModelLoader::new(d);
        let err = loader.load(Path::new("model.onnx")).err().unwrap();
        assert_eq!(err.message, "file is not a valid model");
        assert_eq!(err.path, Path::new("model.onnx"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn layer_name_alone_does_not_trigger_retry() {
        let (d, calls, _) = scripted("DepthwiseConv2D: kernel shape mismatch");
        let loader = ModelLoader::new(d);
        assert!(loader.load(Path::new("model.onnx")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_retry_is_fatal() {
        struct AlwaysDepthwise;
        impl ModelDeserializer for AlwaysDepthwise {
            type Model = Fixed;
            fn deserialize(&self, path: &Path, shims: &[LayerShim]) -> Result<Fixed, ModelLoadError> {
                Err(ModelLoadError::new(
                    path,
                    format!("DepthwiseConv2D groups still rejected ({} shims)", shims.len()),
                ))
            }
        }

        let err = ModelLoader::new(AlwaysDepthwise)
            .load(Path::new("m.onnx"))
            .err()
            .unwrap();
        assert!(err.message.contains("(1 shims)"));
    }

    #[test]
    fn arc_classifier_delegates() {
        let shared: Arc<dyn Classifier> = Arc::new(Fixed);
        assert_eq!(shared.input_size(), MODEL_INPUT_SIZE);
        assert_eq!(shared.predict(Array4::zeros((1, 1, 1, 3))).unwrap(), vec![1.0]);
    }
}
