//! Optional deep-learning classifier, consumed as an override signal.
//!
//! The model itself lives outside this crate. It is probed once at startup
//! and handed to the orchestrator as a [`DeepCapability`]; absence and
//! per-call failure both collapse to "no prediction".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::landcover::ClassProbability;
use super::RgbImage;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("deep classifier unavailable: {0}")]
    Unavailable(String),
    #[error("deep classifier inference failed: {0}")]
    Inference(String),
}

/// Output of an external classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepPrediction {
    pub label: String,
    pub confidence: f64,
    /// Percentages, sorted descending.
    pub probabilities: Vec<ClassProbability>,
    /// Tag recorded as the analysis model when the prediction is used.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Contract for a pixel-trained land-use model.
pub trait DeepClassifier: Send + Sync {
    /// Short engine tag, e.g. `cnn-resnet50`.
    fn name(&self) -> &str;

    /// Check that weights are loaded and inference can run.
    fn probe(&self) -> Result<(), ClassifierError>;

    /// Classify one image. `Ok(None)` means the model declined to answer.
    fn classify(&self, image: &RgbImage) -> Result<Option<DeepPrediction>, ClassifierError>;
}

/// Deep classifier availability, resolved once and injected.
#[derive(Clone, Default)]
pub struct DeepCapability {
    classifier: Option<Arc<dyn DeepClassifier>>,
}

impl DeepCapability {
    /// No deep classifier configured.
    pub fn none() -> Self {
        Self { classifier: None }
    }

    /// Probe a candidate classifier; keep it only if the probe succeeds.
    pub fn resolve(candidate: Option<Arc<dyn DeepClassifier>>) -> Self {
        let classifier = match candidate {
            Some(c) => match c.probe() {
                Ok(()) => {
                    info!(engine = c.name(), "deep classifier available");
                    Some(c)
                }
                Err(e) => {
                    warn!(engine = c.name(), error = %e, "deep classifier probe failed, using rule-based results only");
                    None
                }
            },
            None => {
                debug!("no deep classifier configured");
                None
            }
        };
        Self { classifier }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn engine_name(&self) -> Option<&str> {
        self.classifier.as_deref().map(|c| c.name())
    }

    /// Run the classifier if present. Failures are logged and become `None`.
    pub fn predict(&self, image: &RgbImage) -> Option<DeepPrediction> {
        let classifier = self.classifier.as_deref()?;
        match classifier.classify(image) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(engine = classifier.name(), error = %e, "deep classifier failed, keeping rule-based result");
                None
            }
        }
    }
}

impl std::fmt::Debug for DeepCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepCapability")
            .field("engine", &self.engine_name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array3;

    /// Test double returning a fixed answer, or failing on demand.
    pub(crate) struct FixedClassifier {
        pub label: &'static str,
        pub confidence: f64,
        pub probe_ok: bool,
        pub fail: bool,
    }

    impl FixedClassifier {
        pub(crate) fn answering(label: &'static str, confidence: f64) -> Self {
            Self {
                label,
                confidence,
                probe_ok: true,
                fail: false,
            }
        }
    }

    impl DeepClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "cnn-resnet50"
        }

        fn probe(&self) -> Result<(), ClassifierError> {
            if self.probe_ok {
                Ok(())
            } else {
                Err(ClassifierError::Unavailable("weights not found".into()))
            }
        }

        fn classify(&self, _image: &RgbImage) -> Result<Option<DeepPrediction>, ClassifierError> {
            if self.fail {
                return Err(ClassifierError::Inference("tensor shape".into()));
            }
            Ok(Some(DeepPrediction {
                label: self.label.to_string(),
                confidence: self.confidence,
                probabilities: vec![
                    ClassProbability {
                        name: self.label.to_string(),
                        value: self.confidence * 100.0,
                    },
                    ClassProbability {
                        name: "Other".to_string(),
                        value: 100.0 - self.confidence * 100.0,
                    },
                ],
                model: "cnn-resnet50".to_string(),
                device: Some("cpu".to_string()),
            }))
        }
    }

    fn image() -> RgbImage {
        RgbImage::new(Array3::from_elem((2, 2, 3), 100.0)).unwrap()
    }

    #[test]
    fn test_failed_probe_disables_capability() {
        let candidate = FixedClassifier {
            probe_ok: false,
            ..FixedClassifier::answering("Forest", 0.9)
        };
        let cap = DeepCapability::resolve(Some(Arc::new(candidate)));
        assert!(!cap.is_available());
        assert!(cap.predict(&image()).is_none());
    }

    #[test]
    fn test_inference_failure_becomes_none() {
        let candidate = FixedClassifier {
            fail: true,
            ..FixedClassifier::answering("Forest", 0.9)
        };
        let cap = DeepCapability::resolve(Some(Arc::new(candidate)));
        assert!(cap.is_available());
        assert!(cap.predict(&image()).is_none());
    }

    #[test]
    fn test_prediction_passes_through() {
        let cap = DeepCapability::resolve(Some(Arc::new(FixedClassifier::answering("SeaLake", 0.8))));
        let p = cap.predict(&image()).unwrap();
        assert_eq!(p.label, "SeaLake");
        assert_eq!(cap.engine_name(), Some("cnn-resnet50"));
    }
}
