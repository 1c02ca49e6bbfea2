//! Process-wide owner of the loaded classifier
//!
//! The registry is constructed once and handed to the inference layer by
//! reference. The first caller of [`ModelRegistry::classifier`] runs the
//! loader; concurrent first callers block until that load finishes and then
//! share its result. A failed load leaves the registry empty, so a later call
//! tries again.

use crate::{Classifier, ModelConfig, ModelLoadError, OnnxClassifier};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

type Loader = Box<dyn Fn() -> Result<Arc<dyn Classifier>, ModelLoadError> + Send + Sync>;

pub struct ModelRegistry {
    loader: Loader,
    model: OnceCell<Arc<dyn Classifier>>,
}

impl ModelRegistry {
    /// Registry backed by the ONNX checkpoint described by `config`.
    pub fn new(config: ModelConfig, input_size: u32) -> Self {
        Self::with_loader(move || {
            let classifier = OnnxClassifier::load(&config, input_size)?;
            Ok(Arc::new(classifier) as Arc<dyn Classifier>)
        })
    }

    /// Registry with a custom loader, e.g. an alternative backend or a test double.
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Classifier>, ModelLoadError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
        }
    }

    /// Registry that is ready from the start.
    pub fn preloaded(classifier: Arc<dyn Classifier>) -> Self {
        let registry = Self::with_loader(|| Err(ModelLoadError::NoClasses));
        // a fresh cell is always empty
        let _ = registry.model.set(classifier);
        registry
    }

    /// Idempotent; loads the classifier on the first call.
    pub fn ensure_loaded(&self) -> Result<(), ModelLoadError> {
        self.classifier().map(|_| ())
    }

    /// Shared handle to the classifier, loading it on first use.
    pub fn classifier(&self) -> Result<Arc<dyn Classifier>, ModelLoadError> {
        self.model
            .get_or_try_init(|| {
                info!("Loading land-cover model into memory");
                let model = (self.loader)().map_err(|e| {
                    warn!(error = %e, "Model load failed");
                    e
                })?;
                info!(
                    classes = model.class_names().len(),
                    device = model.device(),
                    "Model loaded"
                );
                Ok(model)
            })
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Class names of the loaded model, `None` before the first load.
    pub fn class_names(&self) -> Option<Vec<String>> {
        self.model.get().map(|m| m.class_names().to_vec())
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InferenceError;
    use ndarray::Array4;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    struct Uniform(Vec<String>);

    impl Classifier for Uniform {
        fn class_names(&self) -> &[String] {
            &self.0
        }

        fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let n = self.0.len();
            Ok(vec![1.0 / n as f32; n])
        }
    }

    fn uniform() -> Arc<dyn Classifier> {
        Arc::new(Uniform(vec!["Forest".into(), "Water Body".into()]))
    }

    #[test]
    fn test_loads_lazily_and_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let registry = ModelRegistry::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(uniform())
        });

        assert!(!registry.is_loaded());
        assert!(registry.class_names().is_none());
        registry.ensure_loaded().unwrap();
        registry.ensure_loaded().unwrap();
        assert!(registry.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(registry.class_names().unwrap(), vec!["Forest", "Water Body"]);
    }

    #[test]
    fn test_concurrent_first_callers_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let registry = Arc::new(ModelRegistry::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(uniform())
        }));

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.classifier().map(|m| m.class_names().len())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 2);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let registry = ModelRegistry::with_loader(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ModelLoadError::Missing("./models/checkpoint.json".into()))
            } else {
                Ok(uniform())
            }
        });

        assert!(matches!(registry.ensure_loaded(), Err(ModelLoadError::Missing(_))));
        assert!(!registry.is_loaded());
        registry.ensure_loaded().unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preloaded_never_calls_loader() {
        let registry = ModelRegistry::preloaded(uniform());
        assert!(registry.is_loaded());
        assert_eq!(registry.classifier().unwrap().class_names().len(), 2);
    }
}
