//! Checkpoint manifest parsing and validation
//!
//! A checkpoint is a JSON manifest naming the ordered class list and the ONNX
//! graph that holds the trained weights:
//!
//! ```json
//! { "class_names": ["Urban Area", "Forest"], "model_state": "landcover.onnx" }
//! ```

use crate::ModelLoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parsed checkpoint manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Ordered class names; index `i` labels output score `i`
    pub class_names: Vec<String>,
    /// ONNX graph, relative to the manifest directory unless absolute
    pub model_state: PathBuf,
    /// Whether the graph emits logits that still need a softmax
    #[serde(default = "default_softmax")]
    pub softmax: bool,
}

fn default_softmax() -> bool {
    true
}

impl Checkpoint {
    /// Read and validate the manifest at `path`
    pub fn read(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::Missing(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ModelLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw).map_err(|e| ModelLoadError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Class list must be non-empty with unique names
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        if self.class_names.is_empty() {
            return Err(ModelLoadError::NoClasses);
        }
        let mut seen = HashSet::with_capacity(self.class_names.len());
        for name in &self.class_names {
            if !seen.insert(name.as_str()) {
                return Err(ModelLoadError::DuplicateClass(name.clone()));
            }
        }
        Ok(())
    }

    /// Resolve the weights path against the manifest location
    pub fn weights_path(&self, manifest: &Path) -> PathBuf {
        if self.model_state.is_absolute() {
            return self.model_state.clone();
        }
        manifest
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.model_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_valid_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(
            &path,
            r#"{"class_names": ["Forest", "Water Body"], "model_state": "net.onnx"}"#,
        )
        .unwrap();

        let checkpoint = Checkpoint::read(&path).unwrap();
        assert_eq!(checkpoint.class_names, vec!["Forest", "Water Body"]);
        assert!(checkpoint.softmax);
        assert_eq!(checkpoint.weights_path(&path), dir.path().join("net.onnx"));
    }

    #[test]
    fn test_absolute_weights_path_is_kept() {
        let checkpoint = Checkpoint {
            class_names: vec!["Forest".into()],
            model_state: PathBuf::from("/opt/models/net.onnx"),
            softmax: false,
        };
        assert_eq!(
            checkpoint.weights_path(Path::new("/somewhere/else/checkpoint.json")),
            PathBuf::from("/opt/models/net.onnx")
        );
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = Checkpoint::read(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ModelLoadError::Missing(_)));
    }

    #[test]
    fn test_missing_keys_are_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, r#"{"classes": ["Forest"], "model_state_dict": "net.onnx"}"#).unwrap();

        let err = Checkpoint::read(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed { .. }));
    }

    #[test]
    fn test_duplicate_and_empty_classes() {
        let dup = Checkpoint {
            class_names: vec!["Forest".into(), "Forest".into()],
            model_state: PathBuf::from("net.onnx"),
            softmax: true,
        };
        assert!(matches!(dup.validate(), Err(ModelLoadError::DuplicateClass(name)) if name == "Forest"));

        let empty = Checkpoint {
            class_names: vec![],
            ..dup
        };
        assert!(matches!(empty.validate(), Err(ModelLoadError::NoClasses)));
    }
}
