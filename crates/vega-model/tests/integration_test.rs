//! Integration tests for vega-model crate

use std::path::PathBuf;
use tempfile::tempdir;
use vega_model::{ModelConfig, ModelLoadError, ModelRegistry, OnnxClassifier};

fn config_for(path: PathBuf) -> ModelConfig {
    ModelConfig {
        checkpoint_path: path,
        use_gpu: false,
        ..Default::default()
    }
}

#[test]
fn test_missing_checkpoint_is_model_load_error() {
    let temp_dir = tempdir().unwrap();
    let config = config_for(temp_dir.path().join("checkpoint.json"));

    let err = OnnxClassifier::load(&config, 224).err().unwrap();
    assert!(matches!(err, ModelLoadError::Missing(_)));
}

#[test]
fn test_manifest_without_weights() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("checkpoint.json");
    std::fs::write(
        &path,
        r#"{
            "class_names": ["Urban Area", "Agricultural Land", "Forest", "Water Body", "Barren Land"],
            "model_state": "landcover_resnet50.onnx"
        }"#,
    )
    .unwrap();

    let err = OnnxClassifier::load(&config_for(path), 224).err().unwrap();
    match err {
        ModelLoadError::WeightsMissing(weights) => {
            assert_eq!(weights, temp_dir.path().join("landcover_resnet50.onnx"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_registry_surfaces_load_errors() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("checkpoint.json");
    std::fs::write(&path, r#"{"class_names": "Forest"}"#).unwrap();

    let registry = ModelRegistry::new(config_for(path), 224);
    let err = registry.ensure_loaded().unwrap_err();
    assert!(matches!(err, ModelLoadError::Malformed { .. }));
    assert!(!registry.is_loaded());
}

#[test]
fn test_model_config_serialization() {
    let config = ModelConfig {
        checkpoint_path: PathBuf::from("/tmp/models/checkpoint.json"),
        intra_threads: 4,
        use_gpu: false,
    };

    // Test that we can serialize and deserialize the config
    let json = serde_json::to_string(&config).unwrap();
    let deserialized: ModelConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, deserialized);

    // Missing fields fall back to defaults
    let partial: ModelConfig = serde_json::from_str(r#"{"intra_threads": 2}"#).unwrap();
    assert_eq!(partial.intra_threads, 2);
    assert_eq!(partial.checkpoint_path, vega_model::get_default_checkpoint_path());
}
