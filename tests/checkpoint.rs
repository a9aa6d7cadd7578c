use cifarnnet::config::ModelConfig;
use cifarnnet::feedforward::{CheckpointError, Model, ModelError};
use ndarray::array;
use std::fs;

fn config(hidden_dim1: usize) -> ModelConfig {
    ModelConfig {
        input_dim: 6,
        hidden_dim1,
        out_dim: 3,
        ..ModelConfig::default()
    }
}

#[test]
fn save_then_load_reproduces_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("model.bin");
    let images = array![[0.1, -0.2, 0.3, 0.0, 1.0, -1.0], [0.5, 0.5, 0.5, 0.5, 0.5, 0.5]];

    let saved = Model::with_seed(config(4), Some(1)).with_checkpoint(&path);
    saved.save().unwrap();
    assert!(path.is_file());

    let mut loaded = Model::with_seed(config(4), Some(2));
    assert_ne!(loaded.params(), saved.params());
    assert!(loaded.load(&path));
    assert_eq!(loaded.params(), saved.params());

    let (expected, _) = saved.forward(images.view()).unwrap();
    let (got, _) = loaded.forward(images.view()).unwrap();
    assert_eq!(got, expected);
}

#[test]
fn save_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    Model::with_seed(config(4), Some(1)).with_checkpoint(&path).save().unwrap();
    let second = Model::with_seed(config(4), Some(2)).with_checkpoint(&path);
    second.save().unwrap();

    let mut loaded = Model::with_seed(config(4), Some(3));
    assert!(loaded.load(&path));
    assert_eq!(loaded.params(), second.params());
}

#[test]
fn missing_checkpoint_keeps_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = Model::with_seed(config(4), Some(1));
    let before = model.params().clone();

    assert!(!model.load(dir.path().join("absent.bin")));
    assert_eq!(model.params(), &before);
}

#[test]
fn corrupt_checkpoint_keeps_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    fs::write(&path, b"not a checkpoint").unwrap();

    let mut model = Model::with_seed(config(4), Some(1));
    let before = model.params().clone();
    assert!(matches!(model.try_load(&path), Err(CheckpointError::Format { .. })));
    assert!(!model.load(&path));
    assert_eq!(model.params(), &before);
}

#[test]
fn checkpoint_of_another_shape_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    Model::with_seed(config(5), Some(1)).with_checkpoint(&path).save().unwrap();

    let mut model = Model::with_seed(config(4), Some(1));
    let before = model.params().clone();
    match model.try_load(&path) {
        Err(CheckpointError::Shape { source, .. }) => assert_eq!(
            source,
            ModelError::BadParam {
                name: "W1",
                expected: (4, 6),
                got: (5, 6),
            }
        ),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(model.params(), &before);
}
