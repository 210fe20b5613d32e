use llama_loader::{ModelConfig, ModelError, ModelLoader};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Create a test GGUF file with some content
async fn create_test_gguf_file(path: &PathBuf, content: &[u8]) -> Result<(), std::io::Error> {
    let mut file = File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}

#[tokio::test]
async fn test_model_config_validation() {
    let temp_dir = TempDir::new().unwrap();
    let model_path = temp_dir.path().join("test.gguf");
    create_test_gguf_file(&model_path, b"test gguf content")
        .await
        .unwrap();

    let valid_config = ModelConfig::for_path(&model_path);
    assert!(valid_config.validate().is_ok());

    let zero_ctx = ModelConfig {
        n_ctx: 0,
        ..valid_config.clone()
    };
    assert!(matches!(
        zero_ctx.validate(),
        Err(ModelError::InvalidConfig(_))
    ));

    let missing = ModelConfig::for_path(temp_dir.path().join("nonexistent.gguf"));
    assert!(matches!(missing.validate(), Err(ModelError::NotFound(_))));
}

#[tokio::test]
async fn test_load_model_rejects_missing_file_before_loading() {
    let temp_dir = TempDir::new().unwrap();
    let loader = ModelLoader::new().expect("Backend should initialize");

    let config = ModelConfig::for_path(temp_dir.path().join("absent.gguf"));
    let result = loader.load_model(&config).await;

    match result {
        Err(ModelError::NotFound(msg)) => assert!(msg.contains("absent.gguf")),
        other => panic!("Expected NotFound, got {:?}", other.map(|m| m.path)),
    }
}

#[tokio::test]
async fn test_load_model_reports_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let model_path = temp_dir.path().join("corrupt.gguf");
    create_test_gguf_file(&model_path, b"definitely not gguf")
        .await
        .unwrap();

    let loader = ModelLoader::new().expect("Backend should initialize");
    let result = loader.load_model(&ModelConfig::for_path(&model_path)).await;

    assert!(matches!(result, Err(ModelError::LoadingFailed(_))));
}

#[test]
fn test_loaders_share_backend() {
    let first = ModelLoader::new();
    let second = ModelLoader::new();
    assert!(first.is_ok());
    assert!(second.is_ok());
}
