use crate::common::{FaceAuthError, Result};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Relative model paths are looked up under `models_dir`.
pub fn resolve_model_path(path: &Path, models_dir: &Path) -> PathBuf {
    if path.is_relative() {
        models_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

pub fn load_session(
    name: &str,
    model_path: &Path,
    optimization_level: u32,
) -> Result<(Session, Arc<Environment>)> {
    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .build()
            .map_err(|e| FaceAuthError::Model(format!("Failed to create environment: {}", e)))?
    );

    if !model_path.exists() {
        return Err(FaceAuthError::Model(
            format!("{} model not found at: {:?}", name, model_path)
        ));
    }

    let opt_level = match optimization_level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    };
    let session = SessionBuilder::new(&environment)?
        .with_optimization_level(opt_level)?
        .with_model_from_file(model_path)?;

    tracing::debug!("Loaded {} model from {}", name, model_path.display());
    Ok((session, environment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_model_paths_are_resolved_against_models_dir() {
        let models = Path::new("/usr/share/faceid/models");
        assert_eq!(
            resolve_model_path(Path::new("detector.onnx"), models),
            models.join("detector.onnx")
        );
        assert_eq!(
            resolve_model_path(Path::new("/opt/detector.onnx"), models),
            PathBuf::from("/opt/detector.onnx")
        );
    }
}
