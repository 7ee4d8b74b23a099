//! Placeholder Backend - 不依赖真实模型的生成后端
//!
//! 加载时只检查权重路径存在，生成时按配置的步数逐步上报进度，
//! 最后写出描述本次请求的占位产物。用于联调和测试。

use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::ports::{GenerationBackend, LoadedPipeline, ModelError, ProgressReporter};
use crate::config::BackendConfig;
use crate::domain::{Artifact, GenerationParams, ModelRole};

/// Placeholder Backend
pub struct PlaceholderBackend {
    config: BackendConfig,
}

impl PlaceholderBackend {
    pub fn new(config: BackendConfig) -> Self {
        tracing::info!(
            steps = config.steps,
            step_delay_ms = config.step_delay_ms,
            "PlaceholderBackend initialized"
        );
        Self { config }
    }
}

impl GenerationBackend for PlaceholderBackend {
    fn load(&self, role: ModelRole, model_path: &Path) -> Result<Box<dyn LoadedPipeline>, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::unavailable(
                role,
                format!("model path does not exist: {}", model_path.display()),
            ));
        }

        // 模拟权重加载耗时
        std::thread::sleep(Duration::from_millis(self.config.load_delay_ms));

        Ok(Box::new(PlaceholderPipeline {
            role,
            steps: self.config.steps.max(1),
            step_delay: Duration::from_millis(self.config.step_delay_ms),
        }))
    }

    fn name(&self) -> &'static str {
        "placeholder"
    }
}

struct PlaceholderPipeline {
    role: ModelRole,
    steps: u32,
    step_delay: Duration,
}

impl PlaceholderPipeline {
    /// 编辑和视频生成需要输入图片
    fn check_input(params: &GenerationParams) -> Result<(), ModelError> {
        let source = match params {
            GenerationParams::ImageEdit(p) => &p.image_path,
            GenerationParams::VideoGeneration(p) => &p.image_path,
            _ => return Ok(()),
        };
        if !Path::new(source).is_file() {
            return Err(ModelError::execution(format!(
                "Input image not found: {}",
                source
            )));
        }
        Ok(())
    }

    fn write_json(path: PathBuf, value: serde_json::Value) -> Result<PathBuf, ModelError> {
        let body = serde_json::to_vec_pretty(&value)
            .map_err(|e| ModelError::execution(format!("failed to encode artifact: {}", e)))?;
        std::fs::write(&path, body)
            .map_err(|e| ModelError::execution(format!("failed to write artifact: {}", e)))?;
        Ok(path)
    }

    fn write_outputs(
        &self,
        params: &GenerationParams,
        staging_dir: &Path,
    ) -> Result<Artifact, ModelError> {
        let artifact = match params {
            GenerationParams::PromptOptimize(p) => {
                let mut parts = vec![p.prompt.trim().to_string()];
                parts.extend(p.style_preferences.iter().cloned());
                parts.push(format!("{} style", p.optimization_type));
                parts.push("highly detailed".to_string());
                let optimized = parts.join(", ");

                let path = staging_dir.join("optimized_prompt.txt");
                std::fs::write(&path, &optimized)
                    .map_err(|e| ModelError::execution(format!("failed to write artifact: {}", e)))?;
                Artifact::from_files(vec![path]).with_text(optimized)
            }
            GenerationParams::ImageGeneration(p) => {
                let files = (0..p.num_images)
                    .map(|index| {
                        Self::write_json(
                            staging_dir.join(format!("image_{}.placeholder.json", index)),
                            json!({
                                "role": self.role,
                                "index": index,
                                "prompt": p.prompt,
                                "negative_prompt": p.negative_prompt,
                                "width": p.width,
                                "height": p.height,
                                "seed": p.seed.map(|s| s.wrapping_add(u64::from(index))),
                                "steps": p.num_inference_steps,
                            }),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Artifact::from_files(files)
            }
            GenerationParams::ImageEdit(p) => {
                let path = Self::write_json(
                    staging_dir.join("edited.placeholder.json"),
                    json!({
                        "role": self.role,
                        "source": p.image_path,
                        "prompt": p.prompt,
                        "guidance_scale": p.guidance_scale,
                    }),
                )?;
                Artifact::from_files(vec![path])
            }
            GenerationParams::VideoGeneration(p) => {
                let path = Self::write_json(
                    staging_dir.join("video.placeholder.json"),
                    json!({
                        "role": self.role,
                        "source": p.image_path,
                        "prompt": p.prompt,
                        "fps": p.fps,
                        "num_frames": p.num_frames,
                        "duration_secs": f64::from(p.num_frames) / f64::from(p.fps),
                        "seed": p.seed,
                    }),
                )?;
                Artifact::from_files(vec![path])
            }
        };
        Ok(artifact)
    }
}

impl LoadedPipeline for PlaceholderPipeline {
    fn generate(
        &mut self,
        params: &GenerationParams,
        staging_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<Artifact, ModelError> {
        Self::check_input(params)?;

        for step in 1..=self.steps {
            if progress.is_cancelled() {
                return Err(ModelError::Cancelled);
            }
            std::thread::sleep(self.step_delay);

            let percent = (step * 100 / self.steps) as u8;
            progress.report(percent, Some(format!("step {}/{}", step, self.steps)));
        }

        if progress.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        self.write_outputs(params, staging_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn backend(steps: u32) -> PlaceholderBackend {
        PlaceholderBackend::new(BackendConfig {
            steps,
            step_delay_ms: 0,
            load_delay_ms: 0,
        })
    }

    fn input_image(dir: &Path) -> String {
        let path = dir.join("in.png");
        std::fs::write(&path, b"png").unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_requires_existing_path() {
        let temp_dir = tempdir().unwrap();
        let result = backend(1).load(ModelRole::ImageGenerator, &temp_dir.path().join("missing"));
        assert!(matches!(result, Err(ModelError::Unavailable { .. })));
    }

    #[test]
    fn test_progress_reports_are_monotonic_and_bounded() {
        let temp_dir = tempdir().unwrap();
        let mut pipeline = backend(4)
            .load(ModelRole::VideoGenerator, temp_dir.path())
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(tx, CancellationToken::new());
        let params = GenerationParams::from_json(
            ModelRole::VideoGenerator,
            serde_json::json!({"image_path": input_image(temp_dir.path())}),
        )
        .unwrap();

        let artifact = pipeline.generate(&params, temp_dir.path(), &reporter).unwrap();
        assert_eq!(artifact.files.len(), 1);

        let values: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|r| r.progress)
            .collect();
        assert_eq!(values.len(), 4);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.last().copied(), Some(95));
    }

    #[test]
    fn test_prompt_optimizer_returns_text() {
        let temp_dir = tempdir().unwrap();
        let mut pipeline = backend(1)
            .load(ModelRole::PromptOptimizer, temp_dir.path())
            .unwrap();
        let params = GenerationParams::from_json(
            ModelRole::PromptOptimizer,
            serde_json::json!({"prompt": "a cat", "style_preferences": ["watercolor"]}),
        )
        .unwrap();

        let artifact = pipeline
            .generate(&params, temp_dir.path(), &ProgressReporter::detached())
            .unwrap();
        let text = artifact.text.unwrap();
        assert!(text.starts_with("a cat, watercolor"));
        assert_eq!(std::fs::read_to_string(&artifact.files[0]).unwrap(), text);
    }

    #[test]
    fn test_cancelled_before_start() {
        let temp_dir = tempdir().unwrap();
        let mut pipeline = backend(3)
            .load(ModelRole::ImageEditor, temp_dir.path())
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::unbounded_channel();
        let params = GenerationParams::from_json(
            ModelRole::ImageEditor,
            serde_json::json!({"image_path": input_image(temp_dir.path()), "prompt": "make it blue"}),
        )
        .unwrap();

        let result = pipeline.generate(&params, temp_dir.path(), &ProgressReporter::new(tx, cancel));
        assert!(matches!(result, Err(ModelError::Cancelled)));
    }

    #[test]
    fn test_missing_input_image_fails_execution() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope.png").to_string_lossy().into_owned();

        for (role, params) in [
            (
                ModelRole::ImageEditor,
                serde_json::json!({"image_path": missing, "prompt": "make it blue"}),
            ),
            (ModelRole::VideoGenerator, serde_json::json!({"image_path": missing})),
        ] {
            let mut pipeline = backend(2).load(role, temp_dir.path()).unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let reporter = ProgressReporter::new(tx, CancellationToken::new());
            let params = GenerationParams::from_json(role, params).unwrap();

            let staging = temp_dir.path().join(format!("staging-{}", role.config_key()));
            std::fs::create_dir_all(&staging).unwrap();
            match pipeline.generate(&params, &staging, &reporter) {
                Err(ModelError::Execution(message)) => {
                    assert!(message.contains("Input image not found"), "{}", message)
                }
                other => panic!("unexpected result: {:?}", other.map(|a| a.files)),
            }
            // 不上报进度也不写产物
            assert!(rx.try_recv().is_err());
            assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
        }
    }
}
