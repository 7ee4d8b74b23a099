//! Generation Context - 各角色生成参数

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use super::{ModelRole, ParamsError};

const MAX_PROMPT_CHARS: usize = 500;
const MIN_IMAGE_SIZE: u32 = 256;
const MAX_IMAGE_SIZE: u32 = 2048;
const MAX_IMAGES_PER_TASK: u32 = 4;
const MAX_INFERENCE_STEPS: u32 = 100;
const MAX_FPS: u32 = 60;
const MAX_FRAMES: u32 = 241;

/// Prompt 优化参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOptimizeParams {
    pub prompt: String,
    #[serde(default = "default_optimization_type")]
    pub optimization_type: String,
    #[serde(default)]
    pub style_preferences: Vec<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_optimization_type() -> String {
    "general".to_string()
}

/// 文生图参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationParams {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_image_size")]
    pub width: u32,
    #[serde(default = "default_image_size")]
    pub height: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_num_images")]
    pub num_images: u32,
    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_image_size() -> u32 {
    1024
}

fn default_num_images() -> u32 {
    1
}

fn default_inference_steps() -> u32 {
    20
}

fn default_guidance_scale() -> f32 {
    7.5
}

/// 图像编辑参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEditParams {
    pub image_path: String,
    pub prompt: String,
    #[serde(default = "default_edit_guidance")]
    pub guidance_scale: f32,
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_edit_guidance() -> f32 {
    2.5
}

/// 图生视频参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoGenerationParams {
    pub image_path: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_video_negative_prompt")]
    pub negative_prompt: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_num_frames")]
    pub num_frames: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_tiled")]
    pub tiled: bool,
    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_motion_strength")]
    pub motion_strength: f32,
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_video_negative_prompt() -> String {
    "static, blurry, low quality".to_string()
}

fn default_fps() -> u32 {
    16
}

fn default_num_frames() -> u32 {
    81
}

fn default_tiled() -> bool {
    true
}

fn default_motion_strength() -> f32 {
    0.5
}

/// 生成参数（按角色区分）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerationParams {
    PromptOptimize(PromptOptimizeParams),
    ImageGeneration(ImageGenerationParams),
    ImageEdit(ImageEditParams),
    VideoGeneration(VideoGenerationParams),
}

impl GenerationParams {
    /// 按角色解析并校验 JSON 参数
    pub fn from_json(role: ModelRole, value: serde_json::Value) -> Result<Self, ParamsError> {
        let malformed = |e: serde_json::Error| ParamsError::Malformed {
            role,
            reason: e.to_string(),
        };

        let params = match role {
            ModelRole::PromptOptimizer => {
                Self::PromptOptimize(serde_json::from_value(value).map_err(malformed)?)
            }
            ModelRole::ImageGenerator => {
                Self::ImageGeneration(serde_json::from_value(value).map_err(malformed)?)
            }
            ModelRole::ImageEditor => {
                Self::ImageEdit(serde_json::from_value(value).map_err(malformed)?)
            }
            ModelRole::VideoGenerator => {
                Self::VideoGeneration(serde_json::from_value(value).map_err(malformed)?)
            }
        };

        params.validate()?;
        Ok(params)
    }

    pub fn role(&self) -> ModelRole {
        match self {
            Self::PromptOptimize(_) => ModelRole::PromptOptimizer,
            Self::ImageGeneration(_) => ModelRole::ImageGenerator,
            Self::ImageEdit(_) => ModelRole::ImageEditor,
            Self::VideoGeneration(_) => ModelRole::VideoGenerator,
        }
    }

    /// 输出子目录（相对于存储根目录）
    pub fn output_subdir(&self) -> Option<&str> {
        match self {
            Self::PromptOptimize(p) => p.output_dir.as_deref(),
            Self::ImageGeneration(p) => p.output_dir.as_deref(),
            Self::ImageEdit(p) => p.output_dir.as_deref(),
            Self::VideoGeneration(p) => p.output_dir.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if let Some(dir) = self.output_subdir() {
            validate_subdir(dir)?;
        }

        match self {
            Self::PromptOptimize(p) => {
                validate_prompt(&p.prompt)?;
                if p.prompt.chars().count() > MAX_PROMPT_CHARS {
                    return Err(ParamsError::invalid(
                        "prompt",
                        format!("must be at most {} characters", MAX_PROMPT_CHARS),
                    ));
                }
            }
            Self::ImageGeneration(p) => {
                validate_prompt(&p.prompt)?;
                validate_dimension("width", p.width)?;
                validate_dimension("height", p.height)?;
                validate_range("num_images", p.num_images, 1, MAX_IMAGES_PER_TASK)?;
                validate_range("num_inference_steps", p.num_inference_steps, 1, MAX_INFERENCE_STEPS)?;
                validate_scale("guidance_scale", p.guidance_scale, 0.0, 30.0)?;
            }
            Self::ImageEdit(p) => {
                validate_non_empty("image_path", &p.image_path)?;
                validate_prompt(&p.prompt)?;
                validate_scale("guidance_scale", p.guidance_scale, 0.0, 20.0)?;
            }
            Self::VideoGeneration(p) => {
                validate_non_empty("image_path", &p.image_path)?;
                validate_range("fps", p.fps, 1, MAX_FPS)?;
                validate_range("num_frames", p.num_frames, 1, MAX_FRAMES)?;
                validate_range("num_inference_steps", p.num_inference_steps, 1, MAX_INFERENCE_STEPS)?;
                validate_scale("cfg_scale", p.cfg_scale, 0.0, 30.0)?;
                validate_scale("motion_strength", p.motion_strength, 0.0, 1.0)?;
            }
        }
        Ok(())
    }
}

fn validate_prompt(prompt: &str) -> Result<(), ParamsError> {
    validate_non_empty("prompt", prompt)
}

fn validate_non_empty(field: &'static str, value: &str) -> Result<(), ParamsError> {
    if value.trim().is_empty() {
        return Err(ParamsError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn validate_dimension(field: &'static str, value: u32) -> Result<(), ParamsError> {
    validate_range(field, value, MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)?;
    if value % 8 != 0 {
        return Err(ParamsError::invalid(field, "must be a multiple of 8"));
    }
    Ok(())
}

fn validate_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ParamsError> {
    if value < min || value > max {
        return Err(ParamsError::invalid(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}

fn validate_scale(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ParamsError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ParamsError::invalid(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}

/// 输出子目录只允许普通的相对路径片段
fn validate_subdir(dir: &str) -> Result<(), ParamsError> {
    let path = Path::new(dir);
    let only_normal = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if dir.is_empty() || !only_normal {
        return Err(ParamsError::invalid(
            "output_dir",
            "must be a relative path without '..'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_params_defaults() {
        let params =
            GenerationParams::from_json(ModelRole::ImageGenerator, json!({"prompt": "a cat"}))
                .unwrap();
        match params {
            GenerationParams::ImageGeneration(p) => {
                assert_eq!(p.width, 1024);
                assert_eq!(p.height, 1024);
                assert_eq!(p.num_images, 1);
                assert_eq!(p.num_inference_steps, 20);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_video_params_defaults() {
        let params = GenerationParams::from_json(
            ModelRole::VideoGenerator,
            json!({"image_path": "in.png"}),
        )
        .unwrap();
        assert_eq!(params.role(), ModelRole::VideoGenerator);
        match params {
            GenerationParams::VideoGeneration(p) => {
                assert_eq!(p.fps, 16);
                assert_eq!(p.num_frames, 81);
                assert!(p.tiled);
                assert_eq!(p.negative_prompt, "static, blurry, low quality");
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = GenerationParams::from_json(ModelRole::ImageEditor, json!({"prompt": "x"}))
            .unwrap_err();
        assert!(matches!(err, ParamsError::Malformed { role: ModelRole::ImageEditor, .. }));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = GenerationParams::from_json(
            ModelRole::ImageGenerator,
            json!({"prompt": "a cat", "num_images": 9}),
        )
        .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "num_images", .. }));

        let err = GenerationParams::from_json(
            ModelRole::ImageGenerator,
            json!({"prompt": "a cat", "width": 1000}),
        )
        .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "width", .. }));

        let err = GenerationParams::from_json(
            ModelRole::VideoGenerator,
            json!({"image_path": "in.png", "motion_strength": 1.5}),
        )
        .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "motion_strength", .. }));
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let err = GenerationParams::from_json(ModelRole::PromptOptimizer, json!({"prompt": "  "}))
            .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "prompt", .. }));
    }

    #[test]
    fn test_rejects_escaping_output_dir() {
        let err = GenerationParams::from_json(
            ModelRole::PromptOptimizer,
            json!({"prompt": "x", "output_dir": "../etc"}),
        )
        .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "output_dir", .. }));

        let err = GenerationParams::from_json(
            ModelRole::PromptOptimizer,
            json!({"prompt": "x", "output_dir": "/abs"}),
        )
        .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { field: "output_dir", .. }));

        let ok = GenerationParams::from_json(
            ModelRole::PromptOptimizer,
            json!({"prompt": "x", "output_dir": "project-1/shots"}),
        )
        .unwrap();
        assert_eq!(ok.output_subdir(), Some("project-1/shots"));
    }
}
