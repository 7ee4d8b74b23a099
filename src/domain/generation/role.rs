//! Generation Context - Model Role

use serde::{Deserialize, Serialize};

/// 模型角色
///
/// 每个角色对应一个可独立加载/卸载的重型模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelRole {
    PromptOptimizer,
    ImageGenerator,
    ImageEditor,
    VideoGenerator,
}

impl ModelRole {
    pub const ALL: [ModelRole; 4] = [
        ModelRole::PromptOptimizer,
        ModelRole::ImageGenerator,
        ModelRole::ImageEditor,
        ModelRole::VideoGenerator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::PromptOptimizer => "prompt-optimizer",
            ModelRole::ImageGenerator => "image-generator",
            ModelRole::ImageEditor => "image-editor",
            ModelRole::VideoGenerator => "video-generator",
        }
    }

    /// 配置文件中的键名（`models.<key>`）
    pub fn config_key(&self) -> &'static str {
        match self {
            ModelRole::PromptOptimizer => "prompt_optimizer",
            ModelRole::ImageGenerator => "image_generator",
            ModelRole::ImageEditor => "image_editor",
            ModelRole::VideoGenerator => "video_generator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s || role.config_key() == s)
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
