//! Generation Context - 生成限界上下文
//!
//! 职责:
//! - 模型角色（prompt 优化、文生图、图像编辑、图生视频）
//! - 各角色的生成参数与校验

mod errors;
mod params;
mod role;

pub use errors::ParamsError;
pub use params::{
    GenerationParams, ImageEditParams, ImageGenerationParams, PromptOptimizeParams,
    VideoGenerationParams,
};
pub use role::ModelRole;
