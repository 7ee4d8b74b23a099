//! Generation Backend Port - 生成能力抽象
//!
//! 模型的数学部分对本服务是不透明的：后端负责把权重加载成可运行的管线，
//! 管线把参数变成写入暂存目录的产物。

use std::path::Path;

use crate::application::ports::{ModelError, ProgressReporter};
use crate::domain::{Artifact, GenerationParams, ModelRole};

/// 已加载的生成管线
///
/// 持有显存等设备资源，drop 即释放
pub trait LoadedPipeline: Send {
    /// 执行生成，产物写入 `staging_dir`
    ///
    /// 返回的 `Artifact.files` 必须位于 `staging_dir` 之内
    fn generate(
        &mut self,
        params: &GenerationParams,
        staging_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<Artifact, ModelError>;
}

/// Generation Backend Port
pub trait GenerationBackend: Send + Sync {
    /// 加载指定角色的模型
    fn load(&self, role: ModelRole, model_path: &Path) -> Result<Box<dyn LoadedPipeline>, ModelError>;

    /// 后端名称（用于日志）
    fn name(&self) -> &'static str {
        "generation-backend"
    }
}
