//! Model Handle Port - 重型模型生命周期
//!
//! 每个 ModelHandle 包装一个模型角色的实例，只负责 load / run / unload，
//! 生成本身委托给 `GenerationBackend`。
//!
//! 所有方法都是阻塞调用，调用方负责放到阻塞线程池执行。

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Artifact, GenerationParams, ModelRole};

/// 生成阶段在整体进度中占据的区间
pub const RUN_PROGRESS_START: u8 = 10;
pub const RUN_PROGRESS_END: u8 = 95;

/// 模型错误
#[derive(Debug, Error)]
pub enum ModelError {
    /// 角色未启用或模型路径不存在（加载失败）
    #[error("Model unavailable for {role}: {reason}")]
    Unavailable { role: ModelRole, reason: String },

    /// 生成过程失败
    #[error("Execution failed: {0}")]
    Execution(String),

    /// 执行被取消（超时）
    #[error("Execution cancelled")]
    Cancelled,
}

impl ModelError {
    pub fn unavailable(role: ModelRole, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            role,
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// 单次生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task_id: String,
    pub params: GenerationParams,
}

/// 进度上报
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    /// 整体进度（已映射到 10..=95）
    pub progress: u8,
    pub message: Option<String>,
}

/// 进度上报器
///
/// 管线以自身的 0..=100 百分比上报，这里映射到整体进度的生成区间后
/// 通过 channel 发送给编排器，管线不依赖具体的传输方式。
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressReport>,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::UnboundedSender<ProgressReport>, cancel: CancellationToken) -> Self {
        Self { sender, cancel }
    }

    /// 不关心进度的调用方使用
    pub fn detached() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self::new(sender, CancellationToken::new())
    }

    pub fn report(&self, percent: u8, message: Option<String>) {
        let span = u32::from(RUN_PROGRESS_END - RUN_PROGRESS_START);
        let scaled = u32::from(percent.min(100)) * span / 100;
        let progress = RUN_PROGRESS_START + scaled as u8;
        // 接收端关闭说明编排器已放弃此次运行
        let _ = self.sender.send(ProgressReport { progress, message });
    }

    /// 管线应在步骤之间检查，及时放弃已超时的运行
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Model Handle
///
/// 同一时刻只被持有该角色租约的一次运行独占
pub trait ModelHandle: Send {
    fn role(&self) -> ModelRole;

    fn is_loaded(&self) -> bool;

    /// 加载权重（幂等）
    fn ensure_loaded(&mut self) -> Result<(), ModelError>;

    /// 执行生成
    ///
    /// 失败时不会在输出目录留下不完整的产物
    fn run(
        &mut self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Artifact, ModelError>;

    /// 卸载并释放显存（幂等，尽力而为）
    fn unload(&mut self);
}

/// 按角色创建 ModelHandle
///
/// 每次编排运行创建一个新的、未加载的实例
pub trait ModelHandleFactory: Send + Sync {
    fn create(&self, role: ModelRole) -> Box<dyn ModelHandle>;
}
