//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::ModelCatalogPort;
use crate::domain::ModelRole;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 模型配置（按角色）
    #[serde(default)]
    pub models: ModelsConfig,

    /// 租约配置
    #[serde(default)]
    pub lease: LeaseConfig,

    /// 任务记录清理配置
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// 进度推送配置
    #[serde(default)]
    pub progress: ProgressConfig,

    /// 产物存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// Worker 配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 生成后端配置
    #[serde(default)]
    pub backend: BackendConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体大小上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 单个模型角色配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// 是否启用
    #[serde(default)]
    pub enabled: bool,

    /// 模型权重路径
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// 单次生成超时（秒），未设置时使用角色默认值
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

/// 模型配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub prompt_optimizer: ModelConfig,

    #[serde(default)]
    pub image_generator: ModelConfig,

    #[serde(default)]
    pub image_editor: ModelConfig,

    #[serde(default)]
    pub video_generator: ModelConfig,
}

impl ModelsConfig {
    pub fn get(&self, role: ModelRole) -> &ModelConfig {
        match role {
            ModelRole::PromptOptimizer => &self.prompt_optimizer,
            ModelRole::ImageGenerator => &self.image_generator,
            ModelRole::ImageEditor => &self.image_editor,
            ModelRole::VideoGenerator => &self.video_generator,
        }
    }

    pub fn get_mut(&mut self, role: ModelRole) -> &mut ModelConfig {
        match role {
            ModelRole::PromptOptimizer => &mut self.prompt_optimizer,
            ModelRole::ImageGenerator => &mut self.image_generator,
            ModelRole::ImageEditor => &mut self.image_editor,
            ModelRole::VideoGenerator => &mut self.video_generator,
        }
    }
}

/// 各角色默认的生成超时（秒）
pub fn default_run_timeout_secs(role: ModelRole) -> u64 {
    match role {
        ModelRole::PromptOptimizer => 120,
        ModelRole::ImageGenerator => 300,
        ModelRole::ImageEditor => 300,
        ModelRole::VideoGenerator => 600,
    }
}

impl ModelCatalogPort for ModelsConfig {
    fn is_role_enabled(&self, role: ModelRole) -> bool {
        self.get(role).enabled
    }

    fn model_path(&self, role: ModelRole) -> Option<PathBuf> {
        self.get(role).path.clone()
    }

    fn run_timeout(&self, role: ModelRole) -> Duration {
        let secs = self
            .get(role)
            .run_timeout_secs
            .unwrap_or_else(|| default_run_timeout_secs(role));
        Duration::from_secs(secs)
    }
}

/// 租约配置
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConfig {
    /// 等待租约的最长时间（秒）
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// 同时驻留显存的模型角色上限，0 表示不限制
    #[serde(default = "default_global_capacity")]
    pub global_capacity: usize,
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_global_capacity() -> usize {
    1
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: default_acquire_timeout(),
            global_capacity: default_global_capacity(),
        }
    }
}

/// 任务记录保留时间上限（秒），超出清理队列的计时范围会导致清理失效
pub const MAX_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// 任务记录清理配置
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// 成功任务保留时间（秒）
    #[serde(default = "default_completed_delay")]
    pub completed_delay_secs: u64,

    /// 失败任务保留时间（秒）
    #[serde(default = "default_failed_delay")]
    pub failed_delay_secs: u64,
}

fn default_completed_delay() -> u64 {
    300 // 5 分钟
}

fn default_failed_delay() -> u64 {
    60
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            completed_delay_secs: default_completed_delay(),
            failed_delay_secs: default_failed_delay(),
        }
    }
}

/// 进度推送配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressConfig {
    /// 流式推送的采样间隔（毫秒）
    #[serde(default = "default_stream_interval")]
    pub stream_interval_ms: u64,
}

fn default_stream_interval() -> u64 {
    500
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            stream_interval_ms: default_stream_interval(),
        }
    }
}

/// 产物存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 产物输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 暂存目录（需与输出目录在同一文件系统）
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/outputs")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("data/outputs/.staging")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            staging_dir: default_staging_dir(),
        }
    }
}

/// Worker 配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// 待调度任务队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 关闭时等待进行中任务卸载的最长时间（秒）
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// 生成后端配置
///
/// 目前只有占位后端：模拟逐步生成并写出占位产物
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 模拟的生成步数
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// 每步耗时（毫秒）
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,

    /// 模拟加载耗时（毫秒）
    #[serde(default = "default_load_delay")]
    pub load_delay_ms: u64,
}

fn default_steps() -> u32 {
    20
}

fn default_step_delay() -> u64 {
    100
}

fn default_load_delay() -> u64 {
    500
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_delay_ms: default_step_delay(),
            load_delay_ms: default_load_delay(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
