//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, MAX_RETENTION_SECS};
use crate::domain::ModelRole;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `GENFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `GENFORGE_SERVER__PORT=8080`
/// - `GENFORGE_MODELS__IMAGE_GENERATOR__ENABLED=true`
/// - `GENFORGE_MODELS__IMAGE_GENERATOR__PATH=/models/flux`
/// - `GENFORGE_LEASE__GLOBAL_CAPACITY=2`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("lease.acquire_timeout_secs", 30)?
        .set_default("lease.global_capacity", 1)?
        .set_default("cleanup.completed_delay_secs", 300)?
        .set_default("cleanup.failed_delay_secs", 60)?
        .set_default("progress.stream_interval_ms", 500)?
        .set_default("storage.output_dir", "data/outputs")?
        .set_default("storage.staging_dir", "data/outputs/.staging")?
        .set_default("worker.queue_capacity", 256)?
        .set_default("worker.shutdown_grace_secs", 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    for role in ModelRole::ALL {
        builder = builder.set_default(format!("models.{}.enabled", role.config_key()), false)?;
    }

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("GENFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.progress.stream_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Progress stream interval cannot be 0".to_string(),
        ));
    }

    if config.worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Worker queue capacity cannot be 0".to_string(),
        ));
    }

    if config.lease.acquire_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Lease acquire timeout cannot be 0".to_string(),
        ));
    }

    for (name, secs) in [
        ("completed_delay_secs", config.cleanup.completed_delay_secs),
        ("failed_delay_secs", config.cleanup.failed_delay_secs),
    ] {
        if secs > MAX_RETENTION_SECS {
            return Err(ConfigError::ValidationError(format!(
                "Cleanup {} cannot exceed {}s, got {}",
                name, MAX_RETENTION_SECS, secs
            )));
        }
    }

    // 启用的角色必须配置模型路径；路径是否存在留到加载时检查
    for role in ModelRole::ALL {
        let model = config.models.get(role);
        if model.enabled && model.path.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}' is enabled but has no path",
                role.config_key()
            )));
        }
        if model.run_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}' run timeout cannot be 0",
                role.config_key()
            )));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    for role in ModelRole::ALL {
        let model = config.models.get(role);
        tracing::info!(
            "Model {}: enabled={}, path={:?}",
            role,
            model.enabled,
            model.path
        );
    }
    tracing::info!("Lease Acquire Timeout: {}s", config.lease.acquire_timeout_secs);
    if config.lease.global_capacity == 0 {
        tracing::info!("Global Model Ceiling: disabled");
    } else {
        tracing::info!("Global Model Ceiling: {}", config.lease.global_capacity);
    }
    tracing::info!(
        "Cleanup Delay: completed={}s, failed={}s",
        config.cleanup.completed_delay_secs,
        config.cleanup.failed_delay_secs
    );
    tracing::info!("Output Directory: {:?}", config.storage.output_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_interval() {
        let mut config = AppConfig::default();
        config.progress.stream_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_enabled_role_without_path() {
        let mut config = AppConfig::default();
        config.models.get_mut(ModelRole::ImageEditor).enabled = true;
        assert!(validate_config(&config).is_err());

        config.models.get_mut(ModelRole::ImageEditor).path = Some(PathBuf::from("/models/kontext"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_excessive_retention() {
        let mut config = AppConfig::default();
        config.cleanup.completed_delay_secs = MAX_RETENTION_SECS;
        assert!(validate_config(&config).is_ok());

        config.cleanup.completed_delay_secs = 100_000_000;
        assert!(validate_config(&config).is_err());

        config.cleanup.completed_delay_secs = 300;
        config.cleanup.failed_delay_secs = MAX_RETENTION_SECS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_run_timeout() {
        let mut config = AppConfig::default();
        config.models.get_mut(ModelRole::VideoGenerator).run_timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());

        config.models.get_mut(ModelRole::VideoGenerator).run_timeout_secs = Some(1);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_rejects_excessive_retention_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cleanup]\ncompleted_delay_secs = 100000000").unwrap();

        let result = load_config_from_path(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[models.image_generator]
enabled = true
path = "/models/flux"
run_timeout_secs = 45

[lease]
global_capacity = 2
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.lease.global_capacity, 2);
        let image = config.models.get(ModelRole::ImageGenerator);
        assert!(image.enabled);
        assert_eq!(image.path, Some(PathBuf::from("/models/flux")));
        assert_eq!(image.run_timeout_secs, Some(45));
        assert!(!config.models.get(ModelRole::VideoGenerator).enabled);
    }
}
