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

use super::types::AppConfig;

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

/// 环境变量前缀
const ENV_PREFIX: &str = "TGSESSION";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TGSESSION_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TGSESSION_SERVER__PORT=3000`
/// - `TGSESSION_BACKEND__URL=http://tg-session:8000`
/// - `TGSESSION_BACKEND__TIMEOUT_MS=30000`
/// - `TGSESSION_POLL__INTERVAL_MS=2000`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("server.static_files.enabled", false)?
        .set_default("server.static_files.dir", "dist")?
        .set_default("backend.url", "http://localhost:8000")?
        .set_default("backend.timeout_ms", 30_000)?
        .set_default("backend.with_credentials", false)?
        .set_default("backend.forward_client_ip", true)?
        .set_default("backend.fake", false)?
        .set_default("poll.interval_ms", 2000)?
        .set_default("poll.max_attempts", 60)?
        .set_default("gc.enabled", true)?
        .set_default("gc.interval_secs", 30)?
        .set_default("gc.flow_expire_secs", 900)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: TGSESSION_BACKEND__URL=http://tg-session:8000
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
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

    if !config.backend.fake {
        let url = config.backend.url.trim();
        if url.is_empty() {
            return Err(ConfigError::ValidationError(
                "Backend URL cannot be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "Backend URL must be absolute: {}",
                url
            )));
        }
    }

    if config.backend.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Backend timeout cannot be 0".to_string(),
        ));
    }

    if config.poll.interval_ms == 0 || config.poll.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "Poll interval and max attempts must be positive".to_string(),
        ));
    }

    if config.gc.enabled && config.gc.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "GC interval cannot be 0 when GC is enabled".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    match config.server.static_dir() {
        Some(dir) => tracing::info!("Static Files: {}", dir.display()),
        None => tracing::info!("Static Files: disabled"),
    }
    if config.backend.fake {
        tracing::info!("Backend: built-in fake");
    } else {
        tracing::info!("Backend URL: {}", config.backend.url);
    }
    tracing::info!("Backend Timeout: {}ms", config.backend.timeout_ms);
    tracing::info!("With Credentials: {}", config.backend.with_credentials);
    tracing::info!("Forward Client IP: {}", config.backend.forward_client_ip);
    tracing::info!(
        "QR Poll: every {}ms, at most {} times",
        config.poll.interval_ms,
        config.poll.max_attempts
    );
    tracing::info!("GC Enabled: {}", config.gc.enabled);
    if config.gc.enabled {
        tracing::info!("GC Interval: {}s", config.gc.interval_secs);
        tracing::info!("Flow Expire: {}s", config.gc.flow_expire_secs);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
