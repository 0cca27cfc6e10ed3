//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::application::login::PollConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 会话后端配置
    #[serde(default)]
    pub backend: BackendConfig,

    /// 二维码轮询配置
    #[serde(default)]
    pub poll: PollConfig,

    /// 登录流程回收配置
    #[serde(default)]
    pub gc: GcConfig,

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

    /// 静态文件服务配置
    #[serde(default)]
    pub static_files: StaticFilesConfig,
}

/// 静态文件服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct StaticFilesConfig {
    /// 是否启用静态文件服务
    #[serde(default)]
    pub enabled: bool,

    /// 前端构建产物目录
    #[serde(default = "default_static_dir")]
    pub dir: PathBuf,
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 启用时返回静态文件目录
    pub fn static_dir(&self) -> Option<PathBuf> {
        self.static_files
            .enabled
            .then(|| self.static_files.dir.clone())
    }
}

/// 会话后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 后端基础 URL（绝对地址）
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// 请求超时时间（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 是否在请求间保留 cookie
    #[serde(default)]
    pub with_credentials: bool,

    /// 是否把终端用户 IP 以 X-Forwarded-For 转发给后端
    #[serde(default = "default_forward_client_ip")]
    pub forward_client_ip: bool,

    /// 使用内置的脚本化后端（演示用，不发出网络请求）
    #[serde(default)]
    pub fake: bool,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_forward_client_ip() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_ms: default_timeout_ms(),
            with_credentials: false,
            forward_client_ip: default_forward_client_ip(),
            fake: false,
        }
    }
}

/// 登录流程回收配置
#[derive(Debug, Clone, Deserialize)]
pub struct GcConfig {
    /// 是否启用回收
    #[serde(default = "default_gc_enabled")]
    pub enabled: bool,

    /// 扫描间隔（秒）
    #[serde(default = "default_gc_interval")]
    pub interval_secs: u64,

    /// 流程空闲过期时间（秒），与后端的 15 分钟窗口一致
    #[serde(default = "default_flow_expire")]
    pub flow_expire_secs: u64,
}

fn default_gc_enabled() -> bool {
    true
}

fn default_gc_interval() -> u64 {
    30
}

fn default_flow_expire() -> u64 {
    900
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: default_gc_enabled(),
            interval_secs: default_gc_interval(),
            flow_expire_secs: default_flow_expire(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_ms, 30_000);
        assert!(!config.backend.with_credentials);
        assert_eq!(config.poll.interval_ms, 2000);
        assert_eq!(config.poll.max_attempts, 60);
        assert_eq!(config.gc.flow_expire_secs, 900);
    }

    #[test]
    fn test_static_dir_only_when_enabled() {
        let mut config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(config.static_dir().is_none());

        config.static_files.enabled = true;
        assert_eq!(config.static_dir(), Some(PathBuf::from("dist")));
    }
}
