//! TG Session - Telegram 会话登录前端服务
//!
//! - Domain: session/ (登录值对象与状态)
//! - Application: login 控制器, ports
//! - Infrastructure: http, memory, worker, adapters

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tgsession::application::SessionApiPort;
use tgsession::config::{load_config, print_config, LogConfig};
use tgsession::infrastructure::adapters::{FakeSessionApi, HttpSessionClient, SessionClientConfig};
use tgsession::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tgsession::infrastructure::memory::InMemoryFlowRegistry;
use tgsession::infrastructure::worker::{FlowSweeper, FlowSweeperConfig};

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},tgsession={},tower_http=debug", log.level, log.level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);

    tracing::info!("TG Session - 会话登录服务");
    print_config(&config);

    // 创建会话后端客户端
    let (session_api, backend_proxy): (Arc<dyn SessionApiPort>, Option<HttpSessionClient>) =
        if config.backend.fake {
            tracing::warn!("Using built-in fake backend, no real logins will happen");
            (Arc::new(FakeSessionApi::demo()), None)
        } else {
            let client_config = SessionClientConfig::new(&config.backend.url)
                .with_timeout_ms(config.backend.timeout_ms)
                .with_credentials(config.backend.with_credentials);
            let client = HttpSessionClient::new(client_config)?;
            if !client.health_check().await {
                tracing::warn!(url = %config.backend.url, "Session backend is not reachable yet");
            }
            (Arc::new(client.clone()), Some(client))
        };

    // 创建内存登录流程表
    let registry = Arc::new(InMemoryFlowRegistry::new());

    // 启动流程回收
    let shutdown = CancellationToken::new();
    if config.gc.enabled {
        let sweeper = FlowSweeper::new(
            FlowSweeperConfig {
                interval_secs: config.gc.interval_secs,
                flow_expire_secs: config.gc.flow_expire_secs,
            },
            registry.clone(),
        );
        tokio::spawn(sweeper.run(shutdown.clone()));
    }

    // 创建 HTTP 服务器
    let mut state = AppState::new(session_api, registry, config.poll)
        .with_forward_client_ip(config.backend.forward_client_ip);
    if let Some(proxy) = backend_proxy {
        state = state.with_backend_proxy(proxy);
    }

    let mut server_config = ServerConfig::new(&config.server.host, config.server.port);
    if let Some(dir) = config.server.static_dir() {
        server_config = server_config.with_static_dir(dir);
    }
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    let signal = shutdown.clone();
    server
        .run_with_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    tracing::info!("Server shutdown complete");

    Ok(())
}
