// 引入标准库：
// `Path`: 文件路径处理。
// `Arc`: 原子引用计数，用于共享状态。
use std::{path::Path, sync::Arc};

// 仅在 Unix 系统下引入文件系统模块，用于处理 Unix Domain Socket 文件。
#[cfg(unix)]
use std::fs;

// 引入 actix-web 框架组件：
// `middleware::Logger`: HTTP 请求日志中间件。
// `web`: 路由配置和数据提取。
// `App`: 应用程序构造器。
// `HttpServer`: HTTP 服务器。
use actix_web::{middleware::Logger, web, App, HttpServer};

// 引入领域层配置和服务：
// `ApiConfig`: API 服务配置。
// `TopologyLoader` / `TopologyStore`: 拓扑模型的加载器与存储。
// `init_telemetry`: 初始化遥测。
use panic_dashboard_domain::{
    config::{ApiConfig, ConfigError},
    documents::IniConfigSource,
    services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
    topology::{TopologyLoader, TopologyStore},
};
// 引入存储层实现。
use panic_dashboard_storage::RedisMetricStore;
// 引入配置文件监听。
use panic_dashboard_watcher::{watch_config_dir, WatchError};
// 引入错误宏。
use thiserror::Error;
use tracing::info;

// 引入内部模块：
// 处理函数 handlers。
// 应用状态 AppState。
use crate::{
    handlers::{configure_server_routes, metrics_handler},
    state::AppState,
};

// 应用程序启动入口函数。
// 返回 `Result<(), BootstrapError>`。
pub async fn run() -> Result<(), BootstrapError> {
    // 1. 加载配置
    let config = ApiConfig::load_from_env()?;

    // 2. 初始化遥测 (Telemetry)
    // 根据 "API" 前缀的环境变量配置遥测。
    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    // 3. 启动配置文件监听
    // 必须先于首次加载注册：加载期间发生的修改也会触发重新加载。
    // 监听注册失败同样是启动错误。
    let topology = Arc::new(TopologyStore::new());
    let loader = Arc::new(TopologyLoader::new(
        Arc::clone(&topology),
        IniConfigSource::new(config.config_dir()),
    ));
    let watchers = watch_config_dir(Arc::clone(&loader))?;

    // 4. 首次加载配置文件
    // 缺少界面认证信息时直接退出，不允许在无认证的状态下启动。
    loader.load_initial()?;
    info!(dir = %config.config_dir().display(), "configuration loaded");

    // 5. 构建应用状态
    // 将拓扑存储、指标存储和遥测守卫组合成 AppState。
    let store = Arc::new(RedisMetricStore::new());
    let state = AppState::new(topology, store, telemetry.clone());

    // 判断是否在公共接口上暴露指标端点。
    // 如果配置了内部监听器（Internal Listener），则通常只在内部接口暴露指标，公共接口不暴露。
    let include_metrics_on_public = !config.has_internal_listener();

    // 克隆 state 用于公共服务器闭包。
    let public_state = state.clone();

    // 6. 配置并创建公共 HTTP 服务器 (Public Server)
    // `move ||` 闭包会在每个 worker 线程中执行，构建 App 实例。
    let mut public_server = HttpServer::new(move || {
        let mut app = App::new()
            // 注入共享状态数据
            .app_data(web::Data::new(public_state.clone()))
            // 添加日志中间件
            .wrap(Logger::default());

        // 如果需要在公共接口暴露指标，注册 /metrics 路由。
        if include_metrics_on_public {
            app = app.route("/metrics", web::get().to(metrics_handler));
        }

        // 注册 /server/* 路由（含无效端点的兜底处理）。
        app.configure(configure_server_routes)
    });

    // 绑定公共服务器地址。
    // Unix 系统下支持 Unix Domain Socket (UDS)。
    #[cfg(unix)]
    {
        if let Some(socket) = config.api_unix_socket() {
            // 如果配置了 UDS，先清理可能存在的旧 socket 文件。
            cleanup_socket(socket)?;
            public_server = public_server.bind_uds(socket)?;
        } else {
            // 否则绑定 TCP 地址。
            public_server = public_server.bind(config.api_bind_address())?;
        }
    }

    // 非 Unix 系统（如 Windows）不支持 UDS。
    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        public_server = public_server.bind(config.api_bind_address())?;
    }

    // 运行公共服务器（非阻塞，返回 Server 句柄）。
    let public_server = public_server.run();

    // 7. 配置并创建内部 HTTP 服务器 (Internal Server) - 可选
    // 内部服务器只暴露监控指标，不向公网暴露。
    let internal_server = if config.has_internal_listener() {
        let internal_state = state.clone();
        let mut internal_server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(internal_state.clone()))
                .wrap(Logger::default())
                // 内部接口始终暴露指标
                .route("/metrics", web::get().to(metrics_handler))
        });

        #[cfg(unix)]
        {
            if let Some(socket) = config.internal_unix_socket() {
                cleanup_socket(socket)?;
                internal_server = internal_server.bind_uds(socket)?;
            } else if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(socket) = config.internal_unix_socket() {
                return Err(BootstrapError::Io(std::io::Error::other(format!(
                    "internal unix socket '{socket}' requested but this platform does not support it"
                ))));
            }
            if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        Some(internal_server.run())
    } else {
        None
    };

    // 8. 并发运行服务器与配置监听
    // 服务器退出或任一监听任务出错都会导致整体退出。
    let servers = async {
        if let Some(internal) = internal_server {
            // 如果开启了内部服务器，使用 `try_join!` 同时等待两个服务器运行。
            tokio::try_join!(public_server, internal).map(|_| ())
        } else {
            // 否则只等待公共服务器。
            public_server.await
        }
    };

    tokio::select! {
        served = servers => served?,
        watched = watchers.supervise() => watched?,
    }

    Ok(())
}

// 定义启动过程中的错误枚举。
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("config watch error: {0}")]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// 辅助函数：清理 Unix Socket 文件。
// 如果 socket 文件已存在（例如上次非正常退出遗留），bind 会失败，所以需要先删除。
#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}

// 非 Unix 系统的空实现。
#[cfg(not(unix))]
fn cleanup_socket(_path: &str) -> std::io::Result<()> {
    Ok(())
}
