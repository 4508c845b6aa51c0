//! Startup orchestration.
//!
//! Both entry points (`serve` and `worker`) build a plugin registry from the
//! plugin directory and keep it hot-reloaded. `serve` then binds the
//! listener (and admin API), `worker` consumes the request queue.
//!
//! Any startup error is fatal; listeners start last.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::admin::{serve_admin, AdminState};
use crate::bridge::{BridgeError, Broker, NatsBroker, RemotePublisher, RemoteWorker};
use crate::config::ServerConfig;
use crate::http::{ConnectionGate, Executor, Server, ServerError};
use crate::lifecycle::Shutdown;
use crate::observability::stats::ServiceStats;
use crate::plugins::{Catalog, PluginLoader, PluginRegistry, PluginWatcher};
use crate::routing::Dispatcher;
use crate::scheduler::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("plugin directory: {0}")]
    PluginDirectory(#[from] std::io::Error),
    #[error("plugin watcher: {0}")]
    Watch(#[from] notify::Error),
}

/// Registry populated from the plugin directory and kept in sync with it.
pub struct Plugins {
    pub registry: Arc<PluginRegistry>,
    pub loader: Arc<PluginLoader>,
    _watcher: PluginWatcher,
}

/// Scan the plugin directory and start watching it.
pub fn load_plugins(
    config: &ServerConfig,
    catalog: Arc<Catalog>,
    shutdown: &Shutdown,
) -> Result<Plugins, StartupError> {
    let routing = &config.routing;
    std::fs::create_dir_all(&routing.plugin_directory)?;

    let registry = Arc::new(PluginRegistry::new());
    let loader = Arc::new(PluginLoader::new(
        Arc::clone(&registry),
        catalog,
        routing.root_directory.clone(),
        routing.plugin_directory.clone(),
    ));
    loader.scan()?;
    let watcher = Arc::clone(&loader).watch(shutdown)?;

    Ok(Plugins {
        registry,
        loader,
        _watcher: watcher,
    })
}

async fn connect_broker(config: &ServerConfig, broker: Option<Broker>) -> Result<Option<Broker>, StartupError> {
    match broker {
        Some(broker) => Ok(Some(broker)),
        None if config.broker.enabled => Ok(Some(NatsBroker::connect(&config.broker).await?.into())),
        None => Ok(None),
    }
}

/// A started server.
pub struct RunningServer {
    pub local_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub gate: Arc<ConnectionGate>,
    pub pool: WorkerPool,
    pub stats: Arc<ServiceStats>,
    pub plugins: Plugins,
    pub publisher: Option<Arc<RemotePublisher>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// Wait for the server to stop.
    pub async fn wait(self) -> Result<(), ServerError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
        }
    }
}

/// Start the request server.
///
/// With `broker` set (or `[broker] enabled`), requests are executed by remote
/// workers; otherwise they are dispatched in-process.
pub async fn start_server(
    config: ServerConfig,
    catalog: Arc<Catalog>,
    broker: Option<Broker>,
    shutdown: Shutdown,
) -> Result<RunningServer, StartupError> {
    let plugins = load_plugins(&config, catalog, &shutdown)?;

    let publisher = match connect_broker(&config, broker).await? {
        Some(broker) => {
            let publisher = Arc::new(RemotePublisher::new(
                broker,
                Duration::from_secs(config.broker.response_timeout_secs),
                config.broker.prefetch,
            ));
            let responses = Arc::clone(&publisher);
            let stop = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = responses.run_responses(stop).await {
                    tracing::error!(error = %e, "Response consumer failed");
                }
            });
            Some(publisher)
        }
        None => None,
    };

    let executor = match &publisher {
        Some(publisher) => Executor::Remote(Arc::clone(publisher)),
        None => Executor::Local(Arc::new(Dispatcher::new(
            Arc::clone(&plugins.registry),
            &config.routing,
        ))),
    };

    let server = Server::bind(&config, executor).await?;
    let local_addr = server.local_addr().map_err(ServerError::from)?;
    let gate = server.gate();
    let pool = server.pool();
    let stats = server.stats();

    let admin_addr = if config.admin.enabled {
        let listener = tokio::net::TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(ServerError::from)?;
        let addr = listener.local_addr().map_err(ServerError::from)?;
        let state = AdminState {
            gate: Arc::clone(&gate),
            pool: pool.clone(),
            registry: Arc::clone(&plugins.registry),
            stats: Arc::clone(&stats),
            publisher: publisher.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
            started_at: Instant::now(),
        };
        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, state, stop).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
        Some(addr)
    } else {
        None
    };

    let handle = tokio::spawn(server.run(shutdown));

    Ok(RunningServer {
        local_addr,
        admin_addr,
        gate,
        pool,
        stats,
        plugins,
        publisher,
        handle,
    })
}

/// A started remote worker.
pub struct RunningWorker {
    pub plugins: Plugins,
    handle: JoinHandle<Result<(), BridgeError>>,
}

impl RunningWorker {
    /// Wait for the worker to stop. An error means the broker went away.
    pub async fn wait(self) -> Result<(), BridgeError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(BridgeError::BrokerUnavailable(format!("worker task failed: {e}"))),
        }
    }
}

/// Start a remote worker process.
pub async fn start_worker(
    config: ServerConfig,
    catalog: Arc<Catalog>,
    broker: Option<Broker>,
    shutdown: Shutdown,
) -> Result<RunningWorker, StartupError> {
    let plugins = load_plugins(&config, catalog, &shutdown)?;

    let broker = match broker {
        Some(broker) => broker,
        None => NatsBroker::connect(&config.broker).await?.into(),
    };

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&plugins.registry), &config.routing));
    let worker = RemoteWorker::new(
        broker,
        dispatcher,
        config.workers.capacity,
        config.broker.prefetch,
    );
    let handle = tokio::spawn(worker.run(shutdown));

    Ok(RunningWorker { plugins, handle })
}
