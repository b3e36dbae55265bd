use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Listener settings for a [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Upper bound for receiving request headers, and separately the body.
    pub read_timeout: Duration,
    /// Upper bound for producing a response.
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        ServerConfig {
            addr,
            ..Self::default()
        }
    }
}

/// Where a [`Lifecycle`] is. Transitions only move forward:
/// `Idle -> Running -> Draining -> Stopped`, or `Idle -> Stopped` when it is
/// shut down (or fails to bind) before serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Listener failure outside of a requested shutdown. Logged, never returned.
#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("could not bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("could not accept connection: {0}")]
    Accept(#[from] io::Error),

    #[error("listener task failed: {0}")]
    Task(String),

    #[error("listener is already running")]
    AlreadyRunning,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("in-flight requests did not complete before the shutdown deadline")]
    DeadlineExceeded,
}

/// Start/stop lifecycle of the service's HTTP listener.
///
/// A lifecycle is single use: once stopped it cannot serve again.
pub struct Lifecycle {
    config: ServerConfig,
    router: Router,
    state: watch::Sender<LifecycleState>,
    shutdown: CancellationToken,
    local_addr: OnceLock<SocketAddr>,
    serve_task: OnceLock<AbortHandle>,
}

impl Lifecycle {
    /// Wrap `router` with the configured read and write timeouts.
    pub fn new(router: Router, config: ServerConfig) -> Self {
        let router = router
            .layer(TimeoutLayer::new(config.write_timeout))
            .layer(RequestBodyTimeoutLayer::new(config.read_timeout));
        let (state, _) = watch::channel(LifecycleState::Idle);

        Lifecycle {
            config,
            router,
            state,
            shutdown: CancellationToken::new(),
            local_addr: OnceLock::new(),
            serve_task: OnceLock::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Address the listener is bound to, once it is.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Spawn [`Lifecycle::run`] and return its handle.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    /// Bind and serve until the listener is shut down or fails.
    ///
    /// Failures are logged with `at = "startup"` rather than returned; use
    /// [`Lifecycle::ready`] to find out whether the listener came up.
    pub async fn run(&self) {
        match self.state() {
            LifecycleState::Idle => {}
            LifecycleState::Running => {
                tracing::error!(at = "startup", error = %ServeError::AlreadyRunning, "could not start listening");
                return;
            }
            LifecycleState::Draining | LifecycleState::Stopped => {
                tracing::debug!(at = "startup", "listener already shut down, not starting");
                return;
            }
        }

        let listener = match TcpListener::bind(self.config.addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let err = ServeError::Bind {
                    addr: self.config.addr,
                    source,
                };
                tracing::error!(at = "startup", error = %err, "could not start listening");
                self.transition(LifecycleState::Idle, LifecycleState::Stopped);
                return;
            }
        };
        if !self.mark_running(listener.local_addr().ok()) {
            match self.state() {
                LifecycleState::Running | LifecycleState::Draining => {
                    tracing::error!(at = "startup", error = %ServeError::AlreadyRunning, "could not start listening");
                }
                _ => tracing::debug!(at = "startup", "listener shut down while binding"),
            }
            return;
        }
        tracing::info!(at = "startup", addr = ?self.local_addr(), "listening");

        let task = tokio::spawn(serve_connections(
            listener,
            self.router.clone(),
            self.config.read_timeout,
            self.shutdown.clone(),
        ));
        let _ = self.serve_task.set(task.abort_handle());

        match task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                tracing::warn!(at = "shutdown", "listener closed before draining completed");
            }
            Err(e) => {
                tracing::error!(at = "startup", error = %ServeError::Task(e.to_string()), "could not start listening");
            }
        }

        self.state.send_replace(LifecycleState::Stopped);
    }

    /// Wait until the listener is bound, returning its address, or `None`
    /// if it stopped without ever binding.
    pub async fn ready(&self) -> Option<SocketAddr> {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state != LifecycleState::Idle).await;
        self.local_addr()
    }

    /// Stop accepting connections and drain in-flight requests, waiting at
    /// most until `deadline`.
    ///
    /// Shutting down a stopped lifecycle is a no-op that succeeds. When the
    /// deadline passes first, remaining connections are dropped and
    /// [`ShutdownError::DeadlineExceeded`] is returned.
    pub async fn shutdown(&self, deadline: Instant) -> Result<(), ShutdownError> {
        let mut previous = LifecycleState::Idle;
        self.state.send_modify(|state| {
            previous = *state;
            *state = match *state {
                LifecycleState::Idle => LifecycleState::Stopped,
                LifecycleState::Running => LifecycleState::Draining,
                other => other,
            };
        });
        self.shutdown.cancel();

        match previous {
            LifecycleState::Stopped => {
                tracing::warn!(at = "shutdown", "trying to shut down an already stopped listener");
                return Ok(());
            }
            LifecycleState::Idle => return Ok(()),
            LifecycleState::Running | LifecycleState::Draining => {}
        }

        let mut rx = self.state.subscribe();
        let drained = tokio::time::timeout_at(deadline, rx.wait_for(|state| *state == LifecycleState::Stopped)).await;
        match drained {
            Ok(_) => Ok(()),
            Err(_) => {
                if let Some(task) = self.serve_task.get() {
                    task.abort();
                }
                let err = ShutdownError::DeadlineExceeded;
                tracing::error!(at = "shutdown", error = %err, "could not drain listener");
                Err(err)
            }
        }
    }

    /// [`Lifecycle::shutdown`] with a deadline `timeout` from now.
    pub async fn shutdown_timeout(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.shutdown(Instant::now() + timeout).await
    }

    /// `Idle -> Running`, publishing `addr` in the same step so that
    /// [`Lifecycle::ready`] never sees one without the other. Fails when a
    /// shutdown or another `run` got there first.
    fn mark_running(&self, addr: Option<SocketAddr>) -> bool {
        self.state.send_if_modified(|state| {
            if *state != LifecycleState::Idle {
                return false;
            }
            if let Some(addr) = addr {
                let _ = self.local_addr.set(addr);
            }
            *state = LifecycleState::Running;
            true
        })
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

/// Accept loop. Each connection is served by hyper with the HTTP/1 header
/// read bounded by `read_timeout`; once `shutdown` fires, no new
/// connections are accepted and open ones are drained.
///
/// Connection tasks live in a `JoinSet` owned by this future, so aborting
/// it drops whatever is still open.
async fn serve_connections(
    listener: TcpListener,
    router: Router,
    read_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut builder = AutoBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout);
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, _remote) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!(error = %ServeError::Accept(e), "failed to accept connection");
                        continue;
                    }
                };
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::warn!(error = %e, "failed to set TCP_NODELAY");
                }

                let router = router.clone();
                let service = hyper::service::service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let mut router = router.clone();
                    async move { router.call(req.map(axum::body::Body::new)).await }
                });
                let conn = builder.serve_connection_with_upgrades(TokioIo::new(socket), service);
                let conn = graceful.watch(conn.into_owned());

                connections.spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!(error = %e, "connection closed");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.cancelled() => {
                tracing::info!(at = "shutdown", "stopping accept loop");
                break;
            }
        }
    }

    drop(listener);
    graceful.shutdown().await;
}
