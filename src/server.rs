//! Start/stop lifecycle of the HTTP listener.
//!
//! `start` binds the port and spawns a serving task; the task accepts until
//! the [`ShutdownSignal`] fires, then drains open connections for the grace
//! period and aborts whatever is left.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::FileCatalog;
use crate::config::Config;
use crate::error::ServerError;
use crate::routes;
use crate::AppState;

/// One-shot stop request, shared by the control loop and the shutdown route.
///
/// Triggering more than once has no further effect.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SocketAddr),
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

struct RunningServer {
    addr: SocketAddr,
    signal: ShutdownSignal,
    task: JoinHandle<Result<(), ServerError>>,
}

/// Owner of the listener. Holds at most one running server.
pub struct ServerLifecycle {
    config: Arc<Config>,
    running: Option<RunningServer>,
}

impl ServerLifecycle {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            running: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current state. A server whose task already ended counts as stopped.
    pub fn state(&self) -> ServerState {
        match &self.running {
            Some(running) if !running.task.is_finished() => ServerState::Running,
            _ => ServerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .as_ref()
            .filter(|running| !running.task.is_finished())
            .map(|running| running.addr)
    }

    /// Reap a serving task that ended on its own, e.g. after `GET /shutdown`.
    ///
    /// Returns the task's error if its drain had to be forced.
    pub async fn refresh(&mut self) -> Result<(), ServerError> {
        let finished = self
            .running
            .as_ref()
            .is_some_and(|running| running.task.is_finished());

        if finished {
            if let Some(running) = self.running.take() {
                debug!("Reaping server task for {}", running.addr);
                running.task.await??;
            }
        }
        Ok(())
    }

    /// Bind the listener and start serving in the background.
    pub async fn start(&mut self, signal: ShutdownSignal) -> Result<StartOutcome, ServerError> {
        self.refresh().await?;

        if let Some(running) = &self.running {
            warn!("Start requested but server already running on {}", running.addr);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let state = AppState::new(FileCatalog::new(self.config.root_dir.clone()), signal.clone());
        let app = routes::app(state);
        let grace = self.config.shutdown_grace();

        info!(
            "Serving {} on {}",
            self.config.root_dir.display(),
            local_addr
        );

        let task = tokio::spawn(serve(listener, app, signal.clone(), grace));

        self.running = Some(RunningServer {
            addr: local_addr,
            signal,
            task,
        });

        Ok(StartOutcome::Started(local_addr))
    }

    /// Stop the running server, waiting for the drain to complete.
    pub async fn stop(&mut self) -> Result<StopOutcome, ServerError> {
        self.refresh().await?;

        let Some(running) = self.running.take() else {
            debug!("Stop requested but server is not running");
            return Ok(StopOutcome::NotRunning);
        };

        info!("Stopping server on {}", running.addr);
        running.signal.trigger();
        running.task.await??;

        Ok(StopOutcome::Stopped)
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.signal.trigger();
        }
    }
}

/// Accept loop. Returns once every connection has closed, or with
/// [`ServerError::ForcedShutdown`] if some were still open after `grace`.
async fn serve(
    listener: TcpListener,
    app: Router,
    signal: ShutdownSignal,
    grace: Duration,
) -> Result<(), ServerError> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        continue;
                    }
                };
                debug!(%peer, "Accepted connection");
                connections.spawn(serve_connection(stream, app.clone(), signal.clone()));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = signal.triggered() => break,
        }
    }

    drop(listener);
    info!(
        open_connections = connections.len(),
        grace_secs = grace.as_secs(),
        "Stopped accepting, waiting for open connections"
    );

    let drain = async {
        while connections.join_next().await.is_some() {}
    };

    if tokio::time::timeout(grace, drain).await.is_err() {
        error!(
            open_connections = connections.len(),
            "Grace period elapsed, aborting connections"
        );
        connections.shutdown().await;
        return Err(ServerError::ForcedShutdown { grace });
    }

    info!("Server stopped");
    Ok(())
}

async fn serve_connection(stream: TcpStream, app: Router, signal: ShutdownSignal) {
    let io = TokioIo::new(stream);
    let service = TowerToHyperService::new(app);
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(io, service);

    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(error = %e, "Connection error");
            }
            return;
        }
        _ = signal.triggered() => {}
    }

    conn.as_mut().graceful_shutdown();
    if let Err(e) = conn.await {
        debug!(error = %e, "Connection error while draining");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            root_dir: root.to_path_buf(),
            bind: "127.0.0.1".to_string(),
            port: 0,
            shutdown_grace_secs: 1,
        }
    }

    #[test]
    fn test_signal_is_idempotent() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!signal.is_triggered());
        other.trigger();
        other.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_new_lifecycle_is_stopped() {
        let temp_dir = TempDir::new().unwrap();
        let lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
        assert_eq!(lifecycle.local_addr(), None);
    }

    #[tokio::test]
    async fn test_second_start_reports_already_running() {
        let temp_dir = TempDir::new().unwrap();
        let mut lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));

        let first = lifecycle.start(ShutdownSignal::new()).await.unwrap();
        let StartOutcome::Started(addr) = first else {
            panic!("expected Started, got {first:?}");
        };

        let second = lifecycle.start(ShutdownSignal::new()).await.unwrap();
        assert_eq!(second, StartOutcome::AlreadyRunning);
        assert!(lifecycle.is_running());
        assert_eq!(lifecycle.local_addr(), Some(addr));

        assert_eq!(lifecycle.stop().await.unwrap(), StopOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));

        assert_eq!(lifecycle.stop().await.unwrap(), StopOutcome::NotRunning);
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_releases_port() {
        let temp_dir = TempDir::new().unwrap();
        let mut lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));

        let StartOutcome::Started(addr) = lifecycle.start(ShutdownSignal::new()).await.unwrap()
        else {
            panic!("server did not start");
        };
        assert!(TcpStream::connect(addr).await.is_ok());

        assert_eq!(lifecycle.stop().await.unwrap(), StopOutcome::Stopped);
        assert_eq!(lifecycle.state(), ServerState::Stopped);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let temp_dir = TempDir::new().unwrap();
        let mut lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));

        lifecycle.start(ShutdownSignal::new()).await.unwrap();
        lifecycle.stop().await.unwrap();

        let outcome = lifecycle.start(ShutdownSignal::new()).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)));
        lifecycle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let mut config = test_config(temp_dir.path());
        config.port = taken.local_addr().unwrap().port();
        let mut lifecycle = ServerLifecycle::new(config);

        let result = lifecycle.start(ShutdownSignal::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_external_trigger_stops_server() {
        let temp_dir = TempDir::new().unwrap();
        let mut lifecycle = ServerLifecycle::new(test_config(temp_dir.path()));

        let signal = ShutdownSignal::new();
        lifecycle.start(signal.clone()).await.unwrap();
        signal.trigger();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while lifecycle.is_running() {
            assert!(tokio::time::Instant::now() < deadline, "server did not stop");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        lifecycle.refresh().await.unwrap();
        assert_eq!(lifecycle.stop().await.unwrap(), StopOutcome::NotRunning);
    }
}
