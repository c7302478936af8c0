//! Share one local folder over the LAN for browser downloads.
//!
//! The HTTP side (listing page, downloads, remote stop) is started and
//! stopped from an interactive terminal menu.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod menu;
pub mod net;
pub mod routes;
pub mod server;

pub use catalog::{FileCatalog, FileEntry};
pub use config::Config;
pub use error::{FileServerError, ServerError};
pub use menu::ControlLoop;
pub use server::{ServerLifecycle, ServerState, ShutdownSignal, StartOutcome, StopOutcome};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Directory to serve files from
    pub catalog: FileCatalog,
    /// Raised by the shutdown route
    pub shutdown: ShutdownSignal,
}

impl AppState {
    pub fn new(catalog: FileCatalog, shutdown: ShutdownSignal) -> Self {
        Self { catalog, shutdown }
    }
}
