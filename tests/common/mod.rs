//! Test utilities and common setup.

#![allow(dead_code)]

use std::path::Path;

use axum::Router;
use tempfile::TempDir;
use transferir::{routes, AppState, Config, FileCatalog, ShutdownSignal};

/// Serving directory holding `a.txt` (10 bytes), `b.bin` (empty) and a
/// subdirectory with one file in it.
pub fn sample_dir() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.txt"), b"0123456789").unwrap();
    std::fs::write(temp_dir.path().join("b.bin"), b"").unwrap();
    std::fs::create_dir(temp_dir.path().join("nested")).unwrap();
    std::fs::write(temp_dir.path().join("nested/inner.txt"), b"inner").unwrap();
    temp_dir
}

/// Router over `root`, plus the signal its shutdown route raises.
pub fn test_app(root: &Path) -> (Router, ShutdownSignal) {
    let signal = ShutdownSignal::new();
    let state = AppState::new(FileCatalog::new(root), signal.clone());
    (routes::app(state), signal)
}

/// Config for a live server on an ephemeral loopback port.
pub fn test_config(root: &Path) -> Config {
    Config {
        root_dir: root.to_path_buf(),
        bind: "127.0.0.1".to_string(),
        port: 0,
        shutdown_grace_secs: 1,
    }
}
