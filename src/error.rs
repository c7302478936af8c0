use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors returned by the download endpoint.
#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("File parameter is missing")]
    MissingFileParam,

    #[error("File not found")]
    NotFound(String),

    #[error("Path is outside root directory")]
    PathTraversal,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            FileServerError::MissingFileParam => StatusCode::BAD_REQUEST,
            FileServerError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServerError::PathTraversal => StatusCode::FORBIDDEN,
            FileServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Errors from the server lifecycle and the control loop.
///
/// Every variant ends the interactive session.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Unable to read serving directory {path}: {source}")]
    Catalog {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid listen address: {0}")]
    InvalidAddr(#[from] std::net::AddrParseError),

    #[error("Could not listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server forced to shut down: connections still open after {grace:?}")]
    ForcedShutdown { grace: Duration },

    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Terminal IO error: {0}")]
    Terminal(#[from] std::io::Error),
}
