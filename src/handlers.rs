use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::catalog::FileEntry;
use crate::error::FileServerError;
use crate::AppState;

/// Query parameters for download endpoint
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Name of a file directly inside the serving directory
    pub file: Option<String>,
}

// ============================================================================
// Helper functions
// ============================================================================

/// Resolve a requested file name against the serving directory.
///
/// Only a single plain path component is accepted: parent references,
/// separators, absolute paths and null bytes are rejected, since nothing
/// below the top level is ever listed. A backslash is an ordinary filename
/// character outside Windows.
fn resolve_file_name(root: &Path, name: &str) -> Result<PathBuf, FileServerError> {
    let separators: &[char] = if cfg!(windows) { &['/', '\\'] } else { &['/'] };
    if name.contains('\0') || name.contains(separators) {
        warn!("Rejected download name with separator or null byte: {:?}", name);
        return Err(FileServerError::PathTraversal);
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => Ok(root.join(part)),
        _ => {
            warn!("Path traversal attempt detected: {:?}", name);
            Err(FileServerError::PathTraversal)
        }
    }
}

/// Resolve a requested file and verify it is a regular file that stays
/// inside the serving directory once symlinks are followed.
async fn resolve_and_verify_file(root: &Path, name: &str) -> Result<PathBuf, FileServerError> {
    let built_path = resolve_file_name(root, name)?;

    let canonical_path = fs::canonicalize(&built_path)
        .await
        .map_err(|_| FileServerError::NotFound(name.to_string()))?;
    let canonical_root = fs::canonicalize(root).await?;

    if !canonical_path.starts_with(&canonical_root) {
        warn!(
            "Symlink escape attempt: {:?} resolved to {:?} which is outside {:?}",
            built_path, canonical_path, canonical_root
        );
        return Err(FileServerError::PathTraversal);
    }

    let metadata = fs::metadata(&canonical_path)
        .await
        .map_err(|_| FileServerError::NotFound(name.to_string()))?;
    if !metadata.is_file() {
        return Err(FileServerError::NotFound(name.to_string()));
    }

    Ok(canonical_path)
}

/// `Content-Disposition` value carrying the exact name.
///
/// The quoted `filename` is an ASCII fallback with anything unsafe replaced
/// by `_`; `filename*` (RFC 6266) holds the real name percent-encoded.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Escape HTML entities
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn render_index(entries: &[FileEntry]) -> String {
    let mut html = String::from(
        "<html><head><meta charset='utf-8'></head><body style='text-align:center;'>\
         <h1 style='font-size:60px;'>Arquivos no Servidor</h1>\
         <ul style='font-size:55px; list-style-position: inside;'>",
    );

    for entry in entries {
        let _ = write!(
            html,
            "<li><a href='/download?file={}'>{}</a> ({} bytes)</li>",
            urlencoding::encode(&entry.name),
            html_escape(&entry.name),
            entry.size
        );
    }

    html.push_str("</ul></body></html>");
    html
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - HTML listing of the serving directory, read fresh on every request
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, FileServerError> {
    let catalog = state.catalog.clone();
    let entries = tokio::task::spawn_blocking(move || catalog.list())
        .await
        .map_err(|err| FileServerError::Io(std::io::Error::other(err.to_string())))??;

    debug!("Listing {} file(s)", entries.len());
    Ok(Html(render_index(&entries)))
}

/// GET /download?file=<name> - Stream one file as an attachment
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, FileServerError> {
    let name = query
        .file
        .filter(|name| !name.is_empty())
        .ok_or(FileServerError::MissingFileParam)?;

    let path = resolve_and_verify_file(state.catalog.dir(), &name).await?;

    let file = fs::File::open(&path)
        .await
        .map_err(|_| FileServerError::NotFound(name.clone()))?;
    let file_size = file.metadata().await?.len();

    info!("Sending {} ({} bytes)", name, file_size);

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(file_size)),
            (header::CONTENT_DISPOSITION, content_disposition(&name)),
        ],
        body,
    )
        .into_response())
}

/// GET /shutdown - Acknowledge, then ask the server to stop
///
/// The serving task owns the actual shutdown; this handler only raises the
/// signal, so the response below still goes out during the drain.
pub async fn shutdown(State(state): State<AppState>) -> impl IntoResponse {
    info!("Shutdown requested over HTTP");
    state.shutdown.trigger();
    "Servidor será desligado em breve."
}
