//! HTTP surface: health check, upload-and-convert, page download.
//!
//! | Method | Path                                  | Success                    |
//! |--------|---------------------------------------|----------------------------|
//! | GET    | `/healthcheck`                        | `{"status":"ok"}`          |
//! | POST   | `/convert` (multipart field `file`)   | [`ConversionManifest`]     |
//! | GET    | `/download/{session_id}/{filename}`   | raw PNG                    |
//!
//! Failures are JSON `{"error": "<kind>", "detail": "<message>"}` with the
//! status picked from [`ErrorKind`]. Server-side failures are logged in full
//! and answered with a fixed message.

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::error::{ErrorKind, Pdf2PngError};
use crate::output::ConversionManifest;
use crate::store::{PageName, SessionId};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Multipart field names accepted for the uploaded PDF.
const FILE_FIELDS: [&str; 2] = ["file", "pdf"];

// ── State ────────────────────────────────────────────────────────────────

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    converter: Arc<Converter>,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter: Arc::new(converter),
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// A pipeline or store error.
    Conversion(Pdf2PngError),
    /// The multipart body could not be read (malformed, or over the limit).
    Upload(MultipartError),
}

impl From<Pdf2PngError> for ApiError {
    fn from(e: Pdf2PngError) -> Self {
        ApiError::Conversion(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Render | ErrorKind::Storage | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Upload(e) => {
                tracing::warn!("Rejected upload body: {}", e);
                (
                    e.status(),
                    ErrorResponse {
                        error: ErrorKind::ClientInput.as_str(),
                        detail: e.body_text(),
                    },
                )
            }
            ApiError::Conversion(e) => {
                let kind = e.kind();
                let status = status_for(kind);
                let detail = match (&e, kind) {
                    (_, ErrorKind::ClientInput | ErrorKind::NotFound) => {
                        tracing::debug!("Client error: {}", e);
                        e.to_string()
                    }
                    (Pdf2PngError::Timeout { .. }, _) => {
                        tracing::error!("Conversion failed: {}", e);
                        e.to_string()
                    }
                    (_, ErrorKind::Render) => {
                        tracing::error!("Render failure: {}", e);
                        "The PDF could not be rendered".to_string()
                    }
                    (_, ErrorKind::Storage) => {
                        tracing::error!("Storage failure: {}", e);
                        "The converted pages could not be stored".to_string()
                    }
                    (_, ErrorKind::Internal) => {
                        tracing::error!("Internal error: {}", e);
                        "An internal error occurred".to_string()
                    }
                };
                (
                    status,
                    ErrorResponse {
                        error: kind.as_str(),
                        detail,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.converter.config().max_upload_bytes;

    Router::new()
        .route("/healthcheck", get(health_check))
        .route(
            "/convert",
            post(convert).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/download/{session_id}/{filename}", get(download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `server.socket_addr()` and serve until Ctrl+C or SIGTERM.
pub async fn serve(converter: Converter, server: &ServerConfig) -> std::io::Result<()> {
    let addr = server.socket_addr();
    let app = router(AppState::new(converter));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("pdf2png listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /healthcheck
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /convert
///
/// Reads the first field named `file` (or `pdf`) and converts it. Other
/// fields are skipped.
async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConversionManifest>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("");
        if !FILE_FIELDS.contains(&name) {
            tracing::debug!("Skipping multipart field '{}'", name);
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        tracing::debug!("Received upload {:?}: {} bytes", filename, data.len());

        let output = state
            .converter
            .convert_upload(filename.as_deref(), data)
            .await?;
        return Ok(Json(output.manifest()));
    }

    Err(Pdf2PngError::MissingFile.into())
}

/// GET /download/{session_id}/{filename}
async fn download(
    State(state): State<AppState>,
    Path((session_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    SessionId::parse(&session_id)?;
    let page = PageName::parse(&filename)?;

    let bytes = state.converter.store().get(&session_id, &filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{page}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: Pdf2PngError) -> (StatusCode, serde_json::Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unopenable_document_hides_pdfium_detail() {
        let (status, body) = render(Pdf2PngError::InvalidDocument {
            detail: "PdfiumLibraryInternalError(FormatError)".into(),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "render_failure");
        assert_eq!(body["detail"], "The PDF could not be rendered");
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = render(Pdf2PngError::NotPdfExtension {
            filename: "notes.txt".into(),
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "client_input");
        assert!(body["detail"].as_str().unwrap().contains("notes.txt"));
    }

    #[tokio::test]
    async fn storage_failure_hides_path() {
        let (status, body) = render(Pdf2PngError::storage(
            "/srv/pdf2png/data/secret",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        ))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["detail"].as_str().unwrap().contains("/srv"));
    }
}
