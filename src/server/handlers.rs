use super::AppState;
use crate::convert::PreparedArchive;
use crate::error::Pdf2ZipError;
use crate::job::ConversionJob;
use crate::workspace::{JobId, JobWorkspace};
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /`: stage the uploaded PDF, convert it, stream back the archive.
pub(super) async fn convert_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Pdf2ZipError> {
    let mut multipart = multipart.map_err(|e| Pdf2ZipError::UploadFailed {
        reason: e.body_text(),
    })?;

    let id = JobId::new();
    let span = info_span!("job", id = %id);
    async move {
        let mut workspace = state.scratch.open_job(id.clone()).await?;
        let source = match stage_upload(&mut multipart, &mut workspace, &state.upload_field).await
        {
            Ok(source) => source,
            Err(e) => {
                crate::convert::log_cleanup(&id, &workspace.close().await);
                return Err(e);
            }
        };

        let mut job = ConversionJob::new(id);
        job.source = Some(source);

        // Detached, so a client disconnect cannot abort renders mid-write;
        // an unclaimed result is released when it is dropped.
        let converter = Arc::clone(&state.converter);
        let prepared = tokio::spawn(
            async move { converter.process(job, workspace).await }.in_current_span(),
        )
        .await
        .map_err(|e| Pdf2ZipError::Internal(format!("conversion task failed: {}", e)))??;

        archive_response(prepared).await
    }
    .instrument(span)
    .await
}

/// Stream the first field named `field_name` into the workspace.
async fn stage_upload(
    multipart: &mut Multipart,
    workspace: &mut JobWorkspace,
    field_name: &str,
) -> Result<PathBuf, Pdf2ZipError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Pdf2ZipError::UploadFailed {
            reason: e.body_text(),
        })?
    {
        if field.name() == Some(field_name) {
            debug!(
                "Receiving field '{}' (file name {:?})",
                field_name,
                field.file_name()
            );
            return workspace.stage(field).await;
        }
        debug!("Skipping multipart field {:?}", field.name());
    }
    Err(Pdf2ZipError::MissingUpload {
        field: field_name.to_string(),
    })
}

async fn archive_response(prepared: PreparedArchive) -> Result<Response, Pdf2ZipError> {
    let download = prepared.into_download().await?;
    let disposition = format!("attachment; filename=\"{}\"", download.file_name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .body(Body::from_stream(download.stream))
        .map_err(|e| Pdf2ZipError::Internal(format!("build response: {}", e)))
}
