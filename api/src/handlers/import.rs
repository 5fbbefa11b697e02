//! Bulk import handlers
//!
//! CSV upload (multipart field `csv_file`) and the error report download.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use super::members::MemberResponse;
use super::negotiate;
use crate::app::{ImportOutcome, ImportRejection};
use crate::domain::ports::MemberRepository;
use crate::error::AppError;
use crate::roster::render_import;
use crate::AppState;

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "csv_file";

/// Response body for a committed import
#[derive(Debug, Serialize)]
pub struct ImportedResponse {
    pub imported: usize,
    pub members: Vec<MemberResponse>,
}

/// Response body for a rejected import (422)
#[derive(Debug, Serialize)]
pub struct RejectedResponse {
    pub imported: usize,
    #[serde(flatten)]
    pub rejection: ImportRejection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_report_url: Option<String>,
}

impl From<ImportRejection> for RejectedResponse {
    fn from(rejection: ImportRejection) -> Self {
        let error_report_url = match &rejection {
            ImportRejection::InvalidRows { report_id, .. } => {
                Some(format!("/members/import/reports/{}", report_id))
            }
            ImportRejection::CapacityExceeded { .. } => None,
        };
        Self {
            imported: 0,
            rejection,
            error_report_url,
        }
    }
}

/// POST /members/import
///
/// All-or-nothing: 201 with the created members, or 422 with every problem.
pub async fn import_members<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            upload = Some(data);
            break;
        }
    }

    let data = upload.ok_or_else(|| {
        AppError::BadRequest(format!("Missing multipart field '{}'", UPLOAD_FIELD))
    })?;

    let outcome = state.import_service.import_upload(&data).await?;
    let text = render_import(&outcome);

    Ok(match outcome {
        ImportOutcome::Imported(created) => negotiate(
            &headers,
            StatusCode::CREATED,
            &ImportedResponse {
                imported: created.len(),
                members: created.iter().map(MemberResponse::from).collect(),
            },
            || text,
        ),
        ImportOutcome::Rejected(rejection) => negotiate(
            &headers,
            StatusCode::UNPROCESSABLE_ENTITY,
            &RejectedResponse::from(rejection),
            || text,
        ),
    })
}

/// GET /members/import/reports/:id
pub async fn download_report<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let csv = state
        .import_service
        .error_report(&id)
        .ok_or_else(|| AppError::NotFound(format!("Import report {} not found or expired", id)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"import-errors-{}.csv\"", id),
            ),
        ],
        csv,
    )
        .into_response())
}
