use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::dto::QlrQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Build a layer definition for `url` styled as `collection`
pub async fn get_qlr(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QlrQuery>,
) -> Result<Response, ApiError> {
    let (url, collection) = query
        .required()
        .map_err(|name| ApiError::bad_request(format!("Missing query parameter '{}'", name)))?;

    tracing::info!(url = %url, collection = %collection, "Processing QLR request");

    let document = state.assembler.build(&url, &collection).await.map_err(|e| {
        if e.is_client_error() {
            tracing::info!(error = %e, "Rejected QLR request");
        } else {
            tracing::error!(error = %e, "Failed to build QLR");
        }
        ApiError::from(e)
    })?;

    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, document.media_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.content,
    )
        .into_response())
}
