use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::CollectionsResponse;
use crate::state::AppState;

pub async fn list_collections(State(state): State<Arc<AppState>>) -> Json<CollectionsResponse> {
    let collections =
        state.assembler.registry().collection_ids().into_iter().map(str::to_string).collect();
    Json(CollectionsResponse { collections })
}
