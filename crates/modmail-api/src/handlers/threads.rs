//! Thread handlers
//!
//! Read-only views of the registry for dashboards and the gateway.

use axum::{
    extract::{Path, State},
    Json,
};
use modmail_service::dto::{ApiResponse, ThreadResponse};
use modmail_service::services::ThreadService;

use crate::extractors::{ChannelIdPath, IngressAuth, UserIdPath};
use crate::response::ApiResult;
use crate::state::AppState;

/// List open threads, oldest first
///
/// GET /threads
pub async fn list_open_threads(
    State(state): State<AppState>,
    _auth: IngressAuth,
) -> ApiResult<Json<ApiResponse<Vec<ThreadResponse>>>> {
    let threads = ThreadService::new(state.service_context()).list_open().await?;
    Ok(Json(ApiResponse::new(threads)))
}

/// Get the thread living in a channel
///
/// GET /threads/{channel_id}
pub async fn get_thread(
    State(state): State<AppState>,
    _auth: IngressAuth,
    Path(path): Path<ChannelIdPath>,
) -> ApiResult<Json<ThreadResponse>> {
    let channel_id = path.channel_id()?;
    let thread = ThreadService::new(state.service_context())
        .get_by_channel(channel_id)
        .await?;
    Ok(Json(thread))
}

/// Get a user's open thread
///
/// GET /users/{user_id}/thread
pub async fn get_user_thread(
    State(state): State<AppState>,
    _auth: IngressAuth,
    Path(path): Path<UserIdPath>,
) -> ApiResult<Json<ThreadResponse>> {
    let user_id = path.user_id()?;
    let thread = ThreadService::new(state.service_context())
        .get_by_user(user_id)
        .await?;
    Ok(Json(thread))
}
