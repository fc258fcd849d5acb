//! Ingress event handlers
//!
//! The messaging gateway posts every event it receives here: user DMs,
//! slash-style staff commands, and plain messages in thread channels.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use modmail_service::dto::{
    CommandReply, DeliveryResponse, DirectMessageEvent, StaffCommandEvent, StaffMessageEvent,
};
use modmail_service::services::EventService;

use crate::extractors::{IngressAuth, ValidatedJson};
use crate::response::{ApiResult, NoContent};
use crate::state::AppState;

/// A user sent the bot a direct message
///
/// POST /events/direct-message
pub async fn direct_message(
    State(state): State<AppState>,
    _auth: IngressAuth,
    ValidatedJson(event): ValidatedJson<DirectMessageEvent>,
) -> ApiResult<Json<DeliveryResponse>> {
    let delivery = EventService::new(state.service_context())
        .direct_message(event)
        .await?;
    Ok(Json(delivery))
}

/// A staff member invoked a command
///
/// POST /events/staff-command
pub async fn staff_command(
    State(state): State<AppState>,
    _auth: IngressAuth,
    ValidatedJson(event): ValidatedJson<StaffCommandEvent>,
) -> ApiResult<Json<CommandReply>> {
    let reply = EventService::new(state.service_context())
        .staff_command(event)
        .await?;
    Ok(Json(reply))
}

/// A staff member wrote in a thread channel
///
/// POST /events/staff-message
///
/// Answers 204 when the message is not a command.
pub async fn staff_message(
    State(state): State<AppState>,
    _auth: IngressAuth,
    ValidatedJson(event): ValidatedJson<StaffMessageEvent>,
) -> ApiResult<Response> {
    let reply = EventService::new(state.service_context())
        .staff_message(event)
        .await?;
    Ok(match reply {
        Some(reply) => Json(reply).into_response(),
        None => NoContent.into_response(),
    })
}
