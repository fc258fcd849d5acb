//! Ingress event service
//!
//! Entry points for the events the messaging gateway forwards: user direct
//! messages, structured staff commands and raw staff messages.

use tracing::{debug, instrument};
use validator::Validate;

use crate::dto::{
    CommandReply, DeliveryResponse, DirectMessageEvent, StaffCommandEvent, StaffMessageEvent,
    ThreadResponse,
};

use super::commands::StaffCommand;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Event service
pub struct EventService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EventService<'a> {
    /// Create a new EventService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Route a user's direct message into their thread
    #[instrument(skip(self, event), fields(user_id = %event.user_id))]
    pub async fn direct_message(&self, event: DirectMessageEvent) -> ServiceResult<DeliveryResponse> {
        event
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let delivery = self
            .ctx
            .registry()
            .route_inbound(event.user_id, &event.content)
            .await?;

        Ok(DeliveryResponse {
            thread: ThreadResponse::from(&delivery.thread),
            opened: delivery.opened,
        })
    }

    /// Run a structured staff command
    #[instrument(skip(self, event), fields(command = %event.command, channel_id = %event.channel_id))]
    pub async fn staff_command(&self, event: StaffCommandEvent) -> ServiceResult<CommandReply> {
        event
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let reply = match StaffCommand::parse(&event.command, &event.joined_args()) {
            Ok(command) => {
                command
                    .dispatch(self.ctx.registry(), event.channel_id, event.invoking_staff_id)
                    .await
            }
            Err(e) => CommandReply::failure(e.to_string()),
        };
        Ok(reply)
    }

    /// Handle a raw staff message. `None` when it is not a command.
    #[instrument(skip(self, event), fields(channel_id = %event.channel_id))]
    pub async fn staff_message(&self, event: StaffMessageEvent) -> ServiceResult<Option<CommandReply>> {
        event
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let Some(parsed) = StaffCommand::parse_message(self.ctx.prefix(), &event.content) else {
            debug!("Not a command");
            return Ok(None);
        };

        let reply = match parsed {
            Ok(command) => {
                command
                    .dispatch(self.ctx.registry(), event.channel_id, event.author_id)
                    .await
            }
            Err(e) => CommandReply::failure(e.to_string()),
        };
        Ok(Some(reply))
    }
}
