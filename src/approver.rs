use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::ingress::types::ChatJoinRequest;
use crate::ingress::{SendOutcome, TelegramApi};
use crate::registry::ChannelRegistry;

/// Handles one `chat_join_request` update: the approval decision plus the
/// optional welcome message. Infallible by contract — every failure is
/// terminal for this one event and goes to the log, never to the caller.
pub struct JoinRequestApprover {
    api: Arc<dyn TelegramApi>,
    /// `None` in open-gate mode: approve everything, send no welcome.
    registry: Option<ChannelRegistry>,
}

impl JoinRequestApprover {
    pub fn new(api: Arc<dyn TelegramApi>, registry: Option<ChannelRegistry>) -> Self {
        Self { api, registry }
    }

    pub async fn handle(&self, request: &ChatJoinRequest) {
        let chat_id = request.chat.id;
        let user_id = request.from.id;
        let user = request.from.first_name.as_str();

        // Registered channels only: no row means the channel was never
        // onboarded and the request is not ours to act on.
        let welcome = match &self.registry {
            Some(registry) => match registry.get_welcome_message(chat_id) {
                Ok(Some(text)) => Some(text),
                Ok(None) => {
                    debug!(chat_id, "join request for unregistered channel, ignoring");
                    return;
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "registry lookup failed, ignoring join request");
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = self.api.approve_join_request(chat_id, user_id).await {
            error!(chat_id, user_id, error = %e, "failed to approve join request");
            return;
        }
        info!(chat_id, user_id, user, "approved join request");

        let Some(text) = welcome else {
            return;
        };
        match self.api.send_direct_message(user_id, &text).await {
            SendOutcome::Delivered => {
                info!(user_id, user, "sent welcome message");
            }
            SendOutcome::Blocked => {
                warn!(user_id, user, "could not send welcome message (user blocked the bot)");
            }
            SendOutcome::Failed(reason) => {
                error!(user_id, user, reason = %reason, "failed to send welcome message");
            }
        }
    }
}
