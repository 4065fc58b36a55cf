use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::ingress::types::Message;
use crate::ingress::TelegramApi;
use crate::registry::ChannelRegistry;

const PROMPT_FORWARD: &str = "Please forward any message from the channel you want me to manage.\n\
     Make sure I am an admin with the 'Invite Users' permission.";
const RETRY_FORWARD: &str = "This is not a forwarded message from a channel. Please try again.";
const CANCELLED: &str = "Operation cancelled.";
const NOTHING_TO_CANCEL: &str = "No channel setup in progress.";

/// An open /connect conversation. Presence in the session table is the
/// "awaiting forward" state; a terminated session is simply removed, so
/// nothing can transition out of it.
struct WizardSession {
    started_at: Instant,
}

/// The /connect conversation flow. Forwarding a message from the target
/// channel proves both the channel's identity (the bot needs its numeric id,
/// which operators typically do not know) and the operator's access to it.
pub struct SetupWizard {
    api: Arc<dyn TelegramApi>,
    registry: ChannelRegistry,
    /// The bot's own user id, for membership checks.
    bot_id: i64,
    sessions: Mutex<HashMap<i64, WizardSession>>,
    session_ttl: Duration,
}

impl SetupWizard {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        registry: ChannelRegistry,
        bot_id: i64,
        session_ttl: Duration,
    ) -> Self {
        Self {
            api,
            registry,
            bot_id,
            sessions: Mutex::new(HashMap::new()),
            session_ttl,
        }
    }

    /// `/connect`: prompt for a channel forward and open a fresh session for
    /// the user, replacing any previous one.
    pub async fn start(&self, user_id: i64, chat_id: i64) -> Result<()> {
        self.api.send_message(chat_id, PROMPT_FORWARD).await?;

        let mut sessions = self.sessions.lock().await;
        evict_stale(&mut sessions, self.session_ttl);
        sessions.insert(
            user_id,
            WizardSession {
                started_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// `/cancel`: terminate the user's session if one is open.
    pub async fn cancel(&self, user_id: i64, chat_id: i64) -> Result<()> {
        let removed = self.sessions.lock().await.remove(&user_id).is_some();
        let reply = if removed { CANCELLED } else { NOTHING_TO_CANCEL };
        self.api.send_message(chat_id, reply).await
    }

    /// Whether the user currently has a live (non-expired) session.
    pub async fn has_session(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;
        evict_stale(&mut sessions, self.session_ttl);
        sessions.contains_key(&user_id)
    }

    /// A non-command message from a user with an open session. Anything that
    /// is not a channel forward keeps the session open with a retry
    /// instruction; every other outcome, including errors, terminates it.
    pub async fn handle_message(&self, user_id: i64, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;

        let Some(channel) = message.forward_channel() else {
            return self.api.send_message(chat_id, RETRY_FORWARD).await;
        };
        let channel_id = channel.id;
        let title = channel
            .title
            .clone()
            .unwrap_or_else(|| channel_id.to_string());

        self.sessions.lock().await.remove(&user_id);

        let reply = match self.onboard(channel_id).await {
            Ok(true) => {
                info!(channel_id, title = %title, "channel onboarded");
                format!("Successfully connected to channel: {}.", title)
            }
            Ok(false) => {
                info!(channel_id, title = %title, "setup rejected: missing admin rights");
                format!(
                    "I am not an admin in '{}' or I lack the 'Invite Users' permission.",
                    title
                )
            }
            Err(e) => {
                error!(channel_id, error = %e, "channel setup failed");
                format!("An error occurred: {}", e)
            }
        };
        self.api.send_message(chat_id, &reply).await
    }

    /// Verify the bot's rights in the channel and register it. `Ok(false)`
    /// means the bot cannot approve requests there; the registry is not
    /// touched in that case.
    async fn onboard(&self, channel_id: i64) -> Result<bool> {
        let member = self.api.get_chat_member(channel_id, self.bot_id).await?;
        if !member.can_approve_requests() {
            return Ok(false);
        }
        self.registry.upsert_default(channel_id)?;
        Ok(true)
    }
}

fn evict_stale(sessions: &mut HashMap<i64, WizardSession>, ttl: Duration) {
    sessions.retain(|_, session| session.started_at.elapsed() < ttl);
}
