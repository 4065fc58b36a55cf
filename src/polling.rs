use std::sync::Arc;

use anyhow::Result;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::approver::JoinRequestApprover;
use crate::ingress::types::{Message, Update};
use crate::ingress::TelegramApi;
use crate::wizard::SetupWizard;

const START_REPLY: &str = "Hello! I approve join requests for connected channels.\n\
     Use /connect to link me to your channel.";
const START_REPLY_OPEN_GATE: &str = "Hello! I approve every join request I receive.";

/// Long-poll loop and update router. One logical flow of control per update;
/// a handler failure abandons that update only.
pub struct BotService {
    api: Arc<dyn TelegramApi>,
    approver: JoinRequestApprover,
    /// `None` in open-gate mode: no setup conversation exists.
    wizard: Option<SetupWizard>,
    bot_username: Option<String>,
    poll_timeout: u64,
}

impl BotService {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        approver: JoinRequestApprover,
        wizard: Option<SetupWizard>,
        bot_username: Option<String>,
        poll_timeout: u64,
    ) -> Self {
        Self {
            api,
            approver,
            wizard,
            bot_username,
            poll_timeout,
        }
    }

    pub async fn run(&self) {
        info!("starting Telegram long polling loop");

        let mut offset: Option<i64> = None;
        let mut backoff_secs = 1;

        loop {
            match self.api.get_updates(offset, self.poll_timeout).await {
                Ok(updates) => {
                    backoff_secs = 1;

                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.dispatch(update).await;
                    }
                }
                Err(e) => {
                    warn!(
                        "Telegram polling error: {}. Retrying in {}s...",
                        e, backoff_secs
                    );
                    sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(60);
                }
            }
        }
    }

    /// Route a single update. Never propagates an error to the poll loop.
    pub async fn dispatch(&self, update: Update) {
        if let Some(request) = &update.chat_join_request {
            self.approver.handle(request).await;
            return;
        }

        if let Some(message) = update.message {
            if let Err(e) = self.handle_message(message).await {
                error!("failed to handle message: {}", e);
            }
            return;
        }

        debug!("skipping unrecognized update type");
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(from) = message.from.clone() else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        let command = message
            .text
            .as_deref()
            .and_then(|text| parse_command(text, self.bot_username.as_deref()))
            .map(str::to_string);

        match command.as_deref() {
            Some("start") => {
                let reply = if self.wizard.is_some() {
                    START_REPLY
                } else {
                    START_REPLY_OPEN_GATE
                };
                return self.api.send_message(chat_id, reply).await;
            }
            Some("connect") => {
                if let Some(wizard) = &self.wizard {
                    return wizard.start(from.id, chat_id).await;
                }
                return Ok(());
            }
            Some("cancel") => {
                if let Some(wizard) = &self.wizard {
                    return wizard.cancel(from.id, chat_id).await;
                }
                return Ok(());
            }
            _ => {}
        }

        // Everything else only matters mid-wizard.
        if let Some(wizard) = &self.wizard {
            if wizard.has_session(from.id).await {
                return wizard.handle_message(from.id, &message).await;
            }
        }
        Ok(())
    }
}

/// Parse `/cmd` or `/cmd@BotName` at the start of a message. Commands
/// addressed to a different bot are ignored.
fn parse_command<'a>(text: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    let rest = text.trim().strip_prefix('/')?;
    let cmd = rest.split_whitespace().next()?;

    match cmd.split_once('@') {
        Some((name, target)) => {
            if let Some(username) = bot_username {
                if !target.eq_ignore_ascii_case(username) {
                    return None;
                }
            }
            Some(name)
        }
        None => Some(cmd),
    }
}
