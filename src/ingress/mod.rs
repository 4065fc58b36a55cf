pub mod telegram_client;
pub mod types;

pub use telegram_client::TelegramClient;
pub use types::{Chat, ChatJoinRequest, ForwardOrigin, Message, Update, User};

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of a direct-message delivery attempt. Expected soft conditions
/// are values here rather than errors, so call sites branch on kind instead
/// of inspecting error strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The recipient has blocked the bot (Telegram 403). Normal control flow,
    /// not a fault.
    Blocked,
    /// Anything else, including transport failures.
    Failed(String),
}

/// The bot's membership record in a chat, as returned by `getChatMember`.
#[derive(Debug, Clone)]
pub struct ChatMember {
    pub status: String,
    pub can_invite_users: bool,
}

impl ChatMember {
    /// Approving join requests requires administrator status with the
    /// "invite users" right.
    pub fn can_approve_requests(&self) -> bool {
        self.status == "administrator" && self.can_invite_users
    }
}

/// The bot's own identity, as returned by `getMe`.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// The slice of the Telegram Bot API the bot consumes. Implemented by
/// [`TelegramClient`]; tests substitute a mock.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn get_updates(&self, offset: Option<i64>, timeout: u64) -> Result<Vec<Update>>;

    /// Send a reply into a chat (wizard prompts, command replies).
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Deliver a welcome message to a user's private chat.
    async fn send_direct_message(&self, user_id: i64, text: &str) -> SendOutcome;

    async fn approve_join_request(&self, chat_id: i64, user_id: i64) -> Result<()>;

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember>;

    async fn get_me(&self) -> Result<BotIdentity>;
}
