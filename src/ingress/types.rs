use serde::Deserialize;

/// A single Telegram update. Only the fields the bot acts on are decoded;
/// everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub chat_join_request: Option<ChatJoinRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    /// Forward metadata, Bot API < 7.0.
    #[serde(default)]
    pub forward_from_chat: Option<Chat>,
    /// Forward metadata, Bot API 7.0+.
    #[serde(default)]
    pub forward_origin: Option<ForwardOrigin>,
}

impl Message {
    /// The channel this message was forwarded from, if it is a channel
    /// forward. Understands both forward metadata shapes.
    pub fn forward_channel(&self) -> Option<&Chat> {
        if let Some(chat) = &self.forward_from_chat {
            if chat.kind == "channel" {
                return Some(chat);
            }
        }
        if let Some(origin) = &self.forward_origin {
            if origin.kind == "channel" {
                return origin.chat.as_ref();
            }
        }
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardOrigin {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub chat: Option<Chat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
}

/// A pending request by a user to join a chat that requires approval.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
}
