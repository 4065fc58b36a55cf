use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::error;

use super::types::Update;
use super::{BotIdentity, ChatMember, SendOutcome, TelegramApi};

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(bot_token: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Point the client at a different server (local Bot API, test stub).
    pub fn with_api_base(bot_token: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            api_base,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// POST a method call and unwrap Telegram's `{"ok": ..., "result": ...}`
    /// envelope, returning the `result` payload.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let mut payload: serde_json::Value = resp.json().await?;

        if payload["ok"].as_bool() != Some(true) {
            let desc = payload["description"].as_str().unwrap_or("unknown error");
            error!("Telegram {} error: {}", method, desc);
            anyhow::bail!("Telegram {} failed ({}): {}", method, status, desc);
        }
        Ok(payload["result"].take())
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn get_updates(&self, offset: Option<i64>, timeout: u64) -> Result<Vec<Update>> {
        // Join requests are only delivered when explicitly listed in
        // allowed_updates.
        let mut body = json!({
            "timeout": timeout,
            "allowed_updates": ["message", "chat_join_request"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let result = self.call("getUpdates", body).await?;
        let updates: Vec<Update> = serde_json::from_value(result)?;
        Ok(updates)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: i64, text: &str) -> SendOutcome {
        let body = json!({
            "chat_id": user_id,
            "text": text,
        });

        let resp = match self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return SendOutcome::Failed(e.to_string()),
        };

        let status = resp.status();
        let payload: serde_json::Value = match resp.json().await {
            Ok(payload) => payload,
            Err(e) => return SendOutcome::Failed(e.to_string()),
        };

        if payload["ok"].as_bool() == Some(true) {
            return SendOutcome::Delivered;
        }

        // 403 means the user has blocked the bot (or never started a chat
        // with it). That is an expected condition, not a fault.
        if payload["error_code"].as_i64() == Some(403) {
            return SendOutcome::Blocked;
        }

        let desc = payload["description"].as_str().unwrap_or("unknown error");
        SendOutcome::Failed(format!("sendMessage failed ({}): {}", status, desc))
    }

    async fn approve_join_request(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let body = json!({
            "chat_id": chat_id,
            "user_id": user_id,
        });
        self.call("approveChatJoinRequest", body).await?;
        Ok(())
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember> {
        let body = json!({
            "chat_id": chat_id,
            "user_id": user_id,
        });
        let result = self.call("getChatMember", body).await?;

        Ok(ChatMember {
            status: result["status"].as_str().unwrap_or_default().to_string(),
            can_invite_users: result["can_invite_users"].as_bool().unwrap_or(false),
        })
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        let result = self.call("getMe", json!({})).await?;

        let id = result["id"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("getMe returned no id: {:?}", result))?;
        Ok(BotIdentity {
            id,
            username: result["username"].as_str().map(String::from),
        })
    }
}
