//! Inbound update types and chat routing
//!
//! [`Update`] follows the shape of the Telegram Bot API update object, so it
//! deserializes straight from webhook or `getUpdates` JSON. Only the fields the
//! dispatcher routes on are modelled; everything else is kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of one independent conversation (the chat id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(i64);

impl ConversationKey {
    pub const fn new(chat_id: i64) -> Self {
        Self(chat_id)
    }

    pub const fn chat_id(self) -> i64 {
        self.0
    }
}

impl From<i64> for ConversationKey {
    fn from(chat_id: i64) -> Self {
        Self(chat_id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Bot API objects
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Plain text message in `chat_id`, as typed by a user
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat: Chat {
                id: chat_id,
                kind: "private".to_string(),
                extra: Map::new(),
            },
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// Absent for buttons attached to inline-mode messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub from: User,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Updates
// ============================================================================

/// Raw update as delivered by the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_chat_member: Option<ChatMemberUpdated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_member: Option<ChatMemberUpdated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_join_request: Option<ChatJoinRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_inline_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_checkout_query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_answer: Option<Value>,
}

/// Chat-scoped part of an update, handed to the active dialog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
    pub channel_post: Option<Message>,
    pub edited_channel_post: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
    pub my_chat_member: Option<ChatMemberUpdated>,
    pub chat_member: Option<ChatMemberUpdated>,
    pub chat_join_request: Option<ChatJoinRequest>,
}

impl ChatUpdate {
    /// Update carrying a single new message
    pub fn from_message(update_id: i64, message: Message) -> Self {
        Self {
            update_id,
            message: Some(message),
            ..Self::default()
        }
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Text of a new message, if this update is one
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.text.as_deref())
    }

    /// Chat this update belongs to, in the same order [`Update::route`] uses
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        first_chat(
            [
                self.message.as_ref(),
                self.edited_message.as_ref(),
                self.channel_post.as_ref(),
                self.edited_channel_post.as_ref(),
                self.callback_query.as_ref().and_then(|q| q.message.as_ref()),
            ],
            [self.my_chat_member.as_ref(), self.chat_member.as_ref()],
            self.chat_join_request.as_ref(),
        )
    }
}

/// Messages first, then member updates, then join requests
fn first_chat(
    messages: [Option<&Message>; 5],
    member_updates: [Option<&ChatMemberUpdated>; 2],
    join_request: Option<&ChatJoinRequest>,
) -> Option<ConversationKey> {
    messages
        .into_iter()
        .flatten()
        .map(|m| m.chat.id)
        .chain(member_updates.into_iter().flatten().map(|u| u.chat.id))
        .chain(join_request.map(|r| r.chat.id))
        .next()
        .map(ConversationKey)
}

/// Platform-level update that is not tied to any conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffChatUpdate {
    pub update_id: i64,
    pub inline_query: Option<Value>,
    pub chosen_inline_result: Option<Value>,
    pub shipping_query: Option<Value>,
    pub pre_checkout_query: Option<Value>,
    pub poll: Option<Value>,
    pub poll_answer: Option<Value>,
}

impl OffChatUpdate {
    fn is_empty(&self) -> bool {
        self.inline_query.is_none()
            && self.chosen_inline_result.is_none()
            && self.shipping_query.is_none()
            && self.pre_checkout_query.is_none()
            && self.poll.is_none()
            && self.poll_answer.is_none()
    }
}

/// Result of classifying a raw update
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Chat(ConversationKey, ChatUpdate),
    OffChat(OffChatUpdate),
    Ignore,
}

impl Update {
    /// Chat the update belongs to, first match wins
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        first_chat(
            [
                self.message.as_ref(),
                self.edited_message.as_ref(),
                self.channel_post.as_ref(),
                self.edited_channel_post.as_ref(),
                self.callback_query.as_ref().and_then(|q| q.message.as_ref()),
            ],
            [self.my_chat_member.as_ref(), self.chat_member.as_ref()],
            self.chat_join_request.as_ref(),
        )
    }

    /// Split the update into exactly one routing outcome
    pub fn route(self) -> Routed {
        if let Some(key) = self.conversation_key() {
            return Routed::Chat(
                key,
                ChatUpdate {
                    update_id: self.update_id,
                    message: self.message,
                    edited_message: self.edited_message,
                    channel_post: self.channel_post,
                    edited_channel_post: self.edited_channel_post,
                    callback_query: self.callback_query,
                    my_chat_member: self.my_chat_member,
                    chat_member: self.chat_member,
                    chat_join_request: self.chat_join_request,
                },
            );
        }

        let off_chat = OffChatUpdate {
            update_id: self.update_id,
            inline_query: self.inline_query,
            chosen_inline_result: self.chosen_inline_result,
            shipping_query: self.shipping_query,
            pre_checkout_query: self.pre_checkout_query,
            poll: self.poll,
            poll_answer: self.poll_answer,
        };
        if off_chat.is_empty() {
            Routed::Ignore
        } else {
            Routed::OffChat(off_chat)
        }
    }
}
