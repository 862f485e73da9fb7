//! Subset of the bot API payloads the webhook receives and the transport sends.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::dao::models::{ChatId, MessageId, OwnerId};

/// Incoming update delivered to the webhook.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// New chat message, if this update carries one.
    #[serde(default)]
    pub message: Option<Message>,
    /// Inline-button press, if this update carries one.
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// Chat message as delivered by the platform.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Message {
    /// Message identifier, unique within the chat.
    pub message_id: MessageId,
    /// Sender; absent for channel posts.
    #[serde(default)]
    pub from: Option<User>,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Text of a plain message.
    #[serde(default)]
    pub text: Option<String>,
    /// Caption of a media message.
    #[serde(default)]
    pub caption: Option<String>,
    /// Available sizes of an attached photo, smallest first.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// Text or caption, whichever the message carries.
    pub fn input_text(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Biggest rendition of the attached photo.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_deref()?
            .iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
    }
}

/// Chat user.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct User {
    /// Stable user identifier.
    pub id: OwnerId,
    /// Whether the user is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Public username.
    #[serde(default)]
    pub username: Option<String>,
}

/// Chat reference.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Chat {
    /// Chat identifier.
    pub id: ChatId,
}

/// One rendition of a photo.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PhotoSize {
    /// Identifier usable to resend the file.
    pub file_id: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Inline-button press.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CallbackQuery {
    /// Identifier to acknowledge.
    pub id: String,
    /// User who pressed the button.
    pub from: User,
    /// Message the button was attached to.
    #[serde(default)]
    pub message: Option<Message>,
    /// Payload set on the button.
    #[serde(default)]
    pub data: Option<String>,
}

/// Inline keyboard attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    /// Button rows, top to bottom.
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Append a row; empty rows are skipped.
    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
        if !buttons.is_empty() {
            self.inline_keyboard.push(buttons);
        }
        self
    }
}

/// Button sending `callback_data` back when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    /// Label.
    pub text: String,
    /// Payload, see [`CallbackAction`](crate::dto::callback::CallbackAction).
    pub callback_data: String,
}

impl InlineKeyboardButton {
    /// Button labelled `text` carrying `callback_data`.
    pub fn new(text: impl Into<String>, callback_data: impl ToString) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.to_string(),
        }
    }
}

/// `sendMessage` body.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// Target chat.
    pub chat_id: ChatId,
    /// Message text.
    pub text: String,
    /// Optional inline keyboard.
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// `deleteMessage` body.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteMessageRequest {
    /// Chat holding the message.
    pub chat_id: ChatId,
    /// Message to delete.
    pub message_id: MessageId,
}

/// `answerCallbackQuery` body.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQueryRequest {
    /// Id of the button press being acknowledged.
    pub callback_query_id: String,
    /// Optional toast text.
    pub text: Option<String>,
}

/// Envelope of every bot API reply.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// `false` when the call was refused.
    pub ok: bool,
    /// Payload of a successful call.
    pub result: Option<T>,
    /// Reason of a refused call.
    pub description: Option<String>,
}

/// Minimal view of a sent message.
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    /// Id assigned by the platform.
    pub message_id: MessageId,
}
