//! Outbound side of the chat platform: send, delete, and acknowledge.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicI64, Ordering},
};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::info;

use crate::{
    dao::models::{ChatId, MessageId},
    dto::telegram::{
        AnswerCallbackQueryRequest, ApiResponse, DeleteMessageRequest, InlineKeyboardMarkup,
        SendMessageRequest, SentMessage,
    },
};

/// Result alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure of a bot API call. Messages never contain the bot token.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client could not be built.
    #[error("failed to build HTTP client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Request never got an HTTP answer.
    #[error("bot API call `{method}` could not be sent")]
    Request {
        /// Bot API method name.
        method: &'static str,
        /// Underlying client error, with the URL stripped.
        #[source]
        source: reqwest::Error,
    },
    /// Answer was not the expected JSON envelope.
    #[error("bot API call `{method}` returned an undecodable body")]
    Decode {
        /// Bot API method name.
        method: &'static str,
        /// Underlying decode error, with the URL stripped.
        #[source]
        source: reqwest::Error,
    },
    /// Platform answered `ok: false`.
    #[error("bot API call `{method}` failed: {description}")]
    Api {
        /// Bot API method name.
        method: &'static str,
        /// Reason given by the platform.
        description: String,
    },
}

/// Chat platform operations needed by the authoring flow.
pub trait Transport: Send + Sync {
    /// Send a message, returning its identifier.
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> BoxFuture<'static, TransportResult<MessageId>>;
    /// Delete one message.
    fn delete_message(&self, chat: ChatId, message: MessageId)
    -> BoxFuture<'static, TransportResult<()>>;
    /// Acknowledge a button press so the client stops its spinner.
    fn answer_callback(
        &self,
        callback_id: String,
        text: Option<String>,
    ) -> BoxFuture<'static, TransportResult<()>>;
}

/// Bot API client over plain HTTPS.
#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    base_url: Arc<str>,
}

impl TelegramTransport {
    /// Client for `api_url` authenticated with `token`.
    pub fn new(api_url: &str, token: &str) -> TransportResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| TransportError::ClientBuilder { source })?;
        let base_url = Arc::<str>::from(format!("{}/bot{token}", api_url.trim_end_matches('/')));
        Ok(Self { client, base_url })
    }

    async fn call<Req, Res>(&self, method: &'static str, body: &Req) -> TransportResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        // Errors are stripped of their URL: it embeds the bot token.
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                method,
                source: source.without_url(),
            })?;

        let envelope: ApiResponse<Res> =
            response
                .json()
                .await
                .map_err(|source| TransportError::Decode {
                    method,
                    source: source.without_url(),
                })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                method,
                description: description.unwrap_or_else(|| "no description".into()),
            }),
        }
    }
}

impl Transport for TelegramTransport {
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> BoxFuture<'static, TransportResult<MessageId>> {
        let transport = self.clone();
        Box::pin(async move {
            let request = SendMessageRequest {
                chat_id: chat,
                text,
                reply_markup: keyboard,
            };
            let sent: SentMessage = transport.call("sendMessage", &request).await?;
            Ok(sent.message_id)
        })
    }

    fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let transport = self.clone();
        Box::pin(async move {
            let request = DeleteMessageRequest {
                chat_id: chat,
                message_id: message,
            };
            let _: bool = transport.call("deleteMessage", &request).await?;
            Ok(())
        })
    }

    fn answer_callback(
        &self,
        callback_id: String,
        text: Option<String>,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let transport = self.clone();
        Box::pin(async move {
            let request = AnswerCallbackQueryRequest {
                callback_query_id: callback_id,
                text,
            };
            let _: bool = transport.call("answerCallbackQuery", &request).await?;
            Ok(())
        })
    }
}

/// Call observed by [`DryRunTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    /// [`Transport::send_message`].
    Send {
        /// Target chat.
        chat: ChatId,
        /// Message text.
        text: String,
        /// Attached keyboard.
        keyboard: Option<InlineKeyboardMarkup>,
    },
    /// [`Transport::delete_message`].
    Delete {
        /// Chat holding the message.
        chat: ChatId,
        /// Deleted message.
        message: MessageId,
    },
    /// [`Transport::answer_callback`].
    Answer {
        /// Acknowledged button press.
        callback_id: String,
    },
}

/// Transport used when no bot token is configured: logs and records every call.
#[derive(Clone, Default)]
pub struct DryRunTransport {
    inner: Arc<DryRunInner>,
}

#[derive(Default)]
struct DryRunInner {
    calls: Mutex<Vec<OutboundCall>>,
    next_id: AtomicI64,
    fail_deletes: AtomicBool,
}

impl DryRunTransport {
    /// Transport with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete fail, as the platform does for messages older than 48 hours.
    pub fn fail_deletes(&self, fail: bool) {
        self.inner.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Every recorded call, oldest first.
    pub fn calls(&self) -> Vec<OutboundCall> {
        self.lock_calls().clone()
    }

    /// Text of every sent message, oldest first.
    pub fn sent_texts(&self) -> Vec<String> {
        self.lock_calls()
            .iter()
            .filter_map(|call| match call {
                OutboundCall::Send { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Identifiers of every deleted message, oldest first.
    pub fn deleted(&self) -> Vec<MessageId> {
        self.lock_calls()
            .iter()
            .filter_map(|call| match call {
                OutboundCall::Delete { message, .. } => Some(*message),
                _ => None,
            })
            .collect()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<OutboundCall>> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: OutboundCall) {
        self.lock_calls().push(call);
    }
}

impl Transport for DryRunTransport {
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> BoxFuture<'static, TransportResult<MessageId>> {
        info!(chat, text = %text, "dry-run send");
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(OutboundCall::Send {
            chat,
            text,
            keyboard,
        });
        Box::pin(async move { Ok(id) })
    }

    fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let result = if self.inner.fail_deletes.load(Ordering::SeqCst) {
            Err(TransportError::Api {
                method: "deleteMessage",
                description: "Bad Request: message can't be deleted".into(),
            })
        } else {
            self.record(OutboundCall::Delete { chat, message });
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn answer_callback(
        &self,
        callback_id: String,
        _text: Option<String>,
    ) -> BoxFuture<'static, TransportResult<()>> {
        self.record(OutboundCall::Answer { callback_id });
        Box::pin(async move { Ok(()) })
    }
}
