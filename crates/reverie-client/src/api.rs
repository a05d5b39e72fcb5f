//! HTTP client for the remote conversation service.
//!
//! The service is the source of truth for conversation and message
//! persistence; this module is the only place that knows its wire format.
//! The chat endpoint answers in one of two shapes -- a complete JSON reply or
//! a chunked text stream -- which is resolved once, here, into the
//! discriminated [`ChatReply`] so the controller never duck-types a response.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use serde::Deserialize;

use reverie_shared::constants::CONVERSATION_ID_HEADER;
use reverie_shared::{ConversationSummary, Message, Persona};

use crate::error::ClientError;
use crate::Result;

/// Timeout for bounded (non-streaming) calls.  Streaming chat has no hard
/// deadline beyond transport failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Byte stream of model output, chunked as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The chat backend's reply, resolved to exactly one of its two shapes.
pub enum ChatReply {
    /// The non-streaming endpoint answered with the full response text.
    Complete {
        response: String,
        conversation_id: Option<String>,
    },
    /// The streaming endpoint is producing tokens; the assigned conversation
    /// id (for a brand-new conversation) arrives in a response header.
    Streaming {
        conversation_id: Option<String>,
        body: ByteStream,
    },
}

/// Conversation record as returned by the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Detail endpoint payload: the conversation plus its full message history,
/// ascending by timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetail {
    pub conversation: ConversationRecord,
    pub messages: Vec<Message>,
}

/// The remote operations the controller depends on.
///
/// Abstracted behind a trait so controller tests can script the backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// All conversations for the authenticated user, newest first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    /// One conversation with its complete message history.
    async fn conversation_detail(&self, id: &str) -> Result<ConversationDetail>;

    /// Delete a conversation (cascades to messages server-side).
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Send one user turn to the chat backend.
    async fn send_chat(
        &self,
        persona_id: Option<&str>,
        text: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply>;

    /// Available personas (read-only collaborator).
    async fn list_personas(&self) -> Result<Vec<Persona>>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// `reqwest`-backed implementation of [`ChatBackend`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsEnvelope {
    #[serde(default)]
    conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatJsonReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    persona_id: Option<&'a str>,
    text: &'a str,
    conversation_id: Option<&'a str>,
}

impl ApiClient {
    /// Build a client against a service base URL, e.g. `https://host` (no
    /// trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success status to the error taxonomy.
    async fn fail(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        match status.as_u16() {
            401 => ClientError::Unauthorized,
            404 => ClientError::NotFound,
            code => {
                let message = resp.text().await.unwrap_or_default();
                ClientError::Api {
                    status: code,
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let resp = self
            .http
            .get(self.url("/api/conversations"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let envelope: ConversationsEnvelope = resp.json().await?;
        Ok(envelope.conversations)
    }

    async fn conversation_detail(&self, id: &str) -> Result<ConversationDetail> {
        let resp = self
            .http
            .get(self.url(&format!("/api/conversations/{id}")))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/api/conversations/{id}")))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(())
    }

    async fn send_chat(
        &self,
        persona_id: Option<&str>,
        text: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply> {
        let body = ChatRequest {
            persona_id,
            text,
            conversation_id,
        };

        // The non-streaming endpoint is cheaper when the deployment has it
        // enabled; fall back to the stream on any non-usable answer.
        let hf = self
            .http
            .post(self.url("/api/chat/hf"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        if hf.status().is_success() {
            if let Ok(reply) = hf.json::<ChatJsonReply>().await {
                if reply.ok {
                    if let Some(response) = reply.response {
                        return Ok(ChatReply::Complete {
                            response,
                            conversation_id: reply.conversation_id,
                        });
                    }
                }
            }
        }

        let resp = self
            .http
            .post(self.url("/api/chat/stream"))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }

        let new_conversation_id = resp
            .headers()
            .get(CONVERSATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let stream = resp.bytes_stream().map_err(ClientError::from);
        Ok(ChatReply::Streaming {
            conversation_id: new_conversation_id,
            body: Box::pin(stream),
        })
    }

    async fn list_personas(&self) -> Result<Vec<Persona>> {
        let resp = self
            .http
            .get(self.url("/api/personas"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(resp.json().await?)
    }
}
