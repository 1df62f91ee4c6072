//! Gemini-backed study tutor.
//!
//! [`Tutor`] keeps the conversation in the database: each question is sent
//! with the last `tutor.history_limit` messages and both turns are stored
//! once the model answers.

mod client;
pub mod speech;

pub use client::{GeminiClient, Turn};

use crate::error::{Result, ValidationError};
use crate::storage::config::TutorConfig;
use crate::storage::{ChatMessage, ChatRole, Database};

pub struct Tutor<'a> {
    client: GeminiClient,
    db: &'a Database,
    config: TutorConfig,
}

impl<'a> Tutor<'a> {
    pub fn new(client: GeminiClient, db: &'a Database, config: TutorConfig) -> Self {
        Self { client, db, config }
    }

    /// Ask a question in the context of the stored conversation.
    ///
    /// Nothing is stored if the request fails.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "question".into(),
                message: "must not be empty".into(),
            }
            .into());
        }

        let mut turns: Vec<Turn> = self
            .db
            .recent_chat_messages(self.config.history_limit)?
            .iter()
            .map(Turn::from)
            .collect();
        turns.push(Turn::user(question));

        let reply = self.client.generate(&self.config.system_prompt, &turns).await?;

        self.db.append_chat_message(ChatRole::User, question)?;
        self.db.append_chat_message(ChatRole::Model, &reply)?;
        tracing::debug!(history = turns.len() - 1, "tutor replied");
        Ok(reply)
    }

    pub fn history(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        Ok(self.db.recent_chat_messages(limit)?)
    }

    /// Speech for `text`, or for the last tutor reply when `text` is `None`.
    pub async fn speak(&self, text: Option<&str>) -> Result<Vec<u8>> {
        let text = match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => self
                .db
                .last_chat_message(ChatRole::Model)?
                .map(|m| m.content)
                .ok_or_else(|| ValidationError::EmptyCollection("tutor replies".into()))?,
        };
        Ok(self.client.synthesize(&text).await?)
    }
}
