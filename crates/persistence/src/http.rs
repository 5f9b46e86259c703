//! REST transcript log
//!
//! Speaks a PostgREST-style insert: `POST {api_url}/messages` with one JSON
//! row per append. Works against hosted Postgres front ends without any
//! schema management on this side.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use samvad_core::Role;

use crate::{PersistenceError, TranscriptStore};

pub struct HttpTranscriptStore {
    api_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpTranscriptStore {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.api_url)
    }
}

#[async_trait]
impl TranscriptStore for HttpTranscriptStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        model: &str,
    ) -> Result<(), PersistenceError> {
        let row = MessageRow {
            conversation_id,
            role: role.as_str(),
            content,
            model,
        };

        let mut request = self.client.post(self.messages_url()).json(&row);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistenceError::Request {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct MessageRow<'a> {
    conversation_id: &'a str,
    role: &'a str,
    content: &'a str,
    model: &'a str,
}
