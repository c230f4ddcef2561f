use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Answer, AnswerEndpoint, AskError};
use crate::state::{null_as_default, Citation};

#[derive(Serialize)]
struct AskRequest<'a> {
    query: &'a str,
    history: &'a [String],
    token: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    response: String,
    #[serde(default, deserialize_with = "null_as_default")]
    citations: Vec<Citation>,
}

/// Client for the `POST /api/ask` question-answering endpoint.
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl AskClient {
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        }
    }

    pub fn with_timeout(endpoint: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnswerEndpoint for AskClient {
    async fn ask(&self, query: &str, history: &[String]) -> Result<Answer, AskError> {
        let request = AskRequest {
            query,
            history,
            token: &self.token,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AskError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: AskResponse =
            serde_json::from_str(&body).map_err(|e| AskError::Decode(e.to_string()))?;

        Ok(Answer {
            text: parsed.response,
            citations: parsed.citations,
        })
    }
}
