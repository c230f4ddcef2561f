pub mod ask;

use async_trait::async_trait;

use crate::state::Citation;

pub use ask::AskClient;

/// Anything that can answer a question given the earlier questions of the session.
#[async_trait]
pub trait AnswerEndpoint: Send + Sync {
    async fn ask(&self, query: &str, history: &[String]) -> Result<Answer, AskError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Why a request failed. Only logged; the transcript shows the same fallback for all of them.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AskError::Timeout
        } else if err.is_decode() {
            AskError::Decode(err.to_string())
        } else {
            AskError::Network(err.to_string())
        }
    }
}
