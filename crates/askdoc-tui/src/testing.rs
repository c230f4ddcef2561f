use std::sync::Arc;

use askdoc_core::{Answer, AnswerEndpoint, AskError, Citation, InteractionController};
use async_trait::async_trait;

use crate::app::App;

/// Endpoint that always gives the same reply.
pub struct Canned {
    answer: Option<String>,
    citations: Vec<Citation>,
}

impl Canned {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Some(text.to_string()),
            citations: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            citations: Vec::new(),
        }
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }
}

#[async_trait]
impl AnswerEndpoint for Canned {
    async fn ask(&self, _query: &str, _history: &[String]) -> Result<Answer, AskError> {
        match &self.answer {
            Some(text) => Ok(Answer {
                text: text.clone(),
                citations: self.citations.clone(),
            }),
            None => Err(AskError::Network("connection refused".into())),
        }
    }
}

pub fn app_with(endpoint: Canned) -> App {
    App::new(
        InteractionController::new(Arc::new(endpoint)),
        "http://localhost:8000/api/ask",
    )
}
