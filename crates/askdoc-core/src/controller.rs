//! The single writer of the conversation.
//!
//! State lives in a `tokio::sync::watch` channel so every mutation reaches the
//! rendering layer as one atomic update. The busy check and the busy flag are set
//! inside the same `send_if_modified` call, which is what keeps requests serialized
//! even when submissions race.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ai::AnswerEndpoint;
use crate::state::{Conversation, PendingRequest};

#[derive(Clone)]
pub struct InteractionController {
    state: Arc<watch::Sender<Conversation>>,
    endpoint: Arc<dyn AnswerEndpoint>,
}

impl InteractionController {
    pub fn new(endpoint: Arc<dyn AnswerEndpoint>) -> Self {
        let (state, _) = watch::channel(Conversation::default());
        Self {
            state: Arc::new(state),
            endpoint,
        }
    }

    /// A receiver that is marked changed after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Conversation> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Conversation {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Accept `raw` and answer it in a background task.
    ///
    /// The user turn is visible to subscribers before this returns. `None` means
    /// the input was rejected and nothing changed.
    pub fn submit(&self, raw: &str) -> Option<JoinHandle<()>> {
        let request = self.begin(raw)?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.dispatch(request).await }))
    }

    /// Same as [`submit`](Self::submit) but waits for the exchange to finish.
    /// Returns whether the input was accepted.
    pub async fn ask(&self, raw: &str) -> bool {
        match self.begin(raw) {
            Some(request) => {
                self.dispatch(request).await;
                true
            }
            None => false,
        }
    }

    fn begin(&self, raw: &str) -> Option<PendingRequest> {
        let mut accepted = None;
        self.state.send_if_modified(|conv| {
            accepted = conv.accept(raw);
            accepted.is_some()
        });

        if accepted.is_none() {
            debug!(pending = self.is_pending(), "Submission rejected");
        }
        accepted
    }

    async fn dispatch(&self, request: PendingRequest) {
        info!(history_len = request.history.len(), "Sending question");

        let outcome = self.endpoint.ask(&request.query, &request.history).await;
        match &outcome {
            Ok(answer) => info!(citations = answer.citations.len(), "Answer received"),
            Err(e) => warn!(error = %e, "Question failed"),
        }

        self.state
            .send_modify(|conv| conv.resolve(request.query, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Answer, AskError};
    use crate::state::{Role, Turn, FALLBACK_MESSAGE};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AnswerEndpoint for Echo {
        async fn ask(&self, query: &str, _history: &[String]) -> Result<Answer, AskError> {
            if query == "fail" {
                return Err(AskError::Network("connection refused".into()));
            }
            Ok(Answer {
                text: format!("echo: {query}"),
                citations: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn ask_runs_one_exchange() {
        let controller = InteractionController::new(Arc::new(Echo));
        assert!(controller.ask("hello").await);

        let conv = controller.snapshot();
        assert_eq!(
            conv.turns(),
            &[Turn::user("hello"), Turn::assistant("echo: hello", vec![])]
        );
        assert_eq!(conv.history(), &["hello".to_string()]);
        assert!(!conv.is_pending());
    }

    #[tokio::test]
    async fn failed_exchange_shows_fallback() {
        let controller = InteractionController::new(Arc::new(Echo));
        controller.ask("fail").await;

        let conv = controller.snapshot();
        let last = conv.last_turn().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, FALLBACK_MESSAGE);
        assert!(conv.history().is_empty());
    }

    #[tokio::test]
    async fn rejected_submission_does_not_notify() {
        let controller = InteractionController::new(Arc::new(Echo));
        let mut rx = controller.subscribe();
        rx.borrow_and_update();

        assert!(controller.submit("   ").is_none());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn submit_publishes_user_turn_before_returning() {
        let controller = InteractionController::new(Arc::new(Echo));
        let mut rx = controller.subscribe();
        rx.borrow_and_update();

        let handle = controller.submit("hello").unwrap();
        assert!(rx.has_changed().unwrap());
        {
            let conv = rx.borrow_and_update();
            assert_eq!(conv.turns(), &[Turn::user("hello")]);
            assert!(conv.is_pending());
        }

        handle.await.unwrap();
        assert!(!controller.is_pending());
        assert_eq!(controller.snapshot().turns().len(), 2);
    }
}
