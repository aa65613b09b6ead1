//! Mock publisher for orchestrator and executor tests
//!
//! Records every request it receives and answers from outcomes scripted
//! per target id, so tests can assert both the fan-out behavior and the
//! exact requests that reached the platform seam. Keying the script on
//! the target keeps outcomes deterministic when targets run concurrently.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::GraphError;
use crate::publisher::{PublishRequest, Publisher, PublisherFactory};
use crate::types::{PlatformKind, SocialAccount};

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<PublishRequest>>,
    outcomes: Mutex<HashMap<String, VecDeque<Result<String, GraphError>>>>,
    calls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockPublisher {
    platform: Option<PlatformKind>,
    state: Arc<MockState>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_platform(platform: PlatformKind) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    /// Queue an outcome for the given target id; a target's outcomes are
    /// consumed in order, and calls past its script succeed with a
    /// generated post ID.
    pub fn script(&self, target_id: &str, outcome: Result<String, GraphError>) {
        self.state
            .outcomes
            .lock()
            .unwrap()
            .entry(target_id.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn script_success(&self, target_id: &str, post_id: &str) {
        self.script(target_id, Ok(post_id.to_string()));
    }

    pub fn script_failure(&self, target_id: &str, message: &str) {
        self.script(target_id, Err(GraphError::api(message)));
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PublishRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn platform(&self) -> PlatformKind {
        self.platform.unwrap_or(PlatformKind::Facebook)
    }

    fn name(&self) -> &str {
        "Mock"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String, GraphError> {
        let call = self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.requests.lock().unwrap().push(request.clone());

        let mut outcomes = self.state.outcomes.lock().unwrap();
        match outcomes
            .get_mut(&request.target_id)
            .and_then(|queue| queue.pop_front())
        {
            Some(outcome) => outcome,
            None => Ok(format!("mock-post-{}", call)),
        }
    }
}

/// Factory that hands every account the same shared [`MockPublisher`]
#[derive(Clone, Default)]
pub struct MockPublisherFactory {
    publisher: MockPublisher,
}

impl MockPublisherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> &MockPublisher {
        &self.publisher
    }
}

impl PublisherFactory for MockPublisherFactory {
    fn for_account(&self, _account: &SocialAccount) -> Box<dyn Publisher> {
        Box::new(self.publisher.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaType;

    fn request(target_id: &str) -> PublishRequest {
        PublishRequest {
            target_id: target_id.to_string(),
            media_url: "https://cdn.example.com/a.jpg".to_string(),
            media_type: MediaType::Image,
            caption: None,
            publish_at: None,
            access_token: "tok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_outcomes_scripted_per_target() {
        let publisher = MockPublisher::new();
        publisher.script_success("a", "post-1");
        publisher.script_failure("b", "boom");

        // Call order does not matter; each target gets its own script
        assert!(publisher.publish(&request("b")).await.is_err());
        assert_eq!(publisher.publish(&request("a")).await.unwrap(), "post-1");
        // Unscripted targets succeed
        assert!(publisher.publish(&request("c")).await.is_ok());

        assert_eq!(publisher.call_count(), 3);
        let requests = publisher.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].target_id, "b");
    }

    #[tokio::test]
    async fn test_target_script_consumed_in_order() {
        let publisher = MockPublisher::new();
        publisher.script_failure("a", "transient");
        publisher.script_success("a", "post-2");

        assert!(publisher.publish(&request("a")).await.is_err());
        assert_eq!(publisher.publish(&request("a")).await.unwrap(), "post-2");
    }

    #[tokio::test]
    async fn test_factory_shares_one_publisher() {
        let factory = MockPublisherFactory::new();
        let account = SocialAccount::new(
            "user-1".to_string(),
            PlatformKind::Facebook,
            "1234".to_string(),
            "Page".to_string(),
            Some("tok".to_string()),
        );

        let boxed = factory.for_account(&account);
        boxed.publish(&request("a")).await.unwrap();

        assert_eq!(factory.publisher().call_count(), 1);
    }
}
