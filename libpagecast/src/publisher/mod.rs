//! Publisher abstraction over the platform-specific publish flows
//!
//! A [`Publisher`] knows how to turn one [`PublishRequest`] into one
//! platform post ID. The orchestrator and the schedule executor never
//! branch on platform themselves; they ask a [`PublisherFactory`] for the
//! right publisher once per account and call it through the trait.

use async_trait::async_trait;

use crate::error::GraphError;
use crate::graph::GraphClient;
use crate::types::{MediaType, PlatformKind, SocialAccount};

pub mod facebook;
pub mod instagram;
pub mod mock;

pub use facebook::FacebookPublisher;
pub use instagram::InstagramPublisher;
pub use mock::{MockPublisher, MockPublisherFactory};

/// Everything needed to publish one piece of content to one destination
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Platform-native destination (Page ID or Business Account ID)
    pub target_id: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
    /// Unix seconds; `None` publishes immediately
    pub publish_at: Option<i64>,
    pub access_token: String,
}

/// One platform's publish flow
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> PlatformKind;

    /// Human-readable name for logs and error messages
    fn name(&self) -> &str;

    /// Publish one piece of content, returning the platform post ID
    async fn publish(&self, request: &PublishRequest) -> Result<String, GraphError>;
}

/// Selects a [`Publisher`] for a connected account
pub trait PublisherFactory: Send + Sync {
    fn for_account(&self, account: &SocialAccount) -> Box<dyn Publisher>;
}

/// Production factory backed by a shared [`GraphClient`]
pub struct GraphPublisherFactory {
    client: GraphClient,
}

impl GraphPublisherFactory {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

impl PublisherFactory for GraphPublisherFactory {
    fn for_account(&self, account: &SocialAccount) -> Box<dyn Publisher> {
        match account.platform {
            PlatformKind::Facebook => Box::new(FacebookPublisher::new(self.client.clone())),
            PlatformKind::Instagram => Box::new(InstagramPublisher::new(self.client.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_by_platform() {
        let client = GraphClient::with_endpoint("http://127.0.0.1:1");
        let factory = GraphPublisherFactory::new(client);

        let fb = SocialAccount::new(
            "user-1".to_string(),
            PlatformKind::Facebook,
            "1234".to_string(),
            "My Page".to_string(),
            Some("tok".to_string()),
        );
        let ig = SocialAccount::new(
            "user-1".to_string(),
            PlatformKind::Instagram,
            "178414".to_string(),
            "mybrand".to_string(),
            Some("tok".to_string()),
        );

        assert_eq!(factory.for_account(&fb).platform(), PlatformKind::Facebook);
        assert_eq!(factory.for_account(&ig).platform(), PlatformKind::Instagram);
    }
}
