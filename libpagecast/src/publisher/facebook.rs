//! Facebook Page publisher
//!
//! Pages publish directly: photos via `/photos` (immediate only), videos
//! via `/videos` with optional scheduled publish time. There is no
//! container step and no processing poll.

use async_trait::async_trait;
use tracing::info;

use crate::error::GraphError;
use crate::graph::GraphClient;
use crate::publisher::{PublishRequest, Publisher};
use crate::types::{MediaType, PlatformKind};

pub struct FacebookPublisher {
    client: GraphClient,
}

impl FacebookPublisher {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Facebook
    }

    fn name(&self) -> &str {
        "Facebook"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String, GraphError> {
        let post_id = match request.media_type {
            MediaType::Image => {
                // The photo endpoint has no scheduled variant; deferred
                // image posts go through the scheduler, which calls back
                // here at the due time with publish_at unset.
                if request.publish_at.is_some() {
                    return Err(GraphError::Validation(
                        "Scheduled image posts are published by the scheduler at the due time"
                            .to_string(),
                    ));
                }
                self.client
                    .create_photo_post(
                        &request.target_id,
                        &request.media_url,
                        request.caption.as_deref(),
                        &request.access_token,
                    )
                    .await?
            }
            MediaType::Video => {
                self.client
                    .create_video_post(
                        &request.target_id,
                        &request.media_url,
                        request.caption.as_deref(),
                        request.publish_at,
                        &request.access_token,
                    )
                    .await?
            }
        };

        info!(
            target_id = %request.target_id,
            post_id = %post_id,
            "Published to Facebook Page"
        );
        Ok(post_id)
    }
}
