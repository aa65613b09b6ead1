//! Instagram Business Account publisher
//!
//! Publishing is a three-step container flow: create a media container,
//! wait for the platform to finish ingesting it, then publish the
//! container. Images finish synchronously; videos are processed
//! asynchronously and need the status poll.
//!
//! Caption placement differs by media type. Image captions travel on the
//! container; video captions are only accepted at publish time, so they
//! are held back until the `media_publish` call.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::GraphError;
use crate::graph::{ContainerStatus, GraphClient, UNSUPPORTED_VIDEO_SUBCODE};
use crate::publisher::{PublishRequest, Publisher};
use crate::types::{MediaType, PlatformKind};

/// Seconds between container status polls
const POLL_INTERVAL_SECS: u64 = 5;
/// Polls before giving up on a processing container
const MAX_POLL_ATTEMPTS: u32 = 20;

pub struct InstagramPublisher {
    client: GraphClient,
}

impl InstagramPublisher {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Poll until the container leaves `IN_PROGRESS` or the attempt budget
    /// runs out. Videos routinely take several polls; images usually pass
    /// on the first.
    async fn wait_for_container(
        &self,
        container_id: &str,
        token: &str,
    ) -> Result<(), GraphError> {
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            match self.client.container_status(container_id, token).await? {
                ContainerStatus::Finished => {
                    debug!(container_id, attempt, "Container finished processing");
                    return Ok(());
                }
                ContainerStatus::Error => {
                    return Err(GraphError::ProcessingFailed(format!(
                        "Media container {} failed processing",
                        container_id
                    )));
                }
                ContainerStatus::InProgress => {
                    debug!(container_id, attempt, "Container still processing");
                    // No point waiting after the last poll
                    if attempt < MAX_POLL_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
                    }
                }
            }
        }

        Err(GraphError::ProcessingTimeout(format!(
            "Media container {} still processing after {} attempts",
            container_id, MAX_POLL_ATTEMPTS
        )))
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    fn name(&self) -> &str {
        "Instagram"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String, GraphError> {
        let scheduled = request.publish_at.is_some();

        let container_id = self
            .client
            .create_media_container(
                &request.target_id,
                &request.media_url,
                request.media_type,
                request.caption.as_deref(),
                scheduled,
                &request.access_token,
            )
            .await
            .map_err(remap_unsupported_video)?;

        debug!(container_id = %container_id, "Created media container");

        if request.media_type == MediaType::Video {
            self.wait_for_container(&container_id, &request.access_token)
                .await?;
        }

        // Video captions were withheld from the container; attach them now
        let publish_caption = match request.media_type {
            MediaType::Video => request.caption.as_deref(),
            MediaType::Image => None,
        };

        let post_id = self
            .client
            .publish_container(
                &request.target_id,
                &container_id,
                publish_caption,
                request.publish_at,
                &request.access_token,
            )
            .await?;

        info!(
            target_id = %request.target_id,
            post_id = %post_id,
            "Published to Instagram"
        );
        Ok(post_id)
    }
}

/// The platform reports unsupported video files with a bare subcode and a
/// generic message; turn that into something a user can act on.
fn remap_unsupported_video(err: GraphError) -> GraphError {
    match &err {
        GraphError::Api {
            subcode: Some(code),
            ..
        } if *code == UNSUPPORTED_VIDEO_SUBCODE => {
            warn!("Video format rejected by platform (subcode {})", code);
            GraphError::Validation(
                "Video format not supported. Use MP4 (H.264 video, AAC audio)".to_string(),
            )
        }
        _ => err,
    }
}
