//! Scheduled-post executor
//!
//! Sweeps a user's scheduled posts whose time has passed and publishes
//! each one to its targets. Targets run sequentially here; a sweep is a
//! background activity and a predictable order makes its failure records
//! readable. A fully published post is deleted, anything less keeps the
//! record with status failed and the reasons attached.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::db::Database;
use crate::error::Result;
use crate::orchestrator::MISSING_TOKEN_MESSAGE;
use crate::publisher::{PublishRequest, PublisherFactory};
use crate::types::ScheduledPost;

/// Outcome of one executor sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub published: usize,
    pub failed: usize,
}

pub struct ScheduleExecutor {
    db: Database,
    factory: Arc<dyn PublisherFactory>,
}

impl ScheduleExecutor {
    pub fn new(db: Database, factory: Arc<dyn PublisherFactory>) -> Self {
        Self { db, factory }
    }

    /// Publish everything due for this user as of now
    pub async fn execute_due_posts(&self, user_id: &str) -> Result<ExecutionReport> {
        let now = chrono::Utc::now().timestamp();
        self.execute_due_posts_at(user_id, now).await
    }

    /// Same sweep with an explicit clock, for deterministic tests
    #[instrument(skip(self))]
    pub async fn execute_due_posts_at(&self, user_id: &str, now: i64) -> Result<ExecutionReport> {
        let due = self.db.due_scheduled_posts(user_id, now).await?;
        let mut report = ExecutionReport::default();

        for post in due {
            let errors = self.publish_post(&post).await?;

            if errors.is_empty() {
                self.db.delete_scheduled_post(user_id, &post.id).await?;
                report.published += 1;
                info!(post_id = %post.id, "Scheduled post published");
            } else {
                let message = errors.join("; ");
                self.db
                    .mark_scheduled_post_failed(user_id, &post.id, &message)
                    .await?;
                report.failed += 1;
                warn!(post_id = %post.id, error = %message, "Scheduled post failed");
            }
        }

        Ok(report)
    }

    /// Publish one due post to each of its targets in order, collecting a
    /// message per failed target. Database errors abort the sweep; publish
    /// errors do not.
    async fn publish_post(&self, post: &ScheduledPost) -> Result<Vec<String>> {
        let mut errors = Vec::new();

        if post.target_ids.is_empty() {
            errors.push("No targets".to_string());
            return Ok(errors);
        }

        for account_id in &post.target_ids {
            let account = match self.db.get_social_account(&post.user_id, account_id).await? {
                Some(account) => account,
                None => {
                    errors.push(format!("{}: Account not found", account_id));
                    continue;
                }
            };

            // The platform credential must still carry a usable long-lived
            // token; without one the connection cannot be refreshed and
            // should not publish
            match self
                .db
                .get_api_credential(&post.user_id, account.platform)
                .await?
            {
                None => {
                    errors.push(format!(
                        "{}: No API credentials configured for {}",
                        account.display_name, account.platform
                    ));
                    continue;
                }
                Some(cred) if cred.long_lived_token.as_deref().unwrap_or("").is_empty() => {
                    errors.push(format!(
                        "{}: No long-lived token for {}; reconnect with page-auth",
                        account.display_name, account.platform
                    ));
                    continue;
                }
                Some(_) => {}
            }

            let token = match account.page_access_token.as_deref() {
                Some(token) if !token.is_empty() => token.to_string(),
                _ => {
                    errors.push(format!("{}: {}", account.display_name, MISSING_TOKEN_MESSAGE));
                    continue;
                }
            };

            let publisher = self.factory.for_account(&account);
            let request = PublishRequest {
                target_id: account.account_id.clone(),
                media_url: post.media_url.clone(),
                media_type: post.media_type,
                caption: post.caption.clone(),
                // The due time has passed; publish immediately
                publish_at: None,
                access_token: token,
            };

            if let Err(e) = publisher.publish(&request).await {
                errors.push(format!("{}: {}", account.display_name, e));
            }
        }

        Ok(errors)
    }
}
